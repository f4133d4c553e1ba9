use std::sync::LazyLock;

use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;
use tm_renderer::{BlockOrigin, BlockProcessor, ExtractedBlock, ProcessResult, escape_html};

use crate::directive::is_reserved;

/// Language assumed for fences with no language tag.
pub const DEFAULT_LANGUAGE: &str = "bash";

static SYNTAXES: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);

/// Code block processor that renders every non-embed fence as highlighted
/// HTML with a copy button.
///
/// Highlighting emits CSS classes rather than inline styles, so one
/// stylesheet controls the theme. Claimed blocks are recorded;
/// [`copy_actions`](crate::copy_actions) turns them into the copy payloads
/// the host wires up.
#[derive(Debug, Default)]
pub struct HighlightProcessor {
    extracted: Vec<ExtractedBlock>,
    warnings: Vec<String>,
}

impl HighlightProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    fn highlight(token: &str, source: &str) -> Result<String, syntect::Error> {
        let syntax = SYNTAXES
            .find_syntax_by_token(token)
            .unwrap_or_else(|| SYNTAXES.find_syntax_plain_text());
        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &SYNTAXES, ClassStyle::Spaced);
        for line in LinesWithEndings::from(source) {
            generator.parse_html_for_line_which_includes_newline(line)?;
        }
        Ok(generator.finalize())
    }
}

impl BlockProcessor for HighlightProcessor {
    fn process_fence(&mut self, language: &str, source: &str, index: usize) -> ProcessResult {
        if is_reserved(language) {
            return ProcessResult::PassThrough;
        }
        let token = if language.is_empty() {
            DEFAULT_LANGUAGE
        } else {
            language
        };
        let code = match Self::highlight(token, source) {
            Ok(html) => html,
            Err(e) => {
                self.warnings
                    .push(format!("code block {index}: highlighting failed: {e}"));
                escape_html(source).into_owned()
            }
        };
        self.extracted.push(ExtractedBlock {
            index,
            origin: BlockOrigin::Fence {
                language: token.to_owned(),
            },
            source: source.to_owned(),
        });
        ProcessResult::Inline(format!(
            r#"<div class="code-block"><button type="button" class="copy-button" data-copy-index="{index}">Copy</button><pre><code class="language-{token}">{code}</code></pre></div>"#
        ))
    }

    fn extracted(&self) -> &[ExtractedBlock] {
        &self.extracted
    }

    fn warnings(&self) -> &[String] {
        &self.warnings
    }
}
