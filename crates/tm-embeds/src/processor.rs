use std::collections::HashMap;
use std::sync::Arc;

use tm_fetch::FetchError;
use tm_renderer::{BlockOrigin, BlockProcessor, ExtractedBlock, ProcessResult, escape_html};

use crate::capability::{CopyAction, DiagramRenderer, MermaidHook};
use crate::directive::{Directive, embed_tag, is_reserved};

const PLACEHOLDER_PREFIX: &str = "{{EMBED_";

fn placeholder(index: usize) -> String {
    format!("{PLACEHOLDER_PREFIX}{index}}}}}")
}

/// Block processor that claims embed directives.
///
/// Mermaid fences render inline through the diagram capability. Fetching
/// directives leave a `{{EMBED_n}}` placeholder behind; the pipeline
/// resolves them afterwards and splices the results in with
/// [`Replacements`].
pub struct EmbedProcessor {
    diagrams: Arc<dyn DiagramRenderer>,
    extracted: Vec<ExtractedBlock>,
}

impl EmbedProcessor {
    pub fn new() -> Self {
        Self {
            diagrams: Arc::new(MermaidHook),
            extracted: Vec::new(),
        }
    }

    /// Replaces the diagram capability.
    #[must_use]
    pub fn with_diagram_renderer(mut self, diagrams: Arc<dyn DiagramRenderer>) -> Self {
        self.diagrams = diagrams;
        self
    }
}

impl Default for EmbedProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockProcessor for EmbedProcessor {
    fn process_fence(&mut self, language: &str, source: &str, index: usize) -> ProcessResult {
        match language {
            "mermaid" => ProcessResult::Inline(self.diagrams.render(source)),
            "github" | "stackoverflow" => {
                self.extracted.push(ExtractedBlock {
                    index,
                    origin: BlockOrigin::Fence {
                        language: language.to_owned(),
                    },
                    source: source.to_owned(),
                });
                ProcessResult::Placeholder(placeholder(index))
            }
            _ => ProcessResult::PassThrough,
        }
    }

    fn process_html(&mut self, html: &str, index: usize) -> ProcessResult {
        if embed_tag(html).is_none() {
            return ProcessResult::PassThrough;
        }
        self.extracted.push(ExtractedBlock {
            index,
            origin: BlockOrigin::Html,
            source: html.to_owned(),
        });
        ProcessResult::Placeholder(placeholder(index))
    }

    fn extracted(&self) -> &[ExtractedBlock] {
        &self.extracted
    }
}

/// One embed waiting for resolution, recovered from the extracted blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEmbed {
    /// Placeholder index the result is spliced into.
    pub index: usize,
    /// Parsed directive, or why parsing failed.
    pub directive: Result<Directive, FetchError>,
    /// Embed-level fallback text (an embed tag's body), if any.
    pub fallback: Option<String>,
}

/// Recovers the embeds to resolve from a render's extracted blocks.
#[must_use]
pub fn pending_embeds(blocks: &[ExtractedBlock]) -> Vec<PendingEmbed> {
    blocks.iter().filter_map(pending_embed).collect()
}

fn pending_embed(block: &ExtractedBlock) -> Option<PendingEmbed> {
    match &block.origin {
        BlockOrigin::Fence { language }
            if matches!(language.as_str(), "github" | "stackoverflow") =>
        {
            Some(PendingEmbed {
                index: block.index,
                directive: Directive::from_fence(language, &block.source),
                fallback: None,
            })
        }
        BlockOrigin::Html => {
            let tag = embed_tag(&block.source)?;
            Some(PendingEmbed {
                index: block.index,
                directive: Directive::from_fence(&tag.kind, &tag.url),
                fallback: (!tag.fallback.is_empty()).then_some(tag.fallback),
            })
        }
        BlockOrigin::Fence { .. } => None,
    }
}

/// Failure notice spliced in when content resolves to an error and no
/// fallback is available.
#[must_use]
pub fn error_notice(message: &str) -> String {
    format!(
        r#"<figure class="content-error"><pre>Content resolution failed: {}</pre></figure>"#,
        escape_html(message)
    )
}

/// Recovers the copy payloads for every highlighted (non-embed) block.
#[must_use]
pub fn copy_actions(blocks: &[ExtractedBlock]) -> Vec<CopyAction> {
    blocks
        .iter()
        .filter_map(|block| match &block.origin {
            BlockOrigin::Fence { language } if !is_reserved(language) => Some(CopyAction {
                block_index: block.index,
                text: block.source.clone(),
            }),
            _ => None,
        })
        .collect()
}

/// Collects embed replacements for single-pass application.
///
/// Each `{{EMBED_n}}` placeholder is looked up by index during one scan of
/// the document; placeholders with no replacement are kept as-is.
#[derive(Debug, Default)]
pub struct Replacements {
    map: HashMap<usize, String>,
}

impl Replacements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
        }
    }

    /// Sets the replacement for one placeholder.
    pub fn add(&mut self, index: usize, content: String) {
        self.map.insert(index, content);
    }

    /// Sets a failure notice for one placeholder.
    pub fn add_error(&mut self, index: usize, message: &str) {
        self.add(index, error_notice(message));
    }

    /// Applies every replacement in one scan of `html`.
    pub fn apply(self, html: &mut String) {
        if self.map.is_empty() {
            return;
        }

        let mut result = String::with_capacity(html.len());
        let mut remaining = html.as_str();
        while let Some(start) = remaining.find(PLACEHOLDER_PREFIX) {
            result.push_str(&remaining[..start]);
            let after_prefix = &remaining[start + PLACEHOLDER_PREFIX.len()..];
            let Some(end) = after_prefix.find("}}") else {
                result.push_str(&remaining[start..]);
                remaining = "";
                break;
            };
            let replacement = after_prefix[..end]
                .parse::<usize>()
                .ok()
                .and_then(|index| self.map.get(&index));
            if let Some(content) = replacement {
                result.push_str(content);
            } else {
                // Unknown or malformed index: keep the placeholder as-is.
                result.push_str(&remaining[start..start + PLACEHOLDER_PREFIX.len() + end + 2]);
            }
            remaining = &after_prefix[end + 2..];
        }
        result.push_str(remaining);
        *html = result;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tm_fetch::FetchError;
    use tm_renderer::{
        BlockOrigin, BlockProcessor, ExtractedBlock, HtmlBackend, MarkdownRenderer, ProcessResult,
    };

    use super::{EmbedProcessor, Replacements, copy_actions, pending_embeds};
    use crate::directive::Directive;
    use crate::highlight::HighlightProcessor;

    #[test]
    fn mermaid_fences_render_inline() {
        let mut processor = EmbedProcessor::new();
        let result = processor.process_fence("mermaid", "graph TD\n", 0);
        assert_eq!(
            result,
            ProcessResult::Inline("<div class=\"mermaid\">graph TD\n</div>".to_owned())
        );
        assert!(processor.extracted().is_empty());
    }

    #[test]
    fn fetching_fences_leave_placeholders() {
        let mut processor = EmbedProcessor::new();
        let result = processor.process_fence("github", "https://example.com/doc.md\n", 3);
        assert_eq!(
            result,
            ProcessResult::Placeholder("{{EMBED_3}}".to_owned())
        );
        assert_eq!(processor.extracted().len(), 1);
    }

    #[test]
    fn plain_languages_pass_through() {
        let mut processor = EmbedProcessor::new();
        assert_eq!(
            processor.process_fence("rust", "fn main() {}\n", 0),
            ProcessResult::PassThrough
        );
    }

    #[test]
    fn embed_tags_in_html_blocks_are_claimed() {
        let mut processor = EmbedProcessor::new();
        let html = "<github url=\"https://example.com/doc.md\">\nfallback\n</github>\n";
        assert_eq!(
            processor.process_html(html, 1),
            ProcessResult::Placeholder("{{EMBED_1}}".to_owned())
        );
        assert_eq!(
            processor.process_html("<div class=\"note\">\nhi\n</div>\n", 2),
            ProcessResult::PassThrough
        );
    }

    #[test]
    fn pending_embeds_parse_fences_and_tags() {
        let blocks = vec![
            ExtractedBlock {
                index: 0,
                origin: BlockOrigin::Fence {
                    language: "github".to_owned(),
                },
                source: "https://example.com/doc.md\n".to_owned(),
            },
            ExtractedBlock {
                index: 1,
                origin: BlockOrigin::Html,
                source: "<stackoverflow url=\"https://stackoverflow.com/a/7\">\nSee the answer.\n</stackoverflow>\n"
                    .to_owned(),
            },
        ];

        let pending = pending_embeds(&blocks);
        assert_eq!(pending.len(), 2);
        assert_eq!(
            pending[0].directive,
            Ok(Directive::GithubMarkdown {
                url: "https://example.com/doc.md".to_owned(),
            })
        );
        assert_eq!(pending[0].fallback, None);
        assert_eq!(pending[1].fallback, Some("See the answer.".to_owned()));
        assert!(matches!(
            pending[1].directive,
            Ok(Directive::StackOverflowAnswer { ref id, .. }) if id == "7"
        ));
    }

    #[test]
    fn malformed_directives_surface_as_errors() {
        let blocks = vec![ExtractedBlock {
            index: 0,
            origin: BlockOrigin::Fence {
                language: "stackoverflow".to_owned(),
            },
            source: "no id here\n".to_owned(),
        }];

        let pending = pending_embeds(&blocks);
        assert!(matches!(
            pending[0].directive,
            Err(FetchError::Directive { .. })
        ));
    }

    #[test]
    fn copy_actions_skip_embed_blocks() {
        let blocks = vec![
            ExtractedBlock {
                index: 0,
                origin: BlockOrigin::Fence {
                    language: "github".to_owned(),
                },
                source: "https://example.com/doc.md\n".to_owned(),
            },
            ExtractedBlock {
                index: 1,
                origin: BlockOrigin::Fence {
                    language: "rust".to_owned(),
                },
                source: "fn main() {}\n".to_owned(),
            },
        ];

        let actions = copy_actions(&blocks);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].block_index, 1);
        assert_eq!(actions[0].text, "fn main() {}\n");
    }

    #[test]
    fn replacements_splice_in_one_pass() {
        let mut html = String::from("{{EMBED_2}}<p>middle</p>{{EMBED_0}}");
        let mut replacements = Replacements::new();
        replacements.add(0, "<p>zero</p>".to_owned());
        replacements.add(2, "<p>two</p>".to_owned());

        replacements.apply(&mut html);
        assert_eq!(html, "<p>two</p><p>middle</p><p>zero</p>");
    }

    #[test]
    fn unknown_placeholders_are_kept() {
        let mut html = String::from("{{EMBED_0}}{{EMBED_9}}{{EMBED_x}}");
        let mut replacements = Replacements::new();
        replacements.add(0, "A".to_owned());

        replacements.apply(&mut html);
        assert_eq!(html, "A{{EMBED_9}}{{EMBED_x}}");
    }

    #[test]
    fn unterminated_placeholders_are_kept() {
        let mut html = String::from("before {{EMBED_1");
        let mut replacements = Replacements::new();
        replacements.add(1, "A".to_owned());

        replacements.apply(&mut html);
        assert_eq!(html, "before {{EMBED_1");
    }

    #[test]
    fn empty_replacements_leave_the_document_alone() {
        let mut html = String::from("<p>{{EMBED_0}}</p>");
        Replacements::new().apply(&mut html);
        assert_eq!(html, "<p>{{EMBED_0}}</p>");
    }

    #[test]
    fn error_notices_are_escaped_figures() {
        let mut html = String::from("{{EMBED_0}}");
        let mut replacements = Replacements::new();
        replacements.add_error(0, "status 404 <Not Found>");

        replacements.apply(&mut html);
        assert_eq!(
            html,
            "<figure class=\"content-error\"><pre>Content resolution failed: status 404 &lt;Not Found&gt;</pre></figure>"
        );
    }

    #[test]
    fn processors_compose_over_a_full_document() {
        let markdown = "# Title\n\n```github\nhttps://example.com/doc.md\n```\n\n```rust\nfn main() {}\n```\n";
        let mut renderer = MarkdownRenderer::<HtmlBackend>::new()
            .with_processor(EmbedProcessor::new())
            .with_processor(HighlightProcessor::new());
        let result = renderer.render_markdown(markdown);

        assert!(result.html.contains("{{EMBED_0}}"));
        assert!(result.html.contains(r#"<code class="language-rust">"#));

        let blocks: Vec<_> = renderer.extracted_blocks().collect();
        let pending = pending_embeds(&blocks);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].index, 0);

        let actions = copy_actions(&blocks);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].text, "fn main() {}\n");

        let mut replacements = Replacements::with_capacity(1);
        replacements.add(0, "<p>spliced</p>".to_owned());
        let mut html = result.html;
        replacements.apply(&mut html);
        assert!(html.contains("<p>spliced</p>"));
        assert!(!html.contains("{{EMBED_0}}"));
    }
}
