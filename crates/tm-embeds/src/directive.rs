use std::sync::LazyLock;

use regex::Regex;
use tm_fetch::{CacheKey, FetchError};
use url::Url;

/// Everything a fenced code block or embed tag can ask for.
///
/// Reserved fence languages (`github`, `stackoverflow`, `mermaid`) and the
/// equivalent raw-HTML embed tags map to the specialized variants; every
/// other language tag is an ordinary [`CodeBlock`](Self::CodeBlock) to
/// display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Fetch `url` and treat the response text as markdown.
    PlainText { url: String },
    /// Fetch a remote markdown document, typically a raw GitHub file.
    GithubMarkdown { url: String },
    /// Fetch a Stack Overflow answer body through the answers API.
    StackOverflowAnswer { id: String, url: String },
    /// Diagram source rendered locally; no fetch involved.
    Mermaid { source: String },
    /// Ordinary code block; displayed with syntax highlighting.
    CodeBlock { language: String },
}

impl Directive {
    /// Classifies a fenced code block by its language tag.
    ///
    /// Reserved tags validate their body here, so a `stackoverflow` fence
    /// without a derivable answer id fails before any fetch is attempted.
    pub fn from_fence(language: &str, body: &str) -> Result<Self, FetchError> {
        match language {
            "github" => {
                let url = body.trim();
                if url.is_empty() {
                    return Err(FetchError::directive("github embed has no url"));
                }
                Ok(Self::GithubMarkdown {
                    url: url.to_owned(),
                })
            }
            "stackoverflow" => {
                let url = body.trim();
                let id = answer_id(url)
                    .ok_or_else(|| FetchError::directive(format!("no answer id in url '{url}'")))?;
                Ok(Self::StackOverflowAnswer {
                    id,
                    url: url.to_owned(),
                })
            }
            "mermaid" => Ok(Self::Mermaid {
                source: body.to_owned(),
            }),
            _ => Ok(Self::CodeBlock {
                language: language.to_owned(),
            }),
        }
    }

    /// Directive for fetching a remote markdown document directly.
    pub fn plain_text(url: impl Into<String>) -> Self {
        Self::PlainText { url: url.into() }
    }

    /// Cache key for the fetch this directive implies.
    ///
    /// Stack Overflow answers key on the answer id, so differently shaped
    /// links to one answer share an entry. Local directives have no key.
    pub fn cache_key(&self) -> Option<CacheKey> {
        match self {
            Self::PlainText { url } | Self::GithubMarkdown { url } => {
                Some(CacheKey::from(url.as_str()))
            }
            Self::StackOverflowAnswer { id, .. } => Some(CacheKey::from(id.as_str())),
            Self::Mermaid { .. } | Self::CodeBlock { .. } => None,
        }
    }
}

/// True for the fence languages that carry a non-display directive.
pub(crate) fn is_reserved(language: &str) -> bool {
    matches!(language, "github" | "stackoverflow" | "mermaid")
}

/// Derives the answer id from a Stack Overflow link.
///
/// Handles the `/a/{id}` short form and the `/questions/{qid}/{id}` form,
/// then falls back to the last all-numeric path segment.
fn answer_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segments: Vec<&str> = parsed.path_segments()?.filter(|s| !s.is_empty()).collect();

    if let Some(pos) = segments.iter().position(|s| *s == "a") {
        if let Some(id) = segments.get(pos + 1) {
            return Some((*id).to_owned());
        }
    }
    if segments.first() == Some(&"questions") && segments.len() >= 3 {
        return segments.last().map(|s| (*s).to_owned());
    }
    segments
        .iter()
        .rev()
        .find(|s| s.bytes().all(|b| b.is_ascii_digit()))
        .map(|s| (*s).to_owned())
}

/// A named embed tag found in a raw HTML block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EmbedTag {
    pub kind: String,
    pub url: String,
    pub fallback: String,
}

static GITHUB_TAG: LazyLock<Regex> = LazyLock::new(|| tag_regex("github"));
static STACKOVERFLOW_TAG: LazyLock<Regex> = LazyLock::new(|| tag_regex("stackoverflow"));

fn tag_regex(tag: &str) -> Regex {
    let pattern = format!(r#"(?s)<{tag}\s+url\s*=\s*"([^"]*)"\s*>(.*?)</{tag}>"#);
    Regex::new(&pattern).expect("valid embed tag pattern")
}

/// Recognizes `<github url="…">…</github>` and the `stackoverflow`
/// equivalent inside a raw HTML block. The tag body is the fallback text.
pub(crate) fn embed_tag(html: &str) -> Option<EmbedTag> {
    for (kind, pattern) in [("github", &*GITHUB_TAG), ("stackoverflow", &*STACKOVERFLOW_TAG)] {
        if let Some(captures) = pattern.captures(html) {
            return Some(EmbedTag {
                kind: kind.to_owned(),
                url: captures[1].trim().to_owned(),
                fallback: captures[2].trim().to_owned(),
            });
        }
    }
    None
}
