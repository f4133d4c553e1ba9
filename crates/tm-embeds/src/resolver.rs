use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tm_fetch::{FetchError, Fetcher, Transport};

use crate::directive::Directive;

/// Stack Exchange answers API parameters.
///
/// The key is a public quota key. It is optional, appended to the query
/// string only when present, and is expected to arrive through
/// configuration rather than source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackExchangeConfig {
    pub api_base: String,
    pub site: String,
    pub filter: String,
    pub key: Option<String>,
}

impl Default for StackExchangeConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.stackexchange.com/2.3".to_owned(),
            site: "stackoverflow".to_owned(),
            filter: "!nNPvSNdWme".to_owned(),
            key: None,
        }
    }
}

/// Maps a [`Directive`] to the fetch that produces its markdown text.
pub struct SourceResolver {
    transport: Arc<dyn Transport>,
    stackexchange: StackExchangeConfig,
}

impl SourceResolver {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            stackexchange: StackExchangeConfig::default(),
        }
    }

    #[must_use]
    pub fn with_stackexchange(mut self, config: StackExchangeConfig) -> Self {
        self.stackexchange = config;
        self
    }

    /// Resolves `directive` to markdown text.
    ///
    /// Local directives (`Mermaid`, `CodeBlock`) never fetch and resolve
    /// to a `Directive` error if asked.
    pub async fn resolve(&self, directive: &Directive) -> Result<String, FetchError> {
        match directive {
            Directive::PlainText { url } | Directive::GithubMarkdown { url } => {
                self.transport.get_text(url).await
            }
            Directive::StackOverflowAnswer { id, url } => self.resolve_answer(id, url).await,
            Directive::Mermaid { .. } => {
                Err(FetchError::directive("mermaid diagrams render locally"))
            }
            Directive::CodeBlock { .. } => {
                Err(FetchError::directive("plain code blocks are not fetched"))
            }
        }
    }

    async fn resolve_answer(&self, id: &str, url: &str) -> Result<String, FetchError> {
        let request_url = self.answers_url(id);
        tracing::debug!(id = %id, "fetching answer");
        let body = self.transport.get_text(&request_url).await?;
        let response: AnswersResponse =
            serde_json::from_str(&body).map_err(|e| FetchError::response_shape(e.to_string()))?;
        let answer = response
            .items
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::response_shape(format!("no answer found for id {id}")))?;
        Ok(quote_answer(&answer, url))
    }

    fn answers_url(&self, id: &str) -> String {
        let config = &self.stackexchange;
        let mut request_url = format!(
            "{}/answers/{id}?order=desc&sort=activity&site={}&filter={}",
            config.api_base, config.site, config.filter
        );
        if let Some(key) = config.key.as_deref().filter(|key| !key.is_empty()) {
            request_url.push_str("&key=");
            request_url.push_str(key);
        }
        request_url
    }
}

/// Formats an answer as a block quotation with an attribution line,
/// ready to be rendered as markdown.
fn quote_answer(answer: &Answer, url: &str) -> String {
    let mut text = String::with_capacity(answer.body.len() + 64);
    for line in answer.body.lines() {
        text.push_str("> ");
        text.push_str(line);
        text.push('\n');
    }
    let name = answer
        .owner
        .as_ref()
        .and_then(|owner| owner.display_name.as_deref())
        .unwrap_or("unknown");
    let link = answer
        .owner
        .as_ref()
        .and_then(|owner| owner.link.as_deref())
        .unwrap_or(url);
    text.push('\n');
    text.push_str(&format!("<sub>- [{name}]({link}): {url}</sub>\n"));
    text
}

#[derive(Debug, Deserialize)]
struct AnswersResponse {
    #[serde(default)]
    items: Vec<Answer>,
}

#[derive(Debug, Deserialize)]
struct Answer {
    body: String,
    #[serde(default)]
    owner: Option<Owner>,
}

#[derive(Debug, Deserialize)]
struct Owner {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

/// Couples a directive with the resolver so the cache can run the fetch.
pub struct DirectiveFetcher {
    resolver: Arc<SourceResolver>,
    directive: Directive,
}

impl DirectiveFetcher {
    pub fn new(resolver: Arc<SourceResolver>, directive: Directive) -> Self {
        Self {
            resolver,
            directive,
        }
    }
}

#[async_trait]
impl Fetcher for DirectiveFetcher {
    async fn fetch(&self) -> Result<String, FetchError> {
        self.resolver.resolve(&self.directive).await
    }
}
