//! Document rendering pipeline.
//!
//! [`RenderPipeline`] ties the pieces together: markdown is rendered with
//! the embed and highlight processors installed, claimed embeds are fetched
//! through the shared cache, and each resolved document is rendered the
//! same way and spliced over its placeholder. Fetch failures degrade to
//! fallback text or a failure notice instead of failing the render.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use tm_embeds::{
    CopyAction, DiagramRenderer, Directive, DirectiveFetcher, EmbedProcessor, HighlightProcessor,
    MermaidHook, PendingEmbed, Replacements, SourceResolver, StackExchangeConfig, copy_actions,
    error_notice, pending_embeds,
};
use tm_fetch::{
    CacheKey, FetchCache, FetchError, FetchState, FetchTicket, Fetcher, HttpTransport, Transport,
};
use tm_renderer::{ExtractedBlock, HtmlBackend, MarkdownRenderer, TocEntry};

use crate::config::PipelineConfig;
use crate::context::{ContentSource, RenderContext, RenderRequest, VisualFlags};

/// Default limit on embed nesting depth.
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// A fully processed document.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedDocument {
    /// Rendered HTML, including the wrapper element.
    pub html: String,
    /// Title extracted from the document's first H1 heading.
    pub title: Option<String>,
    /// Table of contents of the top-level document.
    pub toc: Vec<TocEntry>,
    /// Everything that went wrong but was recovered from, in document
    /// order, including warnings from embedded documents.
    pub warnings: Vec<String>,
    /// Copy payloads for the highlighted code blocks, across the document
    /// and every embed.
    pub copy_actions: Vec<CopyAction>,
    /// True when the document body came from a settled cache entry rather
    /// than a fetch performed by this render.
    pub from_cache: bool,
}

/// How unresolved content is treated during a render.
#[derive(Debug, Clone, Copy)]
enum Mode {
    /// Wait for every fetch to settle.
    Settled,
    /// Report the current state without waiting; loading content renders
    /// as placeholder text.
    Snapshot,
}

/// Renders markdown documents with embedded remote content.
///
/// The pipeline owns a [`FetchCache`], so repeated renders and shared
/// embeds resolve each source once. It is cheap to keep one pipeline for
/// the life of the process and render every document through it.
pub struct RenderPipeline {
    cache: FetchCache,
    transport: Arc<dyn Transport>,
    stackexchange: StackExchangeConfig,
    diagrams: Arc<dyn DiagramRenderer>,
    base_path: Option<String>,
    max_depth: usize,
}

impl RenderPipeline {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            cache: FetchCache::new(),
            transport,
            stackexchange: StackExchangeConfig::default(),
            diagrams: Arc::new(MermaidHook),
            base_path: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Build a pipeline from loaded configuration, with an HTTP transport.
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            cache: FetchCache::with_policy(config.fetch.policy()),
            transport: Arc::new(HttpTransport::with_timeout(config.fetch.timeout())),
            stackexchange: config.stackexchange.to_config(),
            diagrams: Arc::new(MermaidHook),
            base_path: config.pipeline.base_path.clone(),
            max_depth: config.pipeline.max_depth,
        }
    }

    /// Replaces the fetch cache, for sharing one cache between pipelines.
    #[must_use]
    pub fn with_cache(mut self, cache: FetchCache) -> Self {
        self.cache = cache;
        self
    }

    /// Sets the Stack Exchange API parameters.
    #[must_use]
    pub fn with_stackexchange(mut self, config: StackExchangeConfig) -> Self {
        self.stackexchange = config;
        self
    }

    /// Replaces the diagram capability.
    #[must_use]
    pub fn with_diagram_renderer(mut self, diagrams: Arc<dyn DiagramRenderer>) -> Self {
        self.diagrams = diagrams;
        self
    }

    /// Base path for resolving relative markdown links.
    #[must_use]
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    /// Limit on embed nesting depth.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// The pipeline's fetch cache.
    ///
    /// Exposed so hosts can [`invalidate`](FetchCache::invalidate) entries
    /// or inspect fetch state out of band.
    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    /// Render a document, waiting for every fetch to settle.
    pub async fn render(&self, request: RenderRequest) -> RenderedDocument {
        self.run(request, Mode::Settled).await
    }

    /// Render a document without waiting for in-flight fetches.
    ///
    /// Content that is still loading renders as placeholder text; fetches
    /// started by this call keep running, so a later render picks up their
    /// results from the cache.
    pub async fn render_snapshot(&self, request: RenderRequest) -> RenderedDocument {
        self.run(request, Mode::Snapshot).await
    }

    async fn run(&self, request: RenderRequest, mode: Mode) -> RenderedDocument {
        let resolver = self.resolver();
        let RenderRequest {
            source,
            key,
            fallback,
            placeholder,
            flags,
        } = request;

        let (key, fetcher): (CacheKey, Arc<dyn Fetcher>) = match source {
            ContentSource::Literal(markdown) => {
                let context = RenderContext::root(flags, key.as_ref());
                let tree = self
                    .render_tree(&resolver, &markdown, &context, mode, 0)
                    .await;
                return RenderedDocument {
                    html: wrap(flags, &tree.html),
                    title: tree.title,
                    toc: tree.toc,
                    warnings: tree.warnings,
                    copy_actions: tree.copy_actions,
                    from_cache: false,
                };
            }
            ContentSource::Remote { url } => {
                let fetcher = Arc::new(DirectiveFetcher::new(
                    Arc::clone(&resolver),
                    Directive::plain_text(url.as_str()),
                ));
                (key.unwrap_or_else(|| CacheKey::from(url)), fetcher)
            }
            ContentSource::Custom {
                key: source_key,
                fetcher,
            } => (key.unwrap_or(source_key), fetcher),
        };

        tracing::debug!(key = %key, mode = ?mode, "render started");
        let from_cache = self.cache.get(key.clone()).is_terminal();
        let mut ticket = self.cache.request(key.clone(), fetcher);
        let state = match mode {
            Mode::Settled => ticket.settled().await,
            Mode::Snapshot => ticket.state(),
        };

        match state {
            FetchState::Success(markdown) => {
                let context = RenderContext::root(flags, Some(&key));
                let tree = self
                    .render_tree(&resolver, &markdown, &context, mode, 0)
                    .await;
                RenderedDocument {
                    html: wrap(flags, &tree.html),
                    title: tree.title,
                    toc: tree.toc,
                    warnings: tree.warnings,
                    copy_actions: tree.copy_actions,
                    from_cache,
                }
            }
            FetchState::Failure(error) => {
                tracing::warn!(key = %key, error = %error, "document fetch failed");
                let inner = match &fallback {
                    Some(markdown) => plain_html(markdown),
                    None => error_notice(&error.to_string()),
                };
                RenderedDocument {
                    html: wrap(flags, &inner),
                    title: None,
                    toc: Vec::new(),
                    warnings: vec![format!("document '{key}': {error}")],
                    copy_actions: Vec::new(),
                    from_cache,
                }
            }
            FetchState::Idle | FetchState::Loading => {
                let inner = placeholder.as_deref().map(plain_html).unwrap_or_default();
                RenderedDocument {
                    html: wrap(flags, &inner),
                    title: None,
                    toc: Vec::new(),
                    warnings: Vec::new(),
                    copy_actions: Vec::new(),
                    from_cache: false,
                }
            }
        }
    }

    fn resolver(&self) -> Arc<SourceResolver> {
        Arc::new(
            SourceResolver::new(Arc::clone(&self.transport))
                .with_stackexchange(self.stackexchange.clone()),
        )
    }

    /// Renders one document and resolves its embeds recursively.
    ///
    /// Boxed because the recursion depth is only known at runtime.
    fn render_tree<'a>(
        &'a self,
        resolver: &'a Arc<SourceResolver>,
        markdown: &'a str,
        context: &'a RenderContext,
        mode: Mode,
        first_index: usize,
    ) -> Pin<Box<dyn Future<Output = RenderedTree> + Send + 'a>> {
        Box::pin(async move {
            let (mut tree, pending) = self.render_pass(markdown, context, first_index);
            if pending.is_empty() {
                return tree;
            }

            // Claim every embed before awaiting any of them, so sibling
            // fetches run concurrently.
            let jobs: Vec<EmbedJob> = pending
                .into_iter()
                .map(|embed| self.embed_job(resolver, embed, context))
                .collect();

            let mut replacements = Replacements::with_capacity(jobs.len());
            for job in jobs {
                match job.outcome {
                    EmbedOutcome::Claimed {
                        key,
                        mut ticket,
                        loading_text,
                    } => {
                        let state = match mode {
                            Mode::Settled => ticket.settled().await,
                            Mode::Snapshot => ticket.state(),
                        };
                        let nested = context.nested(&key);
                        match state {
                            FetchState::Success(text) => {
                                let child = self
                                    .render_tree(resolver, &text, &nested, mode, tree.next_index)
                                    .await;
                                tree.next_index = child.next_index;
                                tree.warnings.extend(child.warnings);
                                tree.copy_actions.extend(child.copy_actions);
                                replacements.add(job.index, wrap(nested.flags, &child.html));
                            }
                            FetchState::Failure(error) => {
                                tracing::warn!(key = %key, error = %error, "embed fetch failed");
                                tree.warnings.push(format!("embed '{key}': {error}"));
                                let inner = match &job.fallback {
                                    Some(markdown) => plain_html(markdown),
                                    None => error_notice(&error.to_string()),
                                };
                                replacements.add(job.index, wrap(nested.flags, &inner));
                            }
                            FetchState::Idle | FetchState::Loading => {
                                let inner = plain_html(&loading_text);
                                replacements.add(job.index, wrap(nested.flags, &inner));
                            }
                        }
                    }
                    EmbedOutcome::Rejected(error) => {
                        tree.warnings.push(format!("embed {}: {error}", job.index));
                        let inner = match &job.fallback {
                            Some(markdown) => plain_html(markdown),
                            None => error_notice(&error.to_string()),
                        };
                        replacements.add(job.index, wrap(VisualFlags::nested(), &inner));
                    }
                }
            }

            replacements.apply(&mut tree.html);
            tree
        })
    }

    /// One markdown-to-HTML pass with the pipeline's processors installed.
    ///
    /// Title extraction only runs for the top-level document; embed titles
    /// stay ordinary headings.
    fn render_pass(
        &self,
        markdown: &str,
        context: &RenderContext,
        first_index: usize,
    ) -> (RenderedTree, Vec<PendingEmbed>) {
        let mut renderer = MarkdownRenderer::<HtmlBackend>::new()
            .with_first_block_index(first_index)
            .with_preview(context.flags.preview)
            .with_processor(EmbedProcessor::new().with_diagram_renderer(Arc::clone(&self.diagrams)))
            .with_processor(HighlightProcessor::new());
        if context.depth == 0 {
            renderer = renderer.with_title_extraction();
        }
        if let Some(base_path) = &self.base_path {
            renderer = renderer.with_base_path(base_path.as_str());
        }

        let result = renderer.render_markdown(markdown);
        let blocks: Vec<ExtractedBlock> = renderer.extracted_blocks().collect();
        let tree = RenderedTree {
            html: result.html,
            title: result.title,
            toc: result.toc,
            warnings: result.warnings,
            copy_actions: copy_actions(&blocks),
            next_index: renderer.next_block_index(),
        };
        (tree, pending_embeds(&blocks))
    }

    /// Turns a pending embed into a job, claiming its cache entry.
    ///
    /// Cycles and the depth limit are rejected here, before any fetch
    /// starts.
    fn embed_job(
        &self,
        resolver: &Arc<SourceResolver>,
        embed: PendingEmbed,
        context: &RenderContext,
    ) -> EmbedJob {
        let PendingEmbed {
            index,
            directive,
            fallback,
        } = embed;
        let outcome = match directive {
            Err(error) => EmbedOutcome::Rejected(error),
            Ok(directive) => match directive.cache_key() {
                None => EmbedOutcome::Rejected(FetchError::directive(
                    "embed directive has no remote source",
                )),
                Some(key) if context.visited.contains(&key) => EmbedOutcome::Rejected(
                    FetchError::directive(format!("cyclic embed of '{key}'")),
                ),
                Some(key) if context.depth + 1 > self.max_depth => {
                    EmbedOutcome::Rejected(FetchError::directive(format!(
                        "embed depth limit of {} reached at '{key}'",
                        self.max_depth
                    )))
                }
                Some(key) => {
                    let loading_text = loading_placeholder(&directive);
                    let fetcher: Arc<dyn Fetcher> =
                        Arc::new(DirectiveFetcher::new(Arc::clone(resolver), directive));
                    EmbedOutcome::Claimed {
                        ticket: self.cache.request(key.clone(), fetcher),
                        key,
                        loading_text,
                    }
                }
            },
        };
        EmbedJob {
            index,
            fallback,
            outcome,
        }
    }
}

/// One rendered document inside the tree, before wrapping.
struct RenderedTree {
    html: String,
    title: Option<String>,
    toc: Vec<TocEntry>,
    warnings: Vec<String>,
    copy_actions: Vec<CopyAction>,
    next_index: usize,
}

/// One embed's resolution work.
struct EmbedJob {
    index: usize,
    fallback: Option<String>,
    outcome: EmbedOutcome,
}

enum EmbedOutcome {
    /// The embed's cache entry is claimed and its fetch is running or done.
    Claimed {
        key: CacheKey,
        ticket: FetchTicket,
        loading_text: String,
    },
    /// The embed is not resolved: bad directive, cycle, or depth limit.
    Rejected(FetchError),
}

/// Markdown shown for an embed that has not resolved in a snapshot.
fn loading_placeholder(directive: &Directive) -> String {
    match directive {
        Directive::PlainText { url } | Directive::GithubMarkdown { url } => {
            format!("Loading Markdown from Github: {url}")
        }
        Directive::StackOverflowAnswer { url, .. } => {
            format!("See this Stackoverflow answer: [{url}]({url})")
        }
        Directive::Mermaid { .. } | Directive::CodeBlock { .. } => String::new(),
    }
}

/// Wraps rendered content in the presentation element its flags describe.
fn wrap(flags: VisualFlags, inner: &str) -> String {
    let mut classes = String::from("markdown");
    if flags.compact {
        classes.push_str(" compact");
    }
    if flags.centered {
        classes.push_str(" centered");
    }
    if flags.disable_padding {
        classes.push_str(" no-padding");
    }
    if flags.landing {
        classes.push_str(" landing");
    }
    if flags.preview {
        classes.push_str(" preview");
    }
    match flags.optimistic_height {
        Some(px) => format!(r#"<div class="{classes}" style="min-height: {px}px">{inner}</div>"#),
        None => format!(r#"<div class="{classes}">{inner}</div>"#),
    }
}

/// Renders markdown with no processors installed, for fallback and
/// placeholder text.
fn plain_html(markdown: &str) -> String {
    MarkdownRenderer::<HtmlBackend>::new()
        .render_markdown(markdown)
        .html
}
