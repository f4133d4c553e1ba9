//! Render requests and the per-document context threaded through nested
//! renders.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tm_fetch::{CacheKey, Fetcher};

/// Presentation flags applied to a rendered document's wrapper element.
///
/// Each flag maps onto a class of the output `<div>`; styling is left to
/// the host. The default set centers the document and leaves everything
/// else off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct VisualFlags {
    /// Tighter typography for dense surfaces.
    pub compact: bool,
    /// Center the document horizontally.
    pub centered: bool,
    /// Drop the default padding around the document.
    pub disable_padding: bool,
    /// Landing-page presentation.
    pub landing: bool,
    /// Render headings as bold text instead of heading elements.
    pub preview: bool,
    /// Minimum height in pixels reserved for the wrapper, so content that
    /// arrives late does not shift the layout around it.
    pub optimistic_height: Option<u32>,
}

impl Default for VisualFlags {
    fn default() -> Self {
        Self {
            compact: false,
            centered: true,
            disable_padding: false,
            landing: false,
            preview: false,
            optimistic_height: None,
        }
    }
}

impl VisualFlags {
    /// Flags for a document spliced in as an embed. Embeds never inherit
    /// the parent's presentation; they start from the defaults with
    /// centering turned off.
    pub(crate) fn nested() -> Self {
        Self {
            centered: false,
            ..Self::default()
        }
    }
}

/// Where a document's markdown text comes from.
#[derive(Clone)]
pub enum ContentSource {
    /// Markdown supplied directly by the caller.
    Literal(String),
    /// Markdown fetched from a URL.
    Remote {
        /// Document URL, also the default cache key.
        url: String,
    },
    /// Markdown produced by a caller-supplied fetcher.
    Custom {
        /// Cache key the fetched content is shared under.
        key: CacheKey,
        /// Fetcher invoked on a cache miss.
        fetcher: Arc<dyn Fetcher>,
    },
}

impl fmt::Debug for ContentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => f.debug_tuple("Literal").field(text).finish(),
            Self::Remote { url } => f.debug_struct("Remote").field("url", url).finish(),
            Self::Custom { key, .. } => f
                .debug_struct("Custom")
                .field("key", key)
                .finish_non_exhaustive(),
        }
    }
}

/// One render invocation: a content source plus presentation and recovery
/// options.
///
/// Build a request with [`literal`](Self::literal), [`remote`](Self::remote)
/// or [`fetcher`](Self::fetcher), refine it with the `with_` builders and
/// hand it to [`RenderPipeline::render`](crate::RenderPipeline::render).
/// Requests are cheap to clone; resolved content is shared through the
/// pipeline's cache, not the request.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub(crate) source: ContentSource,
    pub(crate) key: Option<CacheKey>,
    pub(crate) fallback: Option<String>,
    pub(crate) placeholder: Option<String>,
    pub(crate) flags: VisualFlags,
}

impl RenderRequest {
    /// Render markdown text supplied directly. Nothing is fetched for the
    /// document itself; embeds inside it still resolve normally.
    pub fn literal(markdown: impl Into<String>) -> Self {
        Self::new(ContentSource::Literal(markdown.into()))
    }

    /// Render a remote markdown document. The URL doubles as the cache key
    /// unless [`with_key`](Self::with_key) overrides it.
    pub fn remote(url: impl Into<String>) -> Self {
        Self::new(ContentSource::Remote { url: url.into() })
    }

    /// Render content produced by a caller-supplied fetcher, cached under
    /// `key`.
    pub fn fetcher(key: impl Into<CacheKey>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self::new(ContentSource::Custom {
            key: key.into(),
            fetcher,
        })
    }

    fn new(source: ContentSource) -> Self {
        Self {
            source,
            key: None,
            fallback: None,
            placeholder: None,
            flags: VisualFlags::default(),
        }
    }

    /// Cache the document under `key` instead of the source's own key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<CacheKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Markdown rendered in place of the document when its fetch fails.
    #[must_use]
    pub fn with_fallback(mut self, markdown: impl Into<String>) -> Self {
        self.fallback = Some(markdown.into());
        self
    }

    /// Markdown rendered while the document is still loading in a
    /// [`render_snapshot`](crate::RenderPipeline::render_snapshot). Without
    /// one, a loading document renders as an empty wrapper.
    #[must_use]
    pub fn with_placeholder(mut self, markdown: impl Into<String>) -> Self {
        self.placeholder = Some(markdown.into());
        self
    }

    /// Presentation flags for the document wrapper.
    #[must_use]
    pub fn with_flags(mut self, flags: VisualFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Per-document state threaded through nested renders.
///
/// `visited` holds the cache keys of the document and every ancestor; an
/// embed whose key is already present is a cycle and is not resolved.
#[derive(Debug, Clone)]
pub(crate) struct RenderContext {
    pub(crate) flags: VisualFlags,
    pub(crate) depth: usize,
    pub(crate) visited: HashSet<CacheKey>,
}

impl RenderContext {
    pub(crate) fn root(flags: VisualFlags, key: Option<&CacheKey>) -> Self {
        Self {
            flags,
            depth: 0,
            visited: key.cloned().into_iter().collect(),
        }
    }

    pub(crate) fn nested(&self, key: &CacheKey) -> Self {
        let mut visited = self.visited.clone();
        visited.insert(key.clone());
        Self {
            flags: VisualFlags::nested(),
            depth: self.depth + 1,
            visited,
        }
    }
}
