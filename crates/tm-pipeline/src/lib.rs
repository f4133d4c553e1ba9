//! Content resolution and rendering pipeline.
//!
//! This crate provides:
//! - [`RenderPipeline`]: renders markdown documents, resolving embedded
//!   remote content through a shared fetch cache
//! - [`RenderRequest`]: one render invocation with presentation and
//!   recovery options
//! - [`PipelineConfig`]: TOML configuration with auto-discovery
//!
//! # Quick Start
//!
//! ```no_run
//! # async fn demo() {
//! use std::sync::Arc;
//! use tm_pipeline::{HttpTransport, RenderPipeline, RenderRequest};
//!
//! let pipeline = RenderPipeline::new(Arc::new(HttpTransport::new()));
//!
//! // Render a remote document; embeds inside it resolve recursively.
//! let request = RenderRequest::remote("https://example.com/post.md")
//!     .with_fallback("The post could not be loaded.");
//! let document = pipeline.render(request).await;
//! let _ = document.html;
//! # }
//! ```

mod config;
mod context;
mod pipeline;

pub use config::{ConfigError, FetchSection, PipelineConfig, PipelineSection, StackExchangeSection};
pub use context::{ContentSource, RenderRequest, VisualFlags};
pub use pipeline::{DEFAULT_MAX_DEPTH, RenderPipeline, RenderedDocument};

// Re-export the types that appear in the pipeline's public API
pub use tm_embeds::{CopyAction, DiagramRenderer, StackExchangeConfig};
pub use tm_fetch::{CacheKey, FetchCache, FetchError, Fetcher, HttpTransport, Transport};
pub use tm_renderer::TocEntry;
