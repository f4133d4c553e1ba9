//! Event-stream markdown renderer with pluggable backends.
//!
//! This crate provides a generic [`MarkdownRenderer`] that walks a
//! pulldown-cmark event stream and produces output through the
//! [`RenderBackend`] trait.
//!
//! # Architecture
//!
//! Shared structure (headings, tables, lists, inline formatting) is handled
//! by the generic renderer, while surface-specific elements (code blocks,
//! blockquotes, images, link targets) are delegated to the backend:
//! - [`HtmlBackend`]: semantic HTML5 with relative link resolution
//!
//! Fenced code blocks and raw HTML blocks can be intercepted by
//! [`BlockProcessor`] implementations. A processor either rewrites the block
//! inline or emits a placeholder and records the block for deferred
//! handling, which the caller resolves after the event pass.
//!
//! # Example
//!
//! ```
//! use pulldown_cmark::Parser;
//! use tm_renderer::{MarkdownRenderer, HtmlBackend};
//!
//! let markdown = "# Hello\n\n**Bold** text";
//! let parser = Parser::new(markdown);
//! let result = MarkdownRenderer::<HtmlBackend>::new()
//!     .with_title_extraction()
//!     .render(parser);
//! ```

mod backend;
mod block;
mod html;
mod renderer;
mod state;
mod util;

pub use backend::RenderBackend;
pub use block::{BlockOrigin, BlockProcessor, ExtractedBlock, ProcessResult};
pub use html::HtmlBackend;
pub use renderer::{MarkdownRenderer, RenderResult};
pub use state::{TocEntry, escape_html};
