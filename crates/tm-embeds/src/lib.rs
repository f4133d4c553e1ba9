//! Embed directives, remote answer resolution and code block processors
//! for the content-resolution pipeline.
//!
//! A fenced code block's language tag (or a named embed tag in a raw HTML
//! block) selects a [`Directive`]: remote markdown, a Stack Overflow
//! answer, a mermaid diagram, or an ordinary code block. The processors
//! here plug into `tm_renderer`'s block hooks: [`EmbedProcessor`] claims
//! directive-bearing blocks and leaves placeholders for the pipeline to
//! resolve, [`HighlightProcessor`] renders everything else as highlighted
//! code with a copy action.
//!
//! ```
//! use tm_embeds::EmbedProcessor;
//! use tm_renderer::{HtmlBackend, MarkdownRenderer};
//!
//! let markdown = "```mermaid\ngraph TD\n  A --> B\n```";
//! let mut renderer =
//!     MarkdownRenderer::<HtmlBackend>::new().with_processor(EmbedProcessor::new());
//! let result = renderer.render_markdown(markdown);
//! assert!(result.html.contains(r#"<div class="mermaid">"#));
//! ```

mod capability;
mod directive;
mod highlight;
mod processor;
mod resolver;

pub use capability::{
    Clipboard, CopyAction, DiagramRenderer, MermaidHook, Notifier, RecordingClipboard,
    RecordingNotifier,
};
pub use directive::Directive;
pub use highlight::{DEFAULT_LANGUAGE, HighlightProcessor};
pub use processor::{
    EmbedProcessor, PendingEmbed, Replacements, copy_actions, error_notice, pending_embeds,
};
pub use resolver::{DirectiveFetcher, SourceResolver, StackExchangeConfig};
