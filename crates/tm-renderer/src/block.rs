//! Block processor hook for fenced code and raw HTML blocks.

/// Outcome of offering a block to a processor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessResult {
    /// Block was claimed; emit this placeholder and record the block for
    /// deferred resolution (see [`ExtractedBlock`]).
    Placeholder(String),
    /// Block was claimed and rewritten; emit this output directly.
    Inline(String),
    /// Block was not claimed; offer it to the next processor.
    PassThrough,
}

/// Where an extracted block came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockOrigin {
    /// Fenced code block with its (possibly empty) info-string language.
    Fence { language: String },
    /// Top-level raw HTML block.
    Html,
}

/// A block claimed with [`ProcessResult::Placeholder`], kept for deferred
/// resolution after the event pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedBlock {
    /// Position in the document's block numbering. Placeholders embed this
    /// index, so it ties a recorded block back to its slot in the output.
    pub index: usize,
    /// Fence or raw HTML origin.
    pub origin: BlockOrigin,
    /// Verbatim block content (fence body or raw HTML text).
    pub source: String,
}

/// Processor invoked for each fenced code block and raw HTML block.
///
/// Processors registered on a renderer are offered each block in order;
/// the first returning a non-[`PassThrough`](ProcessResult::PassThrough)
/// result wins. Unclaimed blocks fall through to the backend's default
/// rendering.
pub trait BlockProcessor {
    /// Offer a fenced code block. `language` is the first info-string token
    /// (empty for bare fences), `index` the document-wide block number.
    fn process_fence(&mut self, language: &str, source: &str, index: usize) -> ProcessResult;

    /// Offer a top-level raw HTML block.
    ///
    /// Default implementation declines, which leaves the HTML untouched.
    fn process_html(&mut self, _html: &str, _index: usize) -> ProcessResult {
        ProcessResult::PassThrough
    }

    /// Rewrite rendered output after the event pass.
    ///
    /// Called by [`render`](crate::MarkdownRenderer::render) once all events
    /// are consumed. Processors that resolve their placeholders out-of-band
    /// leave this as the default no-op.
    fn post_process(&mut self, _html: &mut String) {}

    /// Blocks recorded with [`ProcessResult::Placeholder`].
    fn extracted(&self) -> &[ExtractedBlock] {
        &[]
    }

    /// Warnings accumulated while processing.
    fn warnings(&self) -> &[String] {
        &[]
    }
}
