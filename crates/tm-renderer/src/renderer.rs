//! Generic markdown renderer with pluggable backend.

use std::fmt::Write;
use std::marker::PhantomData;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

use crate::backend::RenderBackend;
use crate::block::{BlockProcessor, ExtractedBlock, ProcessResult};
use crate::state::{
    CodeBlockState, HeadingState, HtmlBlockState, ImageState, TableState, TocEntry, escape_html,
};
use crate::util::heading_level_to_num;

/// Result of rendering markdown.
#[derive(Clone, Debug)]
pub struct RenderResult {
    /// Rendered HTML content.
    pub html: String,
    /// Title extracted from first H1 heading (if `extract_title` was enabled).
    pub title: Option<String>,
    /// Table of contents entries.
    pub toc: Vec<TocEntry>,
    /// Warnings generated during conversion.
    pub warnings: Vec<String>,
}

/// Generic markdown renderer with pluggable backend.
///
/// Uses the [`RenderBackend`] trait to delegate surface-specific rendering
/// while handling common elements (headings, tables, lists, inline
/// formatting) generically.
///
/// # Block Processors
///
/// Custom handling of fenced code blocks and raw HTML blocks can be added
/// via [`with_processor`](Self::with_processor). Processors are checked in
/// order; the first returning a non-`PassThrough` result wins.
pub struct MarkdownRenderer<B: RenderBackend> {
    output: String,
    list_stack: Vec<bool>,
    item_depth: usize,
    code: CodeBlockState,
    html_block: HtmlBlockState,
    table: TableState,
    image: ImageState,
    heading: HeadingState,
    base_path: Option<String>,
    pending_image: Option<(String, String)>,
    processors: Vec<Box<dyn BlockProcessor>>,
    block_index: usize,
    gfm: bool,
    preview: bool,
    _backend: PhantomData<B>,
}

impl<B: RenderBackend> MarkdownRenderer<B> {
    /// Create a new renderer with GFM extensions enabled by default.
    #[must_use]
    pub fn new() -> Self {
        Self {
            output: String::with_capacity(4096),
            list_stack: Vec::new(),
            item_depth: 0,
            code: CodeBlockState::default(),
            html_block: HtmlBlockState::default(),
            table: TableState::default(),
            image: ImageState::default(),
            heading: HeadingState::new(false),
            base_path: None,
            pending_image: None,
            processors: Vec::new(),
            block_index: 0,
            gfm: true,
            preview: false,
            _backend: PhantomData,
        }
    }

    /// Enable title extraction from the first H1 heading.
    ///
    /// The H1 is still rendered; its text is additionally reported as
    /// [`RenderResult::title`] and excluded from the ToC.
    #[must_use]
    pub fn with_title_extraction(mut self) -> Self {
        self.heading = HeadingState::new(true);
        self
    }

    /// Set base path for resolving relative links.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Enable or disable GFM extensions (tables, strikethrough, task lists).
    ///
    /// Enabled by default.
    #[must_use]
    pub fn with_gfm(mut self, enabled: bool) -> Self {
        self.gfm = enabled;
        self
    }

    /// Render headings as bold text instead of `<h1>`-`<h6>`.
    ///
    /// Used for inline previews where full heading hierarchy would overwhelm
    /// the surrounding layout. Anchor ids and the ToC are still produced.
    #[must_use]
    pub fn with_preview(mut self, enabled: bool) -> Self {
        self.preview = enabled;
        self
    }

    /// Start block numbering at `index` instead of zero.
    ///
    /// Block indices feed placeholder names and copy-button wiring, so a
    /// document spliced into another must continue the outer numbering to
    /// keep indices unique across the combined output.
    #[must_use]
    pub fn with_first_block_index(mut self, index: usize) -> Self {
        self.block_index = index;
        self
    }

    /// Index that will be assigned to the next fenced code or HTML block.
    #[must_use]
    pub fn next_block_index(&self) -> usize {
        self.block_index
    }

    /// Get parser options based on GFM configuration.
    #[must_use]
    pub fn parser_options(&self) -> Options {
        if self.gfm {
            Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS
        } else {
            Options::empty()
        }
    }

    /// Create a configured parser for the given markdown text.
    #[must_use]
    pub fn create_parser<'a>(&self, markdown: &'a str) -> Parser<'a> {
        Parser::new_ext(markdown, self.parser_options())
    }

    /// Render markdown text directly using configured parser options.
    pub fn render_markdown(&mut self, markdown: &str) -> RenderResult {
        self.render(self.create_parser(markdown))
    }

    /// Add a block processor.
    ///
    /// Processors are checked in order when a fenced code block or raw HTML
    /// block is encountered. The first processor returning a non-`PassThrough`
    /// result wins.
    #[must_use]
    pub fn with_processor<P: BlockProcessor + 'static>(mut self, processor: P) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    /// Get all extracted blocks from all processors.
    ///
    /// Returns an iterator over blocks that were claimed with
    /// `ProcessResult::Placeholder`. Use this after rendering to resolve the
    /// deferred content and splice it over the placeholders.
    pub fn extracted_blocks(&self) -> impl Iterator<Item = ExtractedBlock> + '_ {
        self.processors.iter().flat_map(|p| p.extracted()).cloned()
    }

    /// Get all warnings from all processors.
    pub fn processor_warnings(&self) -> impl Iterator<Item = String> + '_ {
        self.processors.iter().flat_map(|p| p.warnings()).cloned()
    }

    /// Push content to output or heading buffer based on context.
    fn push_inline(&mut self, content: &str) {
        if self.heading.is_active() {
            self.heading.push_html(content);
        } else {
            self.output.push_str(content);
        }
    }

    /// Offer a block to the registered processors, first claim wins.
    fn offer_fence(&mut self, language: &str, source: &str, index: usize) -> ProcessResult {
        for processor in &mut self.processors {
            match processor.process_fence(language, source, index) {
                ProcessResult::PassThrough => {}
                claimed => return claimed,
            }
        }
        ProcessResult::PassThrough
    }

    fn offer_html(&mut self, html: &str, index: usize) -> ProcessResult {
        for processor in &mut self.processors {
            match processor.process_html(html, index) {
                ProcessResult::PassThrough => {}
                claimed => return claimed,
            }
        }
        ProcessResult::PassThrough
    }

    /// Render markdown events and return the result.
    ///
    /// Automatically calls `post_process` on all registered processors.
    pub fn render<'a, I>(&mut self, events: I) -> RenderResult
    where
        I: Iterator<Item = Event<'a>>,
    {
        for event in events {
            self.process_event(event);
        }

        let mut html = std::mem::take(&mut self.output);
        for processor in &mut self.processors {
            processor.post_process(&mut html);
        }

        RenderResult {
            html,
            title: self.heading.take_title(),
            toc: self.heading.take_toc(),
            warnings: self.processor_warnings().collect(),
        }
    }

    fn process_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => self.inline_code(&code),
            Event::Html(html) => self.block_html(&html),
            Event::InlineHtml(html) => self.push_inline(&html),
            Event::SoftBreak => self.soft_break(),
            Event::HardBreak => B::hard_break(&mut self.output),
            Event::Rule => B::horizontal_rule(&mut self.output),
            Event::TaskListMarker(checked) => B::task_list_marker(checked, &mut self.output),
            Event::FootnoteReference(_) | Event::InlineMath(_) | Event::DisplayMath(_) => {
                // Not supported
            }
        }
    }

    #[allow(clippy::too_many_lines)]
    fn start_tag(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                if !self.code.is_active() {
                    self.output.push_str("<p>");
                }
            }
            Tag::Heading { level, .. } => {
                // Opening tag is written in end_tag once the id is known.
                self.heading.start_heading(heading_level_to_num(level));
            }
            Tag::BlockQuote(_) => {
                B::blockquote_start(&mut self.output);
            }
            Tag::CodeBlock(kind) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(ref info) if !info.is_empty() => info
                        .split_whitespace()
                        .next()
                        .filter(|token| !token.is_empty())
                        .map(str::to_owned),
                    _ => None,
                };
                self.code.start(lang);
            }
            Tag::HtmlBlock => {
                self.html_block.start();
            }
            Tag::List(start) => {
                self.list_stack.push(start.is_some());
                match start {
                    Some(1) => self.output.push_str("<ol>"),
                    Some(n) => write!(self.output, r#"<ol start="{n}">"#).unwrap(),
                    None => self.output.push_str("<ul>"),
                }
            }
            Tag::Item => {
                self.item_depth += 1;
                self.output.push_str("<li>");
            }
            Tag::FootnoteDefinition(_) | Tag::MetadataBlock(_) => {}
            Tag::DefinitionList => {
                self.output.push_str("<dl>");
            }
            Tag::DefinitionListTitle => {
                self.output.push_str("<dt>");
            }
            Tag::DefinitionListDefinition => {
                self.output.push_str("<dd>");
            }
            Tag::Table(alignments) => {
                self.table.start(alignments.clone());
                self.output.push_str("<table>");
            }
            Tag::TableHead => {
                self.table.start_head();
                self.output.push_str("<thead><tr>");
            }
            Tag::TableRow => {
                self.table.start_row();
                self.output.push_str("<tr>");
            }
            Tag::TableCell => {
                let align = self.table.current_alignment_style();
                let cell_tag = if self.table.is_in_head() { "th" } else { "td" };
                write!(self.output, "<{cell_tag}{align}>").unwrap();
            }
            Tag::Emphasis => self.push_inline("<em>"),
            Tag::Strong => self.push_inline("<strong>"),
            Tag::Strikethrough => self.push_inline("<s>"),
            Tag::Link { dest_url, .. } => {
                let href = B::transform_link(&dest_url, self.base_path.as_deref());
                let link_tag = format!(r#"<a href="{}">"#, escape_html(&href));
                self.push_inline(&link_tag);
            }
            Tag::Image {
                dest_url, title, ..
            } => {
                // Start collecting alt text; image is rendered in end_tag
                self.image.start();
                self.pending_image = Some((dest_url.to_string(), title.to_string()));
            }
            Tag::Superscript => self.push_inline("<sup>"),
            Tag::Subscript => self.push_inline("<sub>"),
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                if !self.code.is_active() {
                    self.output.push_str("</p>");
                }
            }
            TagEnd::Heading(_level) => {
                if let Some((level, id, html)) = self.heading.complete_heading() {
                    if self.preview {
                        write!(self.output, r#"<b id="{id}">{}</b>"#, html.trim()).unwrap();
                    } else {
                        write!(
                            self.output,
                            r#"<h{level} id="{id}">{}</h{level}>"#,
                            html.trim()
                        )
                        .unwrap();
                    }
                }
            }
            TagEnd::BlockQuote(_) => {
                B::blockquote_end(&mut self.output);
            }
            TagEnd::CodeBlock => {
                let (lang, content) = self.code.end();
                let index = self.block_index;
                self.block_index += 1;

                match self.offer_fence(lang.as_deref().unwrap_or_default(), &content, index) {
                    ProcessResult::Placeholder(text) | ProcessResult::Inline(text) => {
                        self.output.push_str(&text);
                    }
                    ProcessResult::PassThrough => {
                        B::code_block(lang.as_deref(), &content, &mut self.output);
                    }
                }
            }
            TagEnd::HtmlBlock => {
                let content = self.html_block.end();
                let index = self.block_index;
                self.block_index += 1;

                match self.offer_html(&content, index) {
                    ProcessResult::Placeholder(text) | ProcessResult::Inline(text) => {
                        self.output.push_str(&text);
                    }
                    ProcessResult::PassThrough => self.output.push_str(&content),
                }
            }
            TagEnd::List(ordered) => {
                self.list_stack.pop();
                self.output
                    .push_str(if ordered { "</ol>" } else { "</ul>" });
            }
            TagEnd::Item => {
                self.item_depth = self.item_depth.saturating_sub(1);
                self.output.push_str("</li>");
            }
            TagEnd::FootnoteDefinition | TagEnd::MetadataBlock(_) => {}
            TagEnd::Image => {
                let alt = self.image.end();
                if let Some((src, title)) = self.pending_image.take() {
                    B::image(&src, &alt, &title, &mut self.output);
                }
            }
            TagEnd::DefinitionList => {
                self.output.push_str("</dl>");
            }
            TagEnd::DefinitionListTitle => {
                self.output.push_str("</dt>");
            }
            TagEnd::DefinitionListDefinition => {
                self.output.push_str("</dd>");
            }
            TagEnd::Table => {
                self.output.push_str("</tbody></table>");
            }
            TagEnd::TableHead => {
                self.output.push_str("</tr></thead><tbody>");
                self.table.end_head();
            }
            TagEnd::TableRow => {
                self.output.push_str("</tr>");
            }
            TagEnd::TableCell => {
                self.output.push_str(if self.table.is_in_head() {
                    "</th>"
                } else {
                    "</td>"
                });
                self.table.next_cell();
            }
            TagEnd::Emphasis => self.push_inline("</em>"),
            TagEnd::Strong => self.push_inline("</strong>"),
            TagEnd::Strikethrough => self.push_inline("</s>"),
            TagEnd::Link => self.push_inline("</a>"),
            TagEnd::Superscript => self.push_inline("</sup>"),
            TagEnd::Subscript => self.push_inline("</sub>"),
        }
    }

    fn text(&mut self, text: &str) {
        if self.code.is_active() {
            self.code.push_str(text);
        } else if self.image.is_active() {
            self.image.push_str(text);
        } else if self.heading.is_active() {
            self.heading.push_text(text);
            self.heading.push_html(&escape_html(text));
        } else if self.item_depth < self.list_stack.len() && text.trim().is_empty() {
            // Whitespace between list items is a parser artifact, not content.
        } else {
            self.output.push_str(&escape_html(text));
        }
    }

    fn inline_code(&mut self, code: &str) {
        if self.heading.is_active() {
            self.heading.push_text(code);
            write!(
                self.heading.html_buffer(),
                "<code>{}</code>",
                escape_html(code)
            )
            .unwrap();
        } else {
            write!(self.output, "<code>{}</code>", escape_html(code)).unwrap();
        }
    }

    fn block_html(&mut self, html: &str) {
        if self.html_block.is_active() {
            self.html_block.push_str(html);
        } else {
            self.output.push_str(html);
        }
    }

    fn soft_break(&mut self) {
        if self.code.is_active() {
            self.code.push_newline();
        } else {
            self.output.push('\n');
        }
    }
}

impl<B: RenderBackend> Default for MarkdownRenderer<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HtmlBackend;
    use crate::block::BlockOrigin;
    use pulldown_cmark::{Options, Parser};

    fn render_html(markdown: &str) -> RenderResult {
        MarkdownRenderer::<HtmlBackend>::new().render_markdown(markdown)
    }

    fn render_html_with_title(markdown: &str) -> RenderResult {
        MarkdownRenderer::<HtmlBackend>::new()
            .with_title_extraction()
            .render_markdown(markdown)
    }

    #[test]
    fn test_html_basic_paragraph() {
        let result = render_html("Hello, world!");
        assert_eq!(result.html, "<p>Hello, world!</p>");
    }

    #[test]
    fn test_html_heading_with_id() {
        let result = render_html("## Section Title");
        assert_eq!(result.html, r#"<h2 id="section-title">Section Title</h2>"#);
        assert_eq!(result.toc.len(), 1);
        assert_eq!(result.toc[0].level, 2);
        assert_eq!(result.toc[0].title, "Section Title");
        assert_eq!(result.toc[0].id, "section-title");
    }

    #[test]
    fn test_heading_punctuation_stripped_from_id() {
        let result = render_html("# Hello, World!");
        assert!(result.html.contains(r#"<h1 id="hello-world">"#));
    }

    #[test]
    fn test_html_title_extraction() {
        let markdown = "# My Title\n\nSome content\n\n## Section";
        let result = render_html_with_title(markdown);

        assert_eq!(result.title, Some("My Title".to_string()));
        // H1 is still rendered
        assert!(result.html.contains(r#"<h1 id="my-title">My Title</h1>"#));
        // ToC excludes title but includes other headings
        assert_eq!(result.toc.len(), 1);
        assert_eq!(result.toc[0].level, 2);
    }

    #[test]
    fn test_duplicate_heading_ids() {
        let result = render_html("## FAQ\n\n## FAQ\n\n## FAQ");
        assert_eq!(result.toc.len(), 3);
        assert_eq!(result.toc[0].id, "faq");
        assert_eq!(result.toc[1].id, "faq-1");
        assert_eq!(result.toc[2].id, "faq-2");
    }

    #[test]
    fn test_heading_with_inline_code() {
        let result = render_html("## Install `cargo`");
        assert!(result.html.contains("<code>cargo</code>"));
        assert_eq!(result.toc[0].title, "Install cargo");
    }

    #[test]
    fn test_preview_headings_render_bold() {
        let mut renderer = MarkdownRenderer::<HtmlBackend>::new().with_preview(true);
        let result = renderer.render_markdown("# Title\n\n## Section");
        assert!(result.html.contains(r#"<b id="title">Title</b>"#));
        assert!(result.html.contains(r#"<b id="section">Section</b>"#));
        assert!(!result.html.contains("<h1"));
        // ToC is still collected in preview mode
        assert_eq!(result.toc.len(), 2);
    }

    #[test]
    fn test_html_code_block() {
        let result = render_html("```rust\nfn main() {}\n```");
        assert!(result.html.contains(r#"class="language-rust""#));
        assert!(result.html.contains("fn main() {}"));
    }

    #[test]
    fn test_html_blockquote() {
        let result = render_html("> Note");
        assert!(result.html.contains(r#"<blockquote class="blockquote">"#));
        assert!(result.html.contains("</blockquote>"));
    }

    #[test]
    fn test_html_image() {
        let result = render_html("![Alt text](image.png)");
        assert!(
            result
                .html
                .contains(r#"<img src="image.png" alt="Alt text">"#)
        );
    }

    #[test]
    fn test_html_table() {
        let result = render_html("| A | B |\n|---|---|\n| 1 | 2 |");
        assert!(result.html.contains("<table>"));
        assert!(result.html.contains("<thead>"));
        assert!(result.html.contains("<th>"));
        assert!(result.html.contains("<tbody>"));
        assert!(result.html.contains("<td>"));
    }

    #[test]
    fn test_html_table_alignment() {
        let result = render_html("| A | B |\n|:--|--:|\n| 1 | 2 |");
        assert!(result.html.contains(r#"<th style="text-align: left">"#));
        assert!(result.html.contains(r#"<td style="text-align: right">"#));
    }

    #[test]
    fn test_ragged_table_row_tolerated() {
        // Body row with more cells than the header still renders
        let result = render_html("| A |\n|---|\n| 1 | 2 | 3 |");
        assert!(result.html.contains("<table>"));
        assert!(result.html.contains("</table>"));
    }

    #[test]
    fn test_html_link_with_base_path() {
        let mut renderer = MarkdownRenderer::<HtmlBackend>::new().with_base_path("thread/42");
        let result = renderer.render_markdown("[Link](./page.md)");
        assert!(result.html.contains(r#"href="/thread/42/page""#));
    }

    #[test]
    fn test_emphasis() {
        let result = render_html("*italic* and **bold**");
        assert!(result.html.contains("<em>italic</em>"));
        assert!(result.html.contains("<strong>bold</strong>"));
    }

    #[test]
    fn test_strikethrough() {
        let result = render_html("~~deleted~~");
        assert!(result.html.contains("<s>deleted</s>"));
    }

    #[test]
    fn test_lists() {
        let result = render_html("- Item 1\n- Item 2");
        assert!(result.html.contains("<ul>"));
        assert!(result.html.contains("<li>"));
        assert!(result.html.contains("</ul>"));

        let result = render_html("1. First\n2. Second");
        assert!(result.html.contains("<ol>"));
        assert!(result.html.contains("</ol>"));
    }

    #[test]
    fn test_task_list_html() {
        let result = render_html("- [ ] Unchecked\n- [x] Checked");
        assert!(result.html.contains(r#"<input type="checkbox" disabled>"#));
        assert!(
            result
                .html
                .contains(r#"<input type="checkbox" checked disabled>"#)
        );
    }

    #[test]
    fn test_whitespace_between_list_items_skipped() {
        // Constructed stream: parsers that surface blank lines between items
        // as whitespace text nodes must not leak them into the output.
        let events = vec![
            Event::Start(Tag::List(None)),
            Event::Start(Tag::Item),
            Event::Text("one".into()),
            Event::End(TagEnd::Item),
            Event::Text("\n   \n".into()),
            Event::Start(Tag::Item),
            Event::Text("two".into()),
            Event::End(TagEnd::Item),
            Event::End(TagEnd::List(false)),
        ];
        let result = MarkdownRenderer::<HtmlBackend>::new().render(events.into_iter());
        assert_eq!(result.html, "<ul><li>one</li><li>two</li></ul>");
    }

    #[test]
    fn test_inline_html_passes_through() {
        let result = render_html("before <kbd>Ctrl</kbd> after");
        assert!(result.html.contains("<kbd>Ctrl</kbd>"));
    }

    #[test]
    fn test_raw_html_block_unclaimed_passes_through() {
        let result = render_html("para\n\n<div class=\"note\">hi</div>\n\npara");
        assert!(result.html.contains(r#"<div class="note">hi</div>"#));
    }

    #[test]
    fn test_default_renderer() {
        let parser = Parser::new("Hello");
        let mut renderer = MarkdownRenderer::<HtmlBackend>::default();
        let result = renderer.render(parser);
        assert_eq!(result.html, "<p>Hello</p>");
    }

    #[test]
    fn test_gfm_enabled_by_default() {
        let mut renderer = MarkdownRenderer::<HtmlBackend>::new();
        let result = renderer.render_markdown("| A | B |\n|---|---|\n| 1 | 2 |");
        assert!(result.html.contains("<table>"));
    }

    #[test]
    fn test_gfm_disabled() {
        let mut renderer = MarkdownRenderer::<HtmlBackend>::new().with_gfm(false);
        let result = renderer.render_markdown("| A | B |\n|---|---|\n| 1 | 2 |");
        assert!(!result.html.contains("<table>"));
    }

    #[test]
    fn test_parser_options_with_gfm() {
        let renderer = MarkdownRenderer::<HtmlBackend>::new();
        let options = renderer.parser_options();
        assert!(options.contains(Options::ENABLE_TABLES));
        assert!(options.contains(Options::ENABLE_STRIKETHROUGH));
        assert!(options.contains(Options::ENABLE_TASKLISTS));
    }

    #[test]
    fn test_parser_options_without_gfm() {
        let renderer = MarkdownRenderer::<HtmlBackend>::new().with_gfm(false);
        assert_eq!(renderer.parser_options(), Options::empty());
    }

    // Block processor tests

    struct PlaceholderProcessor {
        extracted: Vec<ExtractedBlock>,
    }

    impl PlaceholderProcessor {
        fn new() -> Self {
            Self {
                extracted: Vec::new(),
            }
        }
    }

    impl BlockProcessor for PlaceholderProcessor {
        fn process_fence(&mut self, language: &str, source: &str, index: usize) -> ProcessResult {
            if language == "mermaid" {
                self.extracted.push(ExtractedBlock {
                    index,
                    origin: BlockOrigin::Fence {
                        language: language.to_owned(),
                    },
                    source: source.to_owned(),
                });
                ProcessResult::Placeholder(format!("{{{{EMBED_{index}}}}}"))
            } else {
                ProcessResult::PassThrough
            }
        }

        fn process_html(&mut self, html: &str, index: usize) -> ProcessResult {
            if html.contains("<github ") {
                self.extracted.push(ExtractedBlock {
                    index,
                    origin: BlockOrigin::Html,
                    source: html.to_owned(),
                });
                ProcessResult::Placeholder(format!("{{{{EMBED_{index}}}}}"))
            } else {
                ProcessResult::PassThrough
            }
        }

        fn extracted(&self) -> &[ExtractedBlock] {
            &self.extracted
        }
    }

    struct InlineProcessor;

    impl BlockProcessor for InlineProcessor {
        fn process_fence(&mut self, language: &str, source: &str, _index: usize) -> ProcessResult {
            if language == "inline-test" {
                ProcessResult::Inline(format!("<div class=\"inline\">{source}</div>"))
            } else {
                ProcessResult::PassThrough
            }
        }
    }

    #[test]
    fn test_processor_passthrough() {
        let markdown = "```rust\nfn main() {}\n```";
        let mut renderer =
            MarkdownRenderer::<HtmlBackend>::new().with_processor(PlaceholderProcessor::new());
        let result = renderer.render_markdown(markdown);

        assert!(result.html.contains(r#"class="language-rust""#));
        assert!(result.html.contains("fn main() {}"));
    }

    #[test]
    fn test_processor_placeholder() {
        let markdown = "```mermaid\ngraph TD\n```";
        let mut renderer =
            MarkdownRenderer::<HtmlBackend>::new().with_processor(PlaceholderProcessor::new());
        let result = renderer.render_markdown(markdown);

        assert!(result.html.contains("{{EMBED_0}}"));
        assert!(!result.html.contains("<pre>"));

        let extracted: Vec<_> = renderer.extracted_blocks().collect();
        assert_eq!(extracted.len(), 1);
        assert_eq!(
            extracted[0].origin,
            BlockOrigin::Fence {
                language: "mermaid".to_owned()
            }
        );
        assert_eq!(extracted[0].source, "graph TD\n");
        assert_eq!(extracted[0].index, 0);
    }

    #[test]
    fn test_processor_inline() {
        let markdown = "```inline-test\ncontent\n```";
        let mut renderer = MarkdownRenderer::<HtmlBackend>::new().with_processor(InlineProcessor);
        let result = renderer.render_markdown(markdown);

        assert!(result.html.contains(r#"<div class="inline">content"#));
        assert!(!result.html.contains("<pre>"));
    }

    #[test]
    fn test_processor_html_block() {
        let markdown =
            "before\n\n<github url=\"https://example.com/x.md\">\nfallback\n</github>\n\nafter";
        let mut renderer =
            MarkdownRenderer::<HtmlBackend>::new().with_processor(PlaceholderProcessor::new());
        let result = renderer.render_markdown(markdown);

        assert!(result.html.contains("{{EMBED_0}}"));
        assert!(!result.html.contains("<github"));

        let extracted: Vec<_> = renderer.extracted_blocks().collect();
        assert_eq!(extracted.len(), 1);
        assert_eq!(extracted[0].origin, BlockOrigin::Html);
        assert!(extracted[0].source.contains("fallback"));
    }

    #[test]
    fn test_processor_offered_fence_without_language() {
        struct BareFenceProcessor;

        impl BlockProcessor for BareFenceProcessor {
            fn process_fence(
                &mut self,
                language: &str,
                source: &str,
                _index: usize,
            ) -> ProcessResult {
                if language.is_empty() {
                    ProcessResult::Inline(format!("<div class=\"plain\">{source}</div>"))
                } else {
                    ProcessResult::PassThrough
                }
            }
        }

        let mut renderer = MarkdownRenderer::<HtmlBackend>::new().with_processor(BareFenceProcessor);
        let result = renderer.render_markdown("```\nplain text\n```");
        assert!(result.html.contains(r#"<div class="plain">plain text"#));
    }

    #[test]
    fn test_multiple_processors() {
        let markdown =
            "```mermaid\ngraph TD\n```\n\n```inline-test\nhello\n```\n\n```rust\nfn main() {}\n```";
        let mut renderer = MarkdownRenderer::<HtmlBackend>::new()
            .with_processor(PlaceholderProcessor::new())
            .with_processor(InlineProcessor);
        let result = renderer.render_markdown(markdown);

        // First processor claims mermaid
        assert!(result.html.contains("{{EMBED_0}}"));
        // Second processor claims inline-test
        assert!(result.html.contains(r#"<div class="inline">hello"#));
        // Neither claims rust, so normal code block
        assert!(result.html.contains(r#"class="language-rust""#));

        let extracted: Vec<_> = renderer.extracted_blocks().collect();
        assert_eq!(extracted.len(), 1);
    }

    #[test]
    fn test_block_indices_shared_across_kinds() {
        let markdown =
            "```mermaid\na\n```\n\n<github url=\"https://x.md\">\nfb\n</github>\n\n```mermaid\nb\n```";
        let mut renderer =
            MarkdownRenderer::<HtmlBackend>::new().with_processor(PlaceholderProcessor::new());
        let result = renderer.render_markdown(markdown);

        assert!(result.html.contains("{{EMBED_0}}"));
        assert!(result.html.contains("{{EMBED_1}}"));
        assert!(result.html.contains("{{EMBED_2}}"));

        let extracted: Vec<_> = renderer.extracted_blocks().collect();
        assert_eq!(extracted.len(), 3);
        assert_eq!(extracted[1].origin, BlockOrigin::Html);
    }

    #[test]
    fn test_first_block_index_offsets_numbering() {
        let markdown = "```mermaid\na\n```\n\n```mermaid\nb\n```";
        let mut renderer = MarkdownRenderer::<HtmlBackend>::new()
            .with_first_block_index(5)
            .with_processor(PlaceholderProcessor::new());
        let result = renderer.render_markdown(markdown);

        assert!(result.html.contains("{{EMBED_5}}"));
        assert!(result.html.contains("{{EMBED_6}}"));
        assert_eq!(renderer.next_block_index(), 7);
    }

    struct WarningProcessor {
        warnings: Vec<String>,
    }

    impl BlockProcessor for WarningProcessor {
        fn process_fence(
            &mut self,
            _language: &str,
            _source: &str,
            _index: usize,
        ) -> ProcessResult {
            ProcessResult::PassThrough
        }

        fn warnings(&self) -> &[String] {
            &self.warnings
        }
    }

    #[test]
    fn test_render_result_includes_warnings() {
        let mut renderer =
            MarkdownRenderer::<HtmlBackend>::new().with_processor(WarningProcessor {
                warnings: vec!["warning 1".into(), "warning 2".into()],
            });
        let result = renderer.render_markdown("Hello");

        assert_eq!(result.warnings.len(), 2);
        assert_eq!(result.warnings[0], "warning 1");
    }

    #[test]
    fn test_render_result_empty_warnings_by_default() {
        let result = render_html("Hello");
        assert!(result.warnings.is_empty());
    }
}
