//! Per-pass rendering state.
//!
//! Small state machines the renderer threads through the event stream:
//! heading capture (anchors, title, table of contents), code block and
//! raw HTML buffering, image alt collection, and table shape tracking.

use std::borrow::Cow;
use std::collections::HashMap;

use pulldown_cmark::Alignment;

/// Escape `&`, `<`, `>`, `"` and `'` for HTML output.
///
/// Borrows the input when nothing needs escaping.
#[must_use]
pub fn escape_html(text: &str) -> Cow<'_, str> {
    let first = text
        .bytes()
        .position(|b| matches!(b, b'&' | b'<' | b'>' | b'"' | b'\''));
    let Some(first) = first else {
        return Cow::Borrowed(text);
    };

    let mut escaped = String::with_capacity(text.len() + 8);
    escaped.push_str(&text[..first]);
    for c in text[first..].chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Table of contents entry collected from a heading.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TocEntry {
    /// Heading level (1-6).
    pub level: u8,
    /// Plain heading text with inline markup stripped.
    pub title: String,
    /// Anchor id assigned to the heading.
    pub id: String,
}

/// Derive an anchor id from heading text.
///
/// Lowercases, drops everything that is neither a word character nor
/// whitespace, then joins the remaining words with hyphens.
fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let kept: String = lowered
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Heading capture state.
///
/// While a heading is open, inline events write into both a plain-text
/// buffer (for the anchor id, title and ToC) and an HTML buffer (for the
/// rendered heading body). Anchor ids are deduplicated document-wide with
/// `-1`, `-2`, ... suffixes.
#[derive(Debug)]
pub struct HeadingState {
    extract_title: bool,
    title: Option<String>,
    level: Option<u8>,
    text: String,
    html: String,
    used_ids: HashMap<String, usize>,
    toc: Vec<TocEntry>,
}

impl HeadingState {
    pub fn new(extract_title: bool) -> Self {
        Self {
            extract_title,
            title: None,
            level: None,
            text: String::new(),
            html: String::new(),
            used_ids: HashMap::new(),
            toc: Vec::new(),
        }
    }

    /// Whether a heading is currently open.
    pub fn is_active(&self) -> bool {
        self.level.is_some()
    }

    pub fn start_heading(&mut self, level: u8) {
        self.level = Some(level);
        self.text.clear();
        self.html.clear();
    }

    pub fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn push_html(&mut self, html: &str) {
        self.html.push_str(html);
    }

    /// Mutable access to the HTML buffer for `write!` callers.
    pub fn html_buffer(&mut self) -> &mut String {
        &mut self.html
    }

    /// Close the open heading and return `(level, id, html)`.
    ///
    /// Records the heading in the ToC, except for the first H1 when title
    /// extraction is enabled, which is captured as the document title
    /// instead.
    pub fn complete_heading(&mut self) -> Option<(u8, String, String)> {
        let level = self.level.take()?;
        let text = self.text.trim().to_owned();
        let html = std::mem::take(&mut self.html);

        let id = self.assign_id(&text);

        if self.extract_title && self.title.is_none() && level == 1 {
            self.title = Some(text);
        } else {
            self.toc.push(TocEntry {
                level,
                title: text,
                id: id.clone(),
            });
        }

        Some((level, id, html))
    }

    fn assign_id(&mut self, text: &str) -> String {
        let base = slugify(text);
        let base = if base.is_empty() {
            "section".to_owned()
        } else {
            base
        };
        let seen = self.used_ids.entry(base.clone()).or_insert(0);
        let id = if *seen == 0 {
            base.clone()
        } else {
            format!("{base}-{seen}")
        };
        *seen += 1;
        id
    }

    pub fn take_title(&mut self) -> Option<String> {
        self.title.take()
    }

    pub fn take_toc(&mut self) -> Vec<TocEntry> {
        std::mem::take(&mut self.toc)
    }
}

/// Fenced/indented code block buffering.
#[derive(Debug, Default)]
pub struct CodeBlockState {
    active: bool,
    language: Option<String>,
    content: String,
}

impl CodeBlockState {
    pub fn start(&mut self, language: Option<String>) {
        self.active = true;
        self.language = language;
        self.content.clear();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn push_str(&mut self, text: &str) {
        self.content.push_str(text);
    }

    pub fn push_newline(&mut self) {
        self.content.push('\n');
    }

    /// Close the block and return `(language, content)`.
    pub fn end(&mut self) -> (Option<String>, String) {
        self.active = false;
        (self.language.take(), std::mem::take(&mut self.content))
    }
}

/// Raw HTML block buffering.
///
/// Top-level HTML blocks are collected whole so block processors can see
/// complete elements rather than line fragments.
#[derive(Debug, Default)]
pub struct HtmlBlockState {
    active: bool,
    content: String,
}

impl HtmlBlockState {
    pub fn start(&mut self) {
        self.active = true;
        self.content.clear();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn push_str(&mut self, html: &str) {
        self.content.push_str(html);
    }

    pub fn end(&mut self) -> String {
        self.active = false;
        std::mem::take(&mut self.content)
    }
}

/// Image alt text collection.
#[derive(Debug, Default)]
pub struct ImageState {
    active: bool,
    alt: String,
}

impl ImageState {
    pub fn start(&mut self) {
        self.active = true;
        self.alt.clear();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn push_str(&mut self, text: &str) {
        self.alt.push_str(text);
    }

    pub fn end(&mut self) -> String {
        self.active = false;
        std::mem::take(&mut self.alt)
    }
}

/// Table shape tracking.
///
/// Tracks column alignments and the current cell so cells can be styled by
/// column. Rows with more cells than the header are tolerated; the extra
/// cells render without alignment.
#[derive(Debug, Default)]
pub struct TableState {
    alignments: Vec<Alignment>,
    in_head: bool,
    cell: usize,
}

impl TableState {
    pub fn start(&mut self, alignments: Vec<Alignment>) {
        self.alignments = alignments;
        self.in_head = false;
        self.cell = 0;
    }

    pub fn start_head(&mut self) {
        self.in_head = true;
        self.cell = 0;
    }

    pub fn end_head(&mut self) {
        self.in_head = false;
    }

    pub fn start_row(&mut self) {
        self.cell = 0;
    }

    pub fn is_in_head(&self) -> bool {
        self.in_head
    }

    pub fn next_cell(&mut self) {
        self.cell += 1;
    }

    /// Style attribute for the current cell, empty for unaligned columns.
    pub fn current_alignment_style(&self) -> &'static str {
        match self.alignments.get(self.cell) {
            Some(Alignment::Left) => r#" style="text-align: left""#,
            Some(Alignment::Center) => r#" style="text-align: center""#,
            Some(Alignment::Right) => r#" style="text-align: right""#,
            Some(Alignment::None) | None => "",
        }
    }
}
