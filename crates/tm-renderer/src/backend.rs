//! Render backend trait.

use std::borrow::Cow;

/// Output backend for [`MarkdownRenderer`](crate::MarkdownRenderer).
///
/// The renderer drives the event stream and handles shared structure;
/// the backend decides how surface-specific elements look. All methods
/// append to `out` rather than returning strings so nested elements can
/// share one output buffer.
pub trait RenderBackend {
    /// Render a fenced or indented code block that no processor claimed.
    fn code_block(lang: Option<&str>, content: &str, out: &mut String);

    /// Open a blockquote.
    fn blockquote_start(out: &mut String);

    /// Close a blockquote.
    fn blockquote_end(out: &mut String);

    /// Render an image with collected alt text.
    fn image(src: &str, alt: &str, title: &str, out: &mut String);

    /// Rewrite a link destination.
    ///
    /// `base_path` is the navigation path of the enclosing document, when
    /// known. Backends that do not route links return the URL unchanged.
    fn transform_link<'a>(url: &'a str, base_path: Option<&str>) -> Cow<'a, str>;

    /// Render a hard line break.
    fn hard_break(out: &mut String) {
        out.push_str("<br>");
    }

    /// Render a thematic break.
    fn horizontal_rule(out: &mut String) {
        out.push_str("<hr>");
    }

    /// Render a task list checkbox.
    fn task_list_marker(checked: bool, out: &mut String) {
        out.push_str(if checked {
            r#"<input type="checkbox" checked disabled>"#
        } else {
            r#"<input type="checkbox" disabled>"#
        });
    }
}
