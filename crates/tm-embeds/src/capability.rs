use std::sync::Mutex;

use serde::Serialize;
use tm_renderer::escape_html;

/// Host clipboard access, passed explicitly to copy actions.
pub trait Clipboard: Send + Sync {
    fn copy(&self, text: &str);
}

/// User-visible confirmation channel for side-effecting actions.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Turns diagram source into embeddable markup.
pub trait DiagramRenderer: Send + Sync {
    fn render(&self, source: &str) -> String;
}

/// Default diagram renderer.
///
/// Emits the element the client-side mermaid runtime scans for, with the
/// source as escaped text content.
#[derive(Debug, Default, Clone, Copy)]
pub struct MermaidHook;

impl DiagramRenderer for MermaidHook {
    fn render(&self, source: &str) -> String {
        format!(r#"<div class="mermaid">{}</div>"#, escape_html(source))
    }
}

/// Copy-to-clipboard payload recorded for one rendered code block.
///
/// The block markup carries a matching `data-copy-index` attribute; the
/// host wires its button to [`invoke`](Self::invoke) with its own
/// capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyAction {
    pub block_index: usize,
    pub text: String,
}

impl CopyAction {
    /// Copies the payload and confirms to the user.
    pub fn invoke(&self, clipboard: &dyn Clipboard, notifier: &dyn Notifier) {
        clipboard.copy(&self.text);
        notifier.notify("Copied to clipboard");
    }
}

/// Clipboard double that records every copied payload.
#[derive(Debug, Default)]
pub struct RecordingClipboard {
    copied: Mutex<Vec<String>>,
}

impl RecordingClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn copied(&self) -> Vec<String> {
        self.copied
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl Clipboard for RecordingClipboard {
    fn copy(&self, text: &str) {
        self.copied
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(text.to_owned());
    }
}

/// Notifier double that records every message.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(message.to_owned());
    }
}
