//! The page host: clipboard and viewport access.

use std::cell::{Cell, RefCell};
use std::future::Future;

use crate::dom::NodeId;

/// Clipboard failures. Callers log these and leave controls untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClipboardError {
    /// The user or browser refused the write.
    #[error("clipboard permission denied")]
    Denied,

    /// Clipboard API missing (insecure context, old browser, headless run).
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
}

/// How the viewport moves to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    Smooth,
    Instant,
}

/// Side effects the enhancers need from the page they run in.
pub trait Host: 'static {
    /// Write `text` to the system clipboard.
    fn write_clipboard(&self, text: String) -> impl Future<Output = Result<(), ClipboardError>>;

    /// Bring `node` into view.
    fn scroll_into_view(&self, node: NodeId, behavior: ScrollBehavior);
}

/// In-memory host that records clipboard writes and scrolls.
#[derive(Debug, Default)]
pub struct MemoryHost {
    clipboard: RefCell<Vec<String>>,
    scrolls: RefCell<Vec<(NodeId, ScrollBehavior)>>,
    deny: Cell<bool>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A host whose clipboard rejects every write.
    pub fn denying() -> Self {
        let host = Self::default();
        host.deny.set(true);
        host
    }

    pub fn set_denied(&self, deny: bool) {
        self.deny.set(deny);
    }

    /// Every successful clipboard write, oldest first.
    pub fn clipboard_writes(&self) -> Vec<String> {
        self.clipboard.borrow().clone()
    }

    pub fn scrolls(&self) -> Vec<(NodeId, ScrollBehavior)> {
        self.scrolls.borrow().clone()
    }
}

impl Host for MemoryHost {
    fn write_clipboard(&self, text: String) -> impl Future<Output = Result<(), ClipboardError>> {
        let result = if self.deny.get() {
            Err(ClipboardError::Denied)
        } else {
            self.clipboard.borrow_mut().push(text);
            Ok(())
        };
        std::future::ready(result)
    }

    fn scroll_into_view(&self, node: NodeId, behavior: ScrollBehavior) {
        self.scrolls.borrow_mut().push((node, behavior));
    }
}
