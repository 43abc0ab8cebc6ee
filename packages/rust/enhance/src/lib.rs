//! Post-render enhancement of the page DOM.
//!
//! Runs over a [`Document`] built from converter output and adds interactive
//! controls: copy-link anchors on headings, copy buttons on code blocks, and
//! the disclosure toggle that gates the hidden segment. Every pass is
//! idempotent; processed nodes carry a marker attribute and are skipped.

pub mod anchors;
pub mod code_blocks;
pub mod disclosure;
pub mod dom;
pub mod enhancer;
pub mod host;

mod feedback;

pub use code_blocks::CodeBlockNode;
pub use disclosure::DisclosureState;
pub use dom::{Action, Document, EventKind, Listener, NodeId};
pub use enhancer::{EnhanceConfig, EnhanceReport, Enhancer, Event};
pub use host::{ClipboardError, Host, MemoryHost, ScrollBehavior};

/// Insert anchor and copy controls into server-rendered HTML.
///
/// Controls are not marked as enhanced, so a client-side pass still wires
/// them. Returns the number of controls created.
pub fn prerender(doc: &mut Document, root: NodeId) -> usize {
    anchors::prerender(doc, root) + code_blocks::prerender(doc, root)
}
