//! Copy-to-clipboard controls on `<pre>` blocks.

use std::time::Duration;

use crate::dom::{Action, Document, EventKind, Listener, NodeId};
use crate::feedback::{CopyFeedback, STATE_ATTR, STATE_IDLE};

/// Marker set on a `<pre>` once its control is wired.
pub const ENHANCED_ATTR: &str = "data-code-enhanced";

/// Class of the copy control.
pub const CONTROL_CLASS: &str = "code-copy";

const IDLE_LABEL: &str = "Copy";
const COPIED_LABEL: &str = "Copied!";
const IDLE_ARIA: &str = "Copy code";
const COPIED_ARIA: &str = "Code copied";

/// A code block picked up by an enhancement pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlockNode {
    pub node: NodeId,
    /// From the converter's `data-language` attribute.
    pub language: Option<String>,
    /// Text the control copies, exactly as rendered.
    pub text: String,
}

/// Wire every unprocessed `<pre>` under `root`.
pub fn enhance(doc: &mut Document, root: NodeId) -> Vec<CodeBlockNode> {
    let mut enhanced = Vec::new();

    for pre in doc.elements_by_tag(root, &["pre"]) {
        if doc.has_attr(pre, ENHANCED_ATTR) {
            continue;
        }
        doc.set_attr(pre, ENHANCED_ATTR, "true");

        let text = code_text(doc, pre);
        let control = locate_or_create_control(doc, pre);
        doc.add_listener(
            control,
            Listener {
                event: EventKind::Click,
                action: Action::CopyCode { text: text.clone() },
            },
        );

        enhanced.push(CodeBlockNode {
            node: pre,
            language: doc.attr(pre, "data-language").map(String::from),
            text,
        });
    }

    enhanced
}

/// Insert controls without wiring them, for server-rendered HTML.
pub fn prerender(doc: &mut Document, root: NodeId) -> usize {
    let mut created = 0;
    for pre in doc.elements_by_tag(root, &["pre"]) {
        if doc.child_with_class(pre, CONTROL_CLASS).is_none() {
            locate_or_create_control(doc, pre);
            created += 1;
        }
    }
    created
}

/// Text of the block, leaving out any copy control inside it.
fn code_text(doc: &Document, pre: NodeId) -> String {
    doc.children(pre)
        .into_iter()
        .filter(|&child| !doc.has_class(child, CONTROL_CLASS))
        .map(|child| doc.text_content(child))
        .collect()
}

fn locate_or_create_control(doc: &mut Document, pre: NodeId) -> NodeId {
    if let Some(existing) = doc.child_with_class(pre, CONTROL_CLASS) {
        return existing;
    }

    let control = doc.create_element(
        "button",
        &[
            ("type", "button"),
            ("class", CONTROL_CLASS),
            ("aria-label", IDLE_ARIA),
            (STATE_ATTR, STATE_IDLE),
        ],
    );
    let label = doc.create_text(IDLE_LABEL);
    doc.append_child(control, label);
    doc.append_child(pre, control);
    control
}

pub(crate) fn feedback(duration: Duration) -> CopyFeedback {
    CopyFeedback {
        idle_aria: IDLE_ARIA,
        copied_aria: COPIED_ARIA,
        labels: Some((IDLE_LABEL, COPIED_LABEL)),
        duration,
    }
}
