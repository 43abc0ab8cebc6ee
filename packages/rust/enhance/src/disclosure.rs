//! Disclosure gate for the hidden (solution) segment.
//!
//! The hidden HTML is always present in the page so it stays indexable; only
//! its visibility is gated. Each gate toggles between collapsed and expanded
//! for as long as the page lives.

use pagecraft_shared::RenderedFragment;

use crate::dom::{Action, Document, EventKind, Listener, NodeId};

pub const SECTION_CLASS: &str = "disclosure";
pub const TOGGLE_CLASS: &str = "disclosure-toggle";
pub const CONTENT_CLASS: &str = "disclosure-content";
pub const STATE_ATTR: &str = "data-disclosure-state";

/// Marker set on a toggle once its listener is attached.
pub const ENHANCED_ATTR: &str = "data-disclosure-enhanced";

const SHOW_LABEL: &str = "Show solution";
const HIDE_LABEL: &str = "Hide solution";

/// Visual state of one disclosure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisclosureState {
    #[default]
    Collapsed,
    Expanded,
}

impl DisclosureState {
    pub fn toggled(self) -> Self {
        match self {
            Self::Collapsed => Self::Expanded,
            Self::Expanded => Self::Collapsed,
        }
    }

    pub fn is_expanded(self) -> bool {
        self == Self::Expanded
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Collapsed => "collapsed",
            Self::Expanded => "expanded",
        }
    }

    fn from_attr(value: Option<&str>) -> Self {
        match value {
            Some("expanded") => Self::Expanded,
            _ => Self::Collapsed,
        }
    }
}

/// Wrap a hidden segment's HTML in a collapsed disclosure.
pub fn wrap(fragment: &RenderedFragment, content_id: &str) -> String {
    let mut doc = Document::new();
    let root = doc.root();

    let section = doc.create_element(
        "section",
        &[
            ("class", SECTION_CLASS),
            (STATE_ATTR, DisclosureState::Collapsed.as_str()),
        ],
    );
    let toggle = doc.create_element(
        "button",
        &[
            ("type", "button"),
            ("class", TOGGLE_CLASS),
            ("aria-expanded", "false"),
            ("aria-controls", content_id),
        ],
    );
    let label = doc.create_text(SHOW_LABEL);
    doc.append_child(toggle, label);

    let content = doc.create_element(
        "div",
        &[("class", CONTENT_CLASS), ("id", content_id), ("hidden", "")],
    );
    doc.append_child(section, toggle);
    doc.append_child(section, content);
    doc.append_child(root, section);
    doc.append_html(content, &fragment.html);

    let mut html = doc.to_html();
    html.push('\n');
    html
}

/// Attach toggle listeners to unprocessed disclosures under `root`.
pub fn enhance(doc: &mut Document, root: NodeId) -> usize {
    let mut count = 0;
    for button in doc.elements_by_tag(root, &["button"]) {
        if !doc.has_class(button, TOGGLE_CLASS) || doc.has_attr(button, ENHANCED_ATTR) {
            continue;
        }
        doc.set_attr(button, ENHANCED_ATTR, "true");
        for event in [EventKind::Click, EventKind::KeyDown] {
            doc.add_listener(
                button,
                Listener {
                    event,
                    action: Action::ToggleDisclosure,
                },
            );
        }
        count += 1;
    }
    count
}

/// Current state of the disclosure containing `node`.
pub fn state(doc: &Document, node: NodeId) -> Option<DisclosureState> {
    let section = doc.closest_with_class(node, SECTION_CLASS)?;
    Some(DisclosureState::from_attr(doc.attr(section, STATE_ATTR)))
}

/// Flip the disclosure owning `toggle` and return its new state.
pub fn toggle(doc: &mut Document, toggle: NodeId) -> Option<DisclosureState> {
    let section = doc.closest_with_class(toggle, SECTION_CLASS)?;
    let next = DisclosureState::from_attr(doc.attr(section, STATE_ATTR)).toggled();

    let content = doc
        .attr(toggle, "aria-controls")
        .and_then(|id| doc.find_by_id(id))
        .or_else(|| doc.child_with_class(section, CONTENT_CLASS));

    doc.set_attr(section, STATE_ATTR, next.as_str());
    doc.set_attr(toggle, "aria-expanded", if next.is_expanded() { "true" } else { "false" });
    doc.set_text(toggle, if next.is_expanded() { HIDE_LABEL } else { SHOW_LABEL });

    if let Some(content) = content {
        if next.is_expanded() {
            doc.remove_attr(content, "hidden");
        } else {
            doc.set_attr(content, "hidden", "");
        }
    }

    Some(next)
}
