//! Copy-link controls on headings.

use std::time::Duration;

use percent_encoding::percent_decode_str;
use url::Url;

use crate::dom::{Action, Document, EventKind, Listener, NodeId};
use crate::feedback::{CopyFeedback, STATE_ATTR, STATE_IDLE};

/// Marker set on a heading once its control is wired.
pub const ENHANCED_ATTR: &str = "data-anchor-enhanced";

/// Class of the copy-link control.
pub const CONTROL_CLASS: &str = "heading-anchor";

pub const HEADING_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

const IDLE_ARIA: &str = "Copy link to this section";
const COPIED_ARIA: &str = "Link copied";

/// Wire every unprocessed heading with an id under `root`.
///
/// Returns the ids of the headings enhanced by this call.
pub fn enhance(doc: &mut Document, root: NodeId) -> Vec<String> {
    let mut enhanced = Vec::new();

    for heading in doc.elements_by_tag(root, HEADING_TAGS) {
        let Some(id) = doc.attr(heading, "id").filter(|id| !id.is_empty()) else {
            continue;
        };
        let id = id.to_string();
        if doc.has_attr(heading, ENHANCED_ATTR) {
            continue;
        }
        doc.set_attr(heading, ENHANCED_ATTR, "true");

        let control = locate_or_create_control(doc, heading, &id);
        for event in [EventKind::Click, EventKind::KeyDown] {
            doc.add_listener(
                control,
                Listener {
                    event,
                    action: Action::CopyHeadingLink {
                        heading_id: id.clone(),
                    },
                },
            );
        }
        enhanced.push(id);
    }

    enhanced
}

/// Insert controls without wiring them, for server-rendered HTML.
pub fn prerender(doc: &mut Document, root: NodeId) -> usize {
    let mut created = 0;
    for heading in doc.elements_by_tag(root, HEADING_TAGS) {
        let Some(id) = doc.attr(heading, "id").filter(|id| !id.is_empty()) else {
            continue;
        };
        let id = id.to_string();
        if doc.child_with_class(heading, CONTROL_CLASS).is_none() {
            locate_or_create_control(doc, heading, &id);
            created += 1;
        }
    }
    created
}

fn locate_or_create_control(doc: &mut Document, heading: NodeId, id: &str) -> NodeId {
    if let Some(existing) = doc.child_with_class(heading, CONTROL_CLASS) {
        return existing;
    }

    let href = format!("#{id}");
    let control = doc.create_element(
        "a",
        &[
            ("class", CONTROL_CLASS),
            ("href", &href),
            ("role", "button"),
            ("tabindex", "0"),
            ("aria-label", IDLE_ARIA),
            (STATE_ATTR, STATE_IDLE),
        ],
    );
    let glyph = doc.create_text("#");
    doc.append_child(control, glyph);
    doc.append_child(heading, control);
    control
}

/// Absolute URL of the page pointing at `heading_id`.
pub fn link_for(location: &Url, heading_id: &str) -> Url {
    let mut url = location.clone();
    url.set_fragment(Some(heading_id));
    url
}

/// Decoded fragment of `location`, if it has a non-empty one.
pub fn fragment_id(location: &Url) -> Option<String> {
    let raw = location.fragment().filter(|f| !f.is_empty())?;
    let decoded = percent_decode_str(raw).decode_utf8_lossy();
    Some(decoded.into_owned())
}

/// Heading element whose id is `id`.
pub fn heading_by_id(doc: &Document, id: &str) -> Option<NodeId> {
    doc.find_by_id(id)
        .filter(|&node| doc.tag(node).is_some_and(|tag| HEADING_TAGS.contains(&tag)))
}

pub(crate) fn feedback(duration: Duration) -> CopyFeedback {
    CopyFeedback {
        idle_aria: IDLE_ARIA,
        copied_aria: COPIED_ARIA,
        labels: None,
        duration,
    }
}
