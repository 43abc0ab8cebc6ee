//! Transient "copied" state shared by the anchor and code-block controls.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::dom::{Document, NodeId};
use crate::host::Host;

pub(crate) const STATE_ATTR: &str = "data-state";
pub(crate) const STATE_IDLE: &str = "idle";
pub(crate) const STATE_COPIED: &str = "copied";

/// How a control looks before and after a successful copy.
#[derive(Debug, Clone)]
pub(crate) struct CopyFeedback {
    pub idle_aria: &'static str,
    pub copied_aria: &'static str,
    /// Visible label swap, for controls that show text.
    pub labels: Option<(&'static str, &'static str)>,
    pub duration: Duration,
}

impl CopyFeedback {
    fn show_copied(&self, doc: &mut Document, control: NodeId) {
        doc.set_attr(control, STATE_ATTR, STATE_COPIED);
        doc.set_attr(control, "aria-label", self.copied_aria);
        if let Some((_, copied)) = self.labels {
            doc.set_text(control, copied);
        }
    }

    fn show_idle(&self, doc: &mut Document, control: NodeId) {
        doc.set_attr(control, STATE_ATTR, STATE_IDLE);
        doc.set_attr(control, "aria-label", self.idle_aria);
        if let Some((idle, _)) = self.labels {
            doc.set_text(control, idle);
        }
    }
}

/// Activation counter per control, so only the latest timer reverts it.
#[derive(Debug, Default)]
pub(crate) struct FeedbackTracker {
    generations: RefCell<HashMap<NodeId, u64>>,
}

impl FeedbackTracker {
    fn bump(&self, control: NodeId) -> u64 {
        let mut generations = self.generations.borrow_mut();
        let generation = generations.entry(control).or_insert(0);
        *generation += 1;
        *generation
    }

    fn is_current(&self, control: NodeId, generation: u64) -> bool {
        self.generations.borrow().get(&control) == Some(&generation)
    }
}

/// Write `text` to the clipboard, then flash the control's copied state.
///
/// Failures are logged and leave the control as it was.
pub(crate) async fn copy_with_feedback<H: Host>(
    doc: Rc<RefCell<Document>>,
    host: Rc<H>,
    tracker: Rc<FeedbackTracker>,
    control: NodeId,
    text: String,
    feedback: CopyFeedback,
) {
    if let Err(err) = host.write_clipboard(text).await {
        warn!(%err, ?control, "clipboard write failed");
        return;
    }

    let generation = tracker.bump(control);
    feedback.show_copied(&mut doc.borrow_mut(), control);
    debug!(?control, generation, "copied");

    tokio::time::sleep(feedback.duration).await;

    if tracker.is_current(control, generation) {
        feedback.show_idle(&mut doc.borrow_mut(), control);
    }
}
