//! Wires enhancement passes to a live document.
//!
//! The enhancer runs on a Tokio `LocalSet`. Every pass is synchronous and
//! sets processed markers before any task is spawned, so re-entrant passes
//! over the same nodes are no-ops.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use pagecraft_shared::EnhanceSettings;
use tracing::{debug, instrument};
use url::Url;

use crate::anchors;
use crate::code_blocks::{self, CodeBlockNode};
use crate::disclosure;
use crate::dom::{Action, Document, EventKind, NodeId};
use crate::feedback::{CopyFeedback, FeedbackTracker, copy_with_feedback};
use crate::host::{Host, ScrollBehavior};

// ---------------------------------------------------------------------------
// Configuration and reports
// ---------------------------------------------------------------------------

/// Timings used by the enhancer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnhanceConfig {
    pub anchor_copied: Duration,
    pub code_copied: Duration,
    pub scroll_delay: Duration,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self::from(&EnhanceSettings::default())
    }
}

impl From<&EnhanceSettings> for EnhanceConfig {
    fn from(settings: &EnhanceSettings) -> Self {
        Self {
            anchor_copied: Duration::from_millis(settings.anchor_copied_ms),
            code_copied: Duration::from_millis(settings.code_copied_ms),
            scroll_delay: Duration::from_millis(settings.scroll_delay_ms),
        }
    }
}

/// What one or more passes picked up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnhanceReport {
    pub headings: Vec<String>,
    pub code_blocks: Vec<CodeBlockNode>,
    pub disclosures: usize,
}

impl EnhanceReport {
    pub fn merge(&mut self, other: EnhanceReport) {
        self.headings.extend(other.headings);
        self.code_blocks.extend(other.code_blocks);
        self.disclosures += other.disclosures;
    }

    pub fn is_empty(&self) -> bool {
        self.headings.is_empty() && self.code_blocks.is_empty() && self.disclosures == 0
    }
}

/// User input delivered to [`Enhancer::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Click,
    /// A key press, named like `KeyboardEvent.key` (`"Enter"`, `" "`).
    Key(String),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Click => EventKind::Click,
            Self::Key(_) => EventKind::KeyDown,
        }
    }

    /// Whether the event activates a button-like control.
    fn activates(&self) -> bool {
        match self {
            Self::Click => true,
            Self::Key(key) => key == "Enter" || key == " ",
        }
    }
}

// ---------------------------------------------------------------------------
// Enhancer
// ---------------------------------------------------------------------------

/// Enhancement state for one document.
pub struct Enhancer<H: Host> {
    doc: Rc<RefCell<Document>>,
    host: Rc<H>,
    location: Url,
    config: EnhanceConfig,
    feedback: Rc<FeedbackTracker>,
    mounted: Cell<bool>,
}

impl<H: Host> Enhancer<H> {
    pub fn new(doc: Document, host: Rc<H>, location: Url) -> Self {
        Self::with_config(doc, host, location, EnhanceConfig::default())
    }

    pub fn with_config(doc: Document, host: Rc<H>, location: Url, config: EnhanceConfig) -> Self {
        Self {
            doc: Rc::new(RefCell::new(doc)),
            host,
            location,
            config,
            feedback: Rc::new(FeedbackTracker::default()),
            mounted: Cell::new(false),
        }
    }

    /// Shared handle to the document, for host-side edits and inspection.
    pub fn document(&self) -> Rc<RefCell<Document>> {
        Rc::clone(&self.doc)
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    /// Enhance the whole document. The first call also schedules the
    /// initial hash scroll; later calls only re-run the passes.
    ///
    /// Must run inside a `LocalSet`.
    #[instrument(skip_all, fields(location = %self.location))]
    pub fn mount(&self) -> EnhanceReport {
        // Anything inserted before mount is covered by the full pass.
        self.doc.borrow_mut().take_mutations();
        let root = self.doc.borrow().root();
        let report = self.enhance_subtree(root);
        debug!(
            headings = report.headings.len(),
            code_blocks = report.code_blocks.len(),
            disclosures = report.disclosures,
            "mounted"
        );

        if !self.mounted.replace(true) {
            if let Some(target) = anchors::fragment_id(&self.location) {
                self.schedule_scroll(target);
            }
        }
        report
    }

    /// Enhance subtrees inserted since the last call.
    pub fn on_mutations(&self) -> EnhanceReport {
        let roots = self.doc.borrow_mut().take_mutations();
        let mut report = EnhanceReport::default();
        for root in roots {
            report.merge(self.enhance_subtree(root));
        }
        report
    }

    /// Run every pass over `root`.
    ///
    /// Host insertions still queued are left for [`Enhancer::on_mutations`].
    pub fn enhance_subtree(&self, root: NodeId) -> EnhanceReport {
        let mut doc = self.doc.borrow_mut();
        let pending = doc.pending_mutations();
        let report = EnhanceReport {
            headings: anchors::enhance(&mut doc, root),
            code_blocks: code_blocks::enhance(&mut doc, root),
            disclosures: disclosure::enhance(&mut doc, root),
        };
        // Controls created by the passes are not host insertions.
        doc.discard_mutations_after(pending);
        report
    }

    /// Deliver `event` at `target`, bubbling to the root.
    ///
    /// Returns the number of listener actions run. A handled event on an
    /// anchor control stands in for the browser's default navigation.
    pub fn dispatch(&self, target: NodeId, event: &Event) -> usize {
        if !event.activates() {
            return 0;
        }

        let actions = {
            let doc = self.doc.borrow();
            let mut actions = Vec::new();
            let mut current = Some(target);
            while let Some(node) = current {
                actions.extend(
                    doc.listeners(node)
                        .iter()
                        .filter(|listener| listener.event == event.kind())
                        .map(|listener| (node, listener.action.clone())),
                );
                current = doc.parent(node);
            }
            actions
        };

        for (control, action) in &actions {
            self.run(*control, action);
        }
        actions.len()
    }

    fn run(&self, control: NodeId, action: &Action) {
        match action {
            Action::CopyHeadingLink { heading_id } => {
                let link = anchors::link_for(&self.location, heading_id);
                self.spawn_copy(
                    control,
                    link.to_string(),
                    anchors::feedback(self.config.anchor_copied),
                );
            }
            Action::CopyCode { text } => {
                self.spawn_copy(
                    control,
                    text.clone(),
                    code_blocks::feedback(self.config.code_copied),
                );
            }
            Action::ToggleDisclosure => {
                let state = disclosure::toggle(&mut self.doc.borrow_mut(), control);
                debug!(?control, ?state, "disclosure toggled");
            }
        }
    }

    fn spawn_copy(&self, control: NodeId, text: String, feedback: CopyFeedback) {
        tokio::task::spawn_local(copy_with_feedback(
            Rc::clone(&self.doc),
            Rc::clone(&self.host),
            Rc::clone(&self.feedback),
            control,
            text,
            feedback,
        ));
    }

    fn schedule_scroll(&self, target: String) {
        let doc = Rc::clone(&self.doc);
        let host = Rc::clone(&self.host);
        let delay = self.config.scroll_delay;
        tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            let node = anchors::heading_by_id(&doc.borrow(), &target);
            match node {
                Some(node) => host.scroll_into_view(node, ScrollBehavior::Smooth),
                None => debug!(%target, "no heading matches location fragment"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use tokio::task::LocalSet;
    use tokio::time::{advance, sleep};

    use super::*;
    use crate::host::MemoryHost;

    const PAGE: &str = concat!(
        "<h2 id=\"setup\">Setup</h2>",
        "<pre data-language=\"sh\"><code class=\"language-sh\">npm run build\n</code></pre>",
        "<section class=\"disclosure\" data-disclosure-state=\"collapsed\">",
        "<button type=\"button\" class=\"disclosure-toggle\" aria-expanded=\"false\" aria-controls=\"solution-content\">Show solution</button>",
        "<div class=\"disclosure-content\" id=\"solution-content\" hidden=\"\"><h2 id=\"solution\">Solution</h2></div>",
        "</section>",
    );

    fn page_url(fragment: &str) -> Url {
        Url::parse(&format!("https://example.com/guides/deploy{fragment}")).unwrap()
    }

    fn enhancer(host: &Rc<MemoryHost>, fragment: &str) -> Enhancer<MemoryHost> {
        Enhancer::new(Document::parse(PAGE), Rc::clone(host), page_url(fragment))
    }

    fn control_of(doc: &Document, heading_id: &str) -> NodeId {
        let heading = doc.find_by_id(heading_id).expect("heading");
        doc.child_with_class(heading, anchors::CONTROL_CLASS).expect("control")
    }

    fn code_control(doc: &Document) -> NodeId {
        let pre = doc.elements_by_tag(doc.root(), &["pre"])[0];
        doc.child_with_class(pre, code_blocks::CONTROL_CLASS).expect("control")
    }

    fn toggle_of(doc: &Document) -> NodeId {
        doc.elements_by_tag(doc.root(), &["button"])
            .into_iter()
            .find(|&b| doc.has_class(b, disclosure::TOGGLE_CLASS))
            .expect("toggle")
    }

    async fn settle() {
        // Let spawned tasks reach their first await point.
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn mount_twice_changes_nothing() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let host = Rc::new(MemoryHost::new());
                let enhancer = enhancer(&host, "#setup");
                let first = enhancer.mount();
                assert_eq!(first.headings, ["setup", "solution"]);
                assert_eq!(first.code_blocks.len(), 1);
                assert_eq!(first.disclosures, 1);

                let doc = enhancer.document();
                let html = doc.borrow().to_html();
                let listeners = doc.borrow().listener_count();

                sleep(Duration::from_millis(400)).await;
                settle().await;

                assert!(enhancer.mount().is_empty());
                assert_eq!(doc.borrow().to_html(), html);
                assert_eq!(doc.borrow().listener_count(), listeners);

                sleep(Duration::from_millis(400)).await;
                settle().await;
                assert_eq!(host.scrolls().len(), 1);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn inserted_content_is_enhanced_once() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let host = Rc::new(MemoryHost::new());
                let enhancer = enhancer(&host, "");
                enhancer.mount();
                assert!(enhancer.on_mutations().is_empty());

                let doc = enhancer.document();
                let root = doc.borrow().root();
                doc.borrow_mut()
                    .append_html(root, "<div><h3 id=\"more\">More</h3><pre><code>x</code></pre></div>");

                let report = enhancer.on_mutations();
                assert_eq!(report.headings, ["more"]);
                assert_eq!(report.code_blocks.len(), 1);
                assert!(enhancer.on_mutations().is_empty());
                assert!(enhancer.mount().is_empty());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_pass_keeps_pending_insertions() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let host = Rc::new(MemoryHost::new());
                let enhancer = enhancer(&host, "");
                enhancer.mount();

                let doc = enhancer.document();
                let root = doc.borrow().root();
                let aside = doc.borrow_mut().append_html(root, "<aside><pre><code>y</code></pre></aside>")[0];
                doc.borrow_mut().append_html(root, "<h2 id=\"late\">Late</h2>");

                let direct = enhancer.enhance_subtree(aside);
                assert_eq!(direct.code_blocks.len(), 1);

                let report = enhancer.on_mutations();
                assert_eq!(report.headings, ["late"]);
                assert!(report.code_blocks.is_empty());
                assert!(enhancer.on_mutations().is_empty());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn anchor_copies_link_and_reverts() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let host = Rc::new(MemoryHost::new());
                let enhancer = enhancer(&host, "#old");
                enhancer.mount();
                let doc = enhancer.document();
                let control = control_of(&doc.borrow(), "setup");

                assert_eq!(enhancer.dispatch(control, &Event::Click), 1);
                settle().await;
                assert_eq!(
                    host.clipboard_writes(),
                    ["https://example.com/guides/deploy#setup"]
                );
                assert_eq!(doc.borrow().attr(control, "data-state"), Some("copied"));

                sleep(Duration::from_millis(1999)).await;
                assert_eq!(doc.borrow().attr(control, "data-state"), Some("copied"));
                sleep(Duration::from_millis(2)).await;
                settle().await;
                assert_eq!(doc.borrow().attr(control, "data-state"), Some("idle"));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn only_enter_and_space_activate_anchors() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let host = Rc::new(MemoryHost::new());
                let enhancer = enhancer(&host, "");
                enhancer.mount();
                let control = control_of(&enhancer.document().borrow(), "setup");

                assert_eq!(enhancer.dispatch(control, &Event::Key("a".into())), 0);
                assert_eq!(enhancer.dispatch(control, &Event::Key("Enter".into())), 1);
                assert_eq!(enhancer.dispatch(control, &Event::Key(" ".into())), 1);
                settle().await;
                assert_eq!(host.clipboard_writes().len(), 2);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn code_copy_is_verbatim_and_reverts() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let host = Rc::new(MemoryHost::new());
                let enhancer = enhancer(&host, "");
                enhancer.mount();
                let doc = enhancer.document();
                let control = code_control(&doc.borrow());

                enhancer.dispatch(control, &Event::Click);
                settle().await;
                assert_eq!(host.clipboard_writes(), ["npm run build\n"]);
                assert_eq!(doc.borrow().text_content(control), "Copied!");

                sleep(Duration::from_millis(1500)).await;
                settle().await;
                assert_eq!(doc.borrow().text_content(control), "Copy");
                assert_eq!(doc.borrow().attr(control, "data-state"), Some("idle"));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn denied_clipboard_leaves_control_idle() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let host = Rc::new(MemoryHost::denying());
                let enhancer = enhancer(&host, "");
                enhancer.mount();
                let doc = enhancer.document();
                let control = code_control(&doc.borrow());
                let before = doc.borrow().to_html();

                enhancer.dispatch(control, &Event::Click);
                settle().await;
                assert!(host.clipboard_writes().is_empty());
                assert_eq!(doc.borrow().to_html(), before);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_copy_extends_copied_state() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let host = Rc::new(MemoryHost::new());
                let enhancer = enhancer(&host, "");
                enhancer.mount();
                let doc = enhancer.document();
                let control = code_control(&doc.borrow());

                enhancer.dispatch(control, &Event::Click);
                settle().await;
                advance(Duration::from_millis(1000)).await;
                enhancer.dispatch(control, &Event::Click);
                settle().await;

                // First timer fires here but is no longer current.
                advance(Duration::from_millis(600)).await;
                settle().await;
                assert_eq!(doc.borrow().attr(control, "data-state"), Some("copied"));

                advance(Duration::from_millis(1000)).await;
                settle().await;
                assert_eq!(doc.borrow().attr(control, "data-state"), Some("idle"));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn hash_target_scrolls_after_delay() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let host = Rc::new(MemoryHost::new());
                let enhancer = enhancer(&host, "#setup");
                enhancer.mount();

                settle().await;
                assert!(host.scrolls().is_empty());
                sleep(Duration::from_millis(301)).await;
                settle().await;

                let heading = enhancer.document().borrow().find_by_id("setup").expect("heading");
                assert_eq!(host.scrolls(), [(heading, ScrollBehavior::Smooth)]);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn encoded_hash_is_decoded_and_missing_target_is_ignored() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let host = Rc::new(MemoryHost::new());
                let doc = Document::parse("<h2 id=\"über\">Über</h2>");
                let decoded = Enhancer::new(doc, Rc::clone(&host), page_url("#%C3%BCber"));
                decoded.mount();
                sleep(Duration::from_millis(301)).await;
                settle().await;
                assert_eq!(host.scrolls().len(), 1);

                let missing = Rc::new(MemoryHost::new());
                let unmatched = enhancer(&missing, "#nowhere");
                unmatched.mount();
                sleep(Duration::from_millis(301)).await;
                settle().await;
                assert!(missing.scrolls().is_empty());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn disclosure_round_trips_with_content_present() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let host = Rc::new(MemoryHost::new());
                let enhancer = enhancer(&host, "");
                enhancer.mount();
                let doc = enhancer.document();
                let toggle = toggle_of(&doc.borrow());
                let content = doc.borrow().find_by_id("solution-content").expect("content");

                for round in 1..=4 {
                    enhancer.dispatch(toggle, &Event::Click);
                    let expected = if round % 2 == 1 {
                        disclosure::DisclosureState::Expanded
                    } else {
                        disclosure::DisclosureState::Collapsed
                    };
                    assert_eq!(disclosure::state(&doc.borrow(), toggle), Some(expected));
                    assert!(doc.borrow().find_by_id("solution").is_some());
                    assert_eq!(doc.borrow().has_attr(content, "hidden"), round % 2 == 0);
                }
                assert_eq!(doc.borrow().attr(toggle, "aria-expanded"), Some("false"));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn disclosure_toggles_from_keyboard() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let host = Rc::new(MemoryHost::new());
                let enhancer = enhancer(&host, "");
                enhancer.mount();
                let doc = enhancer.document();
                let toggle = toggle_of(&doc.borrow());

                assert_eq!(enhancer.dispatch(toggle, &Event::Key("Tab".into())), 0);
                assert_eq!(enhancer.dispatch(toggle, &Event::Key("Enter".into())), 1);
                assert_eq!(
                    disclosure::state(&doc.borrow(), toggle),
                    Some(disclosure::DisclosureState::Expanded)
                );
                enhancer.dispatch(toggle, &Event::Key(" ".into()));
                assert_eq!(
                    disclosure::state(&doc.borrow(), toggle),
                    Some(disclosure::DisclosureState::Collapsed)
                );
            })
            .await;
    }
}
