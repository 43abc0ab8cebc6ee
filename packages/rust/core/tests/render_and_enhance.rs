//! End-to-end: render a fixture page, load it into a document, enhance it.

use std::path::PathBuf;
use std::rc::Rc;

use pagecraft_core::{RenderOptions, render_markdown};
use pagecraft_enhance::{
    Document, DisclosureState, Enhancer, Event, MemoryHost, anchors, code_blocks, disclosure,
};
use tokio::task::LocalSet;
use url::Url;

fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../../fixtures")
        .join(name);
    std::fs::read_to_string(&path).unwrap()
}

fn page_url() -> Url {
    Url::parse("https://example.com/guides/deploy-static-site").unwrap()
}

fn count_class(doc: &Document, class: &str) -> usize {
    doc.descendants(doc.root())
        .into_iter()
        .filter(|&node| doc.has_class(node, class))
        .count()
}

async fn settle() {
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn prerendered_page_is_wired_without_duplicate_controls() {
    let opts = RenderOptions {
        prerender_controls: true,
        ..RenderOptions::default()
    };
    let page = render_markdown(&fixture("markdown/guide.md"), &opts).unwrap();

    LocalSet::new()
        .run_until(async {
            let host = Rc::new(MemoryHost::new());
            let enhancer = Enhancer::new(Document::parse(&page.html), Rc::clone(&host), page_url());
            let report = enhancer.mount();

            assert_eq!(report.headings.len(), page.headings.len());
            assert_eq!(report.code_blocks.len(), page.code_blocks.len());
            assert_eq!(report.disclosures, 1);

            let doc = enhancer.document();
            assert_eq!(count_class(&doc.borrow(), anchors::CONTROL_CLASS), page.headings.len());
            assert_eq!(count_class(&doc.borrow(), code_blocks::CONTROL_CLASS), page.code_blocks.len());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn solution_code_is_copyable_after_reveal() {
    let page = render_markdown(&fixture("markdown/guide.md"), &RenderOptions::default()).unwrap();
    let solution_id = page.solution_id.clone().expect("fixture has a solution");

    LocalSet::new()
        .run_until(async {
            let host = Rc::new(MemoryHost::new());
            let enhancer = Enhancer::new(Document::parse(&page.html), Rc::clone(&host), page_url());
            let report = enhancer.mount();
            let doc = enhancer.document();

            let toggle = doc
                .borrow()
                .elements_by_tag(doc.borrow().root(), &["button"])
                .into_iter()
                .find(|&b| doc.borrow().has_class(b, disclosure::TOGGLE_CLASS))
                .expect("toggle");
            let content = doc.borrow().find_by_id(&solution_id).expect("content");
            assert!(doc.borrow().has_attr(content, "hidden"));

            enhancer.dispatch(toggle, &Event::Click);
            assert_eq!(disclosure::state(&doc.borrow(), toggle), Some(DisclosureState::Expanded));
            assert!(!doc.borrow().has_attr(content, "hidden"));

            let solution_block = report
                .code_blocks
                .iter()
                .find(|block| doc.borrow().is_ancestor(content, block.node))
                .expect("code block inside solution");
            let control = doc
                .borrow()
                .child_with_class(solution_block.node, code_blocks::CONTROL_CLASS)
                .expect("copy control");

            enhancer.dispatch(control, &Event::Click);
            settle().await;
            let writes = host.clipboard_writes();
            assert_eq!(writes.len(), 1);
            assert!(writes[0].starts_with("git init\n"));
            assert!(writes[0].ends_with("git push origin main\n"));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn late_inserted_page_is_enhanced_once() {
    let first = render_markdown("# One\n\n```\na\n```\n", &RenderOptions::default()).unwrap();
    let second = render_markdown(&fixture("markdown/guide.md"), &RenderOptions::default()).unwrap();

    LocalSet::new()
        .run_until(async {
            let host = Rc::new(MemoryHost::new());
            let enhancer = Enhancer::new(Document::parse(&first.html), Rc::clone(&host), page_url());
            enhancer.mount();

            let doc = enhancer.document();
            let root = doc.borrow().root();
            doc.borrow_mut().append_html(root, &second.html);

            let report = enhancer.on_mutations();
            assert_eq!(report.headings.len(), second.headings.len());
            assert!(enhancer.on_mutations().is_empty());
            assert!(enhancer.mount().is_empty());
        })
        .await;
}
