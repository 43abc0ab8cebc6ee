//! Whole-site build: render every document in a content source to disk.
//!
//! Output layout:
//! ```text
//! <out_dir>/
//! ├── index.json
//! ├── posts/<slug>.html
//! ├── guides/<slug>.html
//! └── checklists/<slug>.html
//! ```

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use pagecraft_shared::{HeadingRecord, PagecraftError, Result};

use crate::content::{ContentEntry, ContentKind, ContentSource};
use crate::pipeline::{RenderOptions, render_markdown};

/// Progress callback for reporting build status.
pub trait ProgressReporter {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each page is rendered and written.
    fn page_rendered(&self, entry: &ContentEntry, current: usize, total: usize);
    /// Called when the build completes.
    fn done(&self, result: &BuildResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn page_rendered(&self, _entry: &ContentEntry, _current: usize, _total: usize) {}
    fn done(&self, _result: &BuildResult) {}
}

/// Outcome of [`build_site`].
#[derive(Debug)]
pub struct BuildResult {
    pub out_dir: PathBuf,
    /// Pages written to disk.
    pub rendered: usize,
    /// Pages skipped because they failed to load or render.
    pub failed: usize,
    pub elapsed: Duration,
}

/// `index.json` contents.
#[derive(Debug, Serialize)]
struct SiteIndex {
    generated_at: DateTime<Utc>,
    pages: Vec<IndexedPage>,
}

#[derive(Debug, Serialize)]
struct IndexedPage {
    kind: ContentKind,
    slug: String,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<NaiveDate>,
    /// Output path relative to the site root.
    path: String,
    has_solution: bool,
    headings: Vec<HeadingRecord>,
}

/// Render every listed document into `out_dir`.
///
/// A document that fails to load or render is logged and skipped; the build
/// only fails on errors writing the output tree.
#[instrument(skip_all, fields(out_dir = %out_dir.display()))]
pub fn build_site(
    source: &dyn ContentSource,
    opts: &RenderOptions,
    out_dir: &Path,
    progress: &dyn ProgressReporter,
) -> Result<BuildResult> {
    let start = Instant::now();

    progress.phase("Listing content");
    let entries = source.list(None)?;
    let total = entries.len();

    progress.phase("Rendering pages");
    let mut pages = Vec::with_capacity(total);
    let mut failed = 0;

    for (i, entry) in entries.iter().enumerate() {
        let rendered = source
            .load(entry.kind, &entry.slug)
            .and_then(|doc| render_markdown(&doc.markdown, opts));
        let page = match rendered {
            Ok(page) => page,
            Err(e) => {
                warn!(kind = %entry.kind, slug = %entry.slug, error = %e, "page failed to render, skipping");
                failed += 1;
                continue;
            }
        };

        let rel = format!("{}/{}.html", entry.kind.dir_name(), entry.slug);
        write_atomic(&out_dir.join(&rel), &page.html)?;
        progress.page_rendered(entry, i + 1, total);

        pages.push(IndexedPage {
            kind: entry.kind,
            slug: entry.slug.clone(),
            title: entry.title.clone(),
            date: entry.date,
            path: rel,
            has_solution: page.has_solution(),
            headings: page.headings,
        });
    }

    progress.phase("Writing index");
    let rendered = pages.len();
    let index = SiteIndex {
        generated_at: Utc::now(),
        pages,
    };
    write_json(&out_dir.join("index.json"), &index)?;

    let result = BuildResult {
        out_dir: out_dir.to_path_buf(),
        rendered,
        failed,
        elapsed: start.elapsed(),
    };
    progress.done(&result);

    info!(
        rendered = result.rendered,
        failed = result.failed,
        elapsed_ms = result.elapsed.as_millis(),
        "site build complete"
    );

    Ok(result)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Write to a temp file beside `path`, then rename over it.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| PagecraftError::io(parent, e))?;
    }

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| PagecraftError::validation(format!("bad output path: {}", path.display())))?;
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| PagecraftError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| PagecraftError::io(path, e))?;

    debug!(path = %path.display(), size = content.len(), "wrote page");
    Ok(())
}

/// Write a JSON file (pretty-printed).
fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data).map_err(|e| {
        PagecraftError::validation(format!("JSON serialization failed: {e}"))
    })?;
    write_atomic(path, &json)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::content::{ContentDocument, FsContentStore};

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "pagecraft-site-test-{}-{name}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn fixture_path(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures")
            .join(name)
    }

    #[derive(Default)]
    struct RecordingProgress {
        phases: RefCell<Vec<String>>,
        pages: RefCell<Vec<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, name: &str) {
            self.phases.borrow_mut().push(name.to_string());
        }
        fn page_rendered(&self, entry: &ContentEntry, _current: usize, _total: usize) {
            self.pages.borrow_mut().push(entry.slug.clone());
        }
        fn done(&self, _result: &BuildResult) {}
    }

    /// A source whose second document cannot be loaded.
    struct FlakySource;

    impl ContentSource for FlakySource {
        fn list(&self, _kind: Option<ContentKind>) -> Result<Vec<ContentEntry>> {
            Ok(["good", "broken"]
                .into_iter()
                .map(|slug| ContentEntry {
                    kind: ContentKind::Post,
                    slug: slug.into(),
                    title: slug.into(),
                    date: None,
                    path: PathBuf::new(),
                })
                .collect())
        }

        fn load(&self, kind: ContentKind, slug: &str) -> Result<ContentDocument> {
            if slug == "broken" {
                return Err(PagecraftError::parse("front matter is not closed with ---"));
            }
            let entry = self.list(Some(kind))?.remove(0);
            Ok(ContentDocument {
                entry,
                markdown: "# Good\n".into(),
            })
        }
    }

    #[test]
    fn build_writes_pages_and_index() {
        let out = temp_dir("fixtures");
        let store = FsContentStore::new(fixture_path("content"));
        let progress = RecordingProgress::default();

        let result = build_site(&store, &RenderOptions::default(), &out, &progress).unwrap();
        assert_eq!(result.rendered, 3);
        assert_eq!(result.failed, 0);

        let guide = std::fs::read_to_string(out.join("guides/deploy-static-site.html")).unwrap();
        assert!(guide.contains("class=\"disclosure\""));
        assert!(out.join("posts/hello-world.html").exists());
        assert!(out.join("checklists/launch-checklist.html").exists());

        let index: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join("index.json")).unwrap())
                .unwrap();
        let pages = index["pages"].as_array().unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0]["slug"], "deploy-static-site");
        assert_eq!(pages[0]["has_solution"], true);
        assert_eq!(pages[0]["kind"], "guide");

        assert_eq!(progress.pages.borrow().len(), 3);
        assert_eq!(progress.phases.borrow().first().map(String::as_str), Some("Listing content"));

        let _ = std::fs::remove_dir_all(&out);
    }

    #[test]
    fn failing_page_is_skipped() {
        let out = temp_dir("flaky");
        let result = build_site(&FlakySource, &RenderOptions::default(), &out, &SilentProgress).unwrap();

        assert_eq!(result.rendered, 1);
        assert_eq!(result.failed, 1);
        assert!(out.join("posts/good.html").exists());
        assert!(!out.join("posts/broken.html").exists());

        let _ = std::fs::remove_dir_all(&out);
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let out = temp_dir("atomic");
        let target = out.join("nested/page.html");
        write_atomic(&target, "<p>x</p>").unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "<p>x</p>");
        assert!(!out.join("nested/.page.html.tmp").exists());

        let _ = std::fs::remove_dir_all(&out);
    }
}
