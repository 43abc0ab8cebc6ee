//! File-backed content store.
//!
//! Layout under the content root:
//! ```text
//! <root>/
//! ├── posts/<slug>.md
//! ├── guides/<slug>.md
//! └── checklists/<slug>.md
//! ```
//! A file may start with a `---` delimited YAML front-matter block. Only
//! `title` and `date` (`YYYY-MM-DD`) are read; other keys are ignored.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use pagecraft_shared::{PagecraftError, Result};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Kind of authored document, one directory per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Post,
    Guide,
    Checklist,
}

impl ContentKind {
    pub const ALL: [ContentKind; 3] = [Self::Post, Self::Guide, Self::Checklist];

    /// Directory holding this kind's files.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Post => "posts",
            Self::Guide => "guides",
            Self::Checklist => "checklists",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Guide => "guide",
            Self::Checklist => "checklist",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentKind {
    type Err = PagecraftError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s || kind.dir_name() == s)
            .ok_or_else(|| PagecraftError::parse(format!("unknown content kind: {s}")))
    }
}

/// Listing metadata for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentEntry {
    pub kind: ContentKind,
    /// File stem, used in the page URL.
    pub slug: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip)]
    pub path: PathBuf,
}

/// A document with its markdown body (front matter removed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDocument {
    pub entry: ContentEntry,
    pub markdown: String,
}

/// Source of authored markdown documents.
pub trait ContentSource {
    /// Entries of `kind` (or of every kind), newest first.
    fn list(&self, kind: Option<ContentKind>) -> Result<Vec<ContentEntry>>;

    /// Load one document by kind and slug.
    fn load(&self, kind: ContentKind, slug: &str) -> Result<ContentDocument>;
}

// ---------------------------------------------------------------------------
// Filesystem store
// ---------------------------------------------------------------------------

/// Content store reading `*.md` files from a directory tree.
#[derive(Debug, Clone)]
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn kind_dir(&self, kind: ContentKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    fn list_kind(&self, kind: ContentKind, entries: &mut Vec<ContentEntry>) -> Result<()> {
        let dir = self.kind_dir(kind);
        if !dir.is_dir() {
            debug!(path = %dir.display(), "content directory missing, skipping");
            return Ok(());
        }

        let read = std::fs::read_dir(&dir).map_err(|e| PagecraftError::io(&dir, e))?;
        for item in read {
            let path = item.map_err(|e| PagecraftError::io(&dir, e))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("md") {
                continue;
            }
            let Some(slug) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let slug = slug.to_string();
            let doc = read_document(kind, slug, path)?;
            entries.push(doc.entry);
        }
        Ok(())
    }
}

impl ContentSource for FsContentStore {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    fn list(&self, kind: Option<ContentKind>) -> Result<Vec<ContentEntry>> {
        let mut entries = Vec::new();
        match kind {
            Some(kind) => self.list_kind(kind, &mut entries)?,
            None => {
                for kind in ContentKind::ALL {
                    self.list_kind(kind, &mut entries)?;
                }
            }
        }
        sort_newest_first(&mut entries);
        debug!(count = entries.len(), "content listed");
        Ok(entries)
    }

    fn load(&self, kind: ContentKind, slug: &str) -> Result<ContentDocument> {
        if slug.is_empty() || slug.contains(['/', '\\']) || slug.starts_with('.') {
            return Err(PagecraftError::validation(format!("invalid slug: {slug:?}")));
        }
        let path = self.kind_dir(kind).join(format!("{slug}.md"));
        read_document(kind, slug.to_string(), path)
    }
}

fn read_document(kind: ContentKind, slug: String, path: PathBuf) -> Result<ContentDocument> {
    let text = std::fs::read_to_string(&path).map_err(|e| PagecraftError::io(&path, e))?;
    let (front, body) = parse_front_matter(&text)
        .map_err(|e| PagecraftError::parse(format!("{}: {e}", path.display())))?;

    let title = front
        .title
        .or_else(|| first_heading(body))
        .unwrap_or_else(|| slug.clone());

    Ok(ContentDocument {
        entry: ContentEntry {
            kind,
            slug,
            title,
            date: front.date,
            path,
        },
        markdown: body.to_string(),
    })
}

/// Newest first; undated entries last; ties broken by slug.
fn sort_newest_first(entries: &mut [ContentEntry]) {
    entries.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| a.slug.cmp(&b.slug))
            .then_with(|| a.kind.cmp(&b.kind))
    });
}

// ---------------------------------------------------------------------------
// Front matter
// ---------------------------------------------------------------------------

#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
struct FrontMatter {
    title: Option<String>,
    date: Option<NaiveDate>,
}

/// Split a leading `---` YAML block off `text`, returning its fields and the body.
fn parse_front_matter(text: &str) -> std::result::Result<(FrontMatter, &str), String> {
    let Some(rest) = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    else {
        return Ok((FrontMatter::default(), text));
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let block = &rest[..offset];
            let body = &rest[offset + line.len()..];
            if block.trim().is_empty() {
                return Ok((FrontMatter::default(), body));
            }
            let mut front: FrontMatter =
                serde_yaml::from_str(block).map_err(|e| format!("invalid front matter: {e}"))?;
            front.title = front
                .title
                .map(|title| title.trim().to_string())
                .filter(|title| !title.is_empty());
            return Ok((front, body));
        }
        offset += line.len();
    }

    Err("front matter is not closed with ---".into())
}

fn first_heading(markdown: &str) -> Option<String> {
    markdown
        .lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
}
