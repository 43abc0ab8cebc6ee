//! Render pipeline orchestration for Pagecraft.
//!
//! Ties the splitter, converter and disclosure gate together into per-page
//! rendering (`render_markdown`), reads authored content from disk, and
//! builds a whole site of rendered fragments.

pub mod content;
pub mod pipeline;
pub mod site;

pub use content::{ContentDocument, ContentEntry, ContentKind, ContentSource, FsContentStore};
pub use pipeline::{RenderOptions, RenderedPage, RenderedSegment, render_markdown};
pub use site::{BuildResult, ProgressReporter, SilentProgress, build_site};
