//! Shared types, error model, and configuration for Pagecraft.
//!
//! This crate is the foundation depended on by all other Pagecraft crates.
//! It provides:
//! - [`PagecraftError`] — the unified error type
//! - Domain types ([`Segment`], [`RenderedFragment`], [`HeadingRecord`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, EnhanceSettings, RenderConfig, SectionsConfig, SiteConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{PagecraftError, Result};
pub use types::{CodeBlockRecord, HeadingRecord, RenderedFragment, Segment, SegmentRole};
