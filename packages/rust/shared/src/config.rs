//! Application configuration for Pagecraft.
//!
//! User config lives at `~/.pagecraft/pagecraft.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{PagecraftError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "pagecraft.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".pagecraft";

// ---------------------------------------------------------------------------
// Config structs (matching pagecraft.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Site-wide settings.
    #[serde(default)]
    pub site: SiteConfig,

    /// Section marker headings used by the splitter.
    #[serde(default)]
    pub sections: SectionsConfig,

    /// Markdown rendering switches.
    #[serde(default)]
    pub render: RenderConfig,

    /// Client-side enhancement timings.
    #[serde(default)]
    pub enhance: EnhanceSettings,
}

/// `[site]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Absolute base URL pages are served from. Used to build copy-link URLs.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3000/".into()
}

/// `[sections]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionsConfig {
    /// Exact line that starts the hidden segment.
    #[serde(default = "default_solution_marker")]
    pub solution_marker: String,

    /// Line prefixes that end the hidden segment.
    #[serde(default = "default_end_markers")]
    pub end_markers: Vec<String>,
}

impl Default for SectionsConfig {
    fn default() -> Self {
        Self {
            solution_marker: default_solution_marker(),
            end_markers: default_end_markers(),
        }
    }
}

fn default_solution_marker() -> String {
    "## Solution".into()
}
fn default_end_markers() -> Vec<String> {
    ["## Result", "## Validation", "## Links", "## Share Your Success"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// `[render]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Audit every rendered fragment against the tag allow-list.
    #[serde(default = "default_true")]
    pub verify_output: bool,

    /// Ship anchor and copy controls in the server-rendered HTML.
    #[serde(default)]
    pub prerender_controls: bool,

    /// Deepest block nesting rendered before a block degrades to text.
    #[serde(default = "default_max_nesting")]
    pub max_nesting: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            verify_output: true,
            prerender_controls: false,
            max_nesting: default_max_nesting(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_max_nesting() -> usize {
    32
}

/// `[enhance]` section. All values in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhanceSettings {
    /// How long a heading's copy-link control shows its "copied" state.
    #[serde(default = "default_anchor_copied_ms")]
    pub anchor_copied_ms: u64,

    /// How long a code block's copy control shows its "copied" state.
    #[serde(default = "default_code_copied_ms")]
    pub code_copied_ms: u64,

    /// Grace delay before scrolling to the heading named in the URL fragment.
    #[serde(default = "default_scroll_delay_ms")]
    pub scroll_delay_ms: u64,
}

impl Default for EnhanceSettings {
    fn default() -> Self {
        Self {
            anchor_copied_ms: default_anchor_copied_ms(),
            code_copied_ms: default_code_copied_ms(),
            scroll_delay_ms: default_scroll_delay_ms(),
        }
    }
}

fn default_anchor_copied_ms() -> u64 {
    2000
}
fn default_code_copied_ms() -> u64 {
    1500
}
fn default_scroll_delay_ms() -> u64 {
    300
}

impl AppConfig {
    /// Parse `site.base_url`, which must be absolute.
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.site.base_url).map_err(|e| {
            PagecraftError::config(format!("invalid site.base_url '{}': {e}", self.site.base_url))
        })
    }

    /// Check values that serde cannot validate on its own.
    pub fn validate(&self) -> Result<()> {
        self.base_url()?;

        if self.sections.solution_marker.trim().is_empty() {
            return Err(PagecraftError::config("sections.solution_marker must not be empty"));
        }
        if self.sections.end_markers.iter().any(|m| m.trim().is_empty()) {
            return Err(PagecraftError::config("sections.end_markers must not contain empty entries"));
        }
        if self.render.max_nesting == 0 {
            return Err(PagecraftError::config("render.max_nesting must be at least 1"));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.pagecraft/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PagecraftError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.pagecraft/pagecraft.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PagecraftError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        PagecraftError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;

    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PagecraftError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PagecraftError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PagecraftError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("solution_marker"));
        assert!(toml_str.contains("## Share Your Success"));
        assert!(toml_str.contains("anchor_copied_ms = 2000"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.sections.solution_marker, "## Solution");
        assert_eq!(parsed.sections.end_markers.len(), 4);
        assert_eq!(parsed.enhance.scroll_delay_ms, 300);
        assert!(parsed.render.verify_output);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[site]
base_url = "https://guides.example.org/"

[enhance]
code_copied_ms = 1000
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.site.base_url, "https://guides.example.org/");
        assert_eq!(config.enhance.code_copied_ms, 1000);
        assert_eq!(config.enhance.anchor_copied_ms, 2000);
        assert_eq!(config.render.max_nesting, 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn relative_base_url_is_rejected() {
        let mut config = AppConfig::default();
        config.site.base_url = "/guides/".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("site.base_url"));
    }

    #[test]
    fn empty_end_marker_is_rejected() {
        let mut config = AppConfig::default();
        config.sections.end_markers.push("  ".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_config_from_reports_parse_errors() {
        let dir = std::env::temp_dir().join(format!("pagecraft-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        let path = dir.join("broken.toml");
        std::fs::write(&path, "[render\nverify_output = true").expect("write");

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
