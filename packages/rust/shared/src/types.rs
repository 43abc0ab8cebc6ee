//! Core domain types for the content rendering pipeline.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Segments
// ---------------------------------------------------------------------------

/// Rendering role of a slice of a markdown document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentRole {
    /// Normal visible flow before the solution marker.
    Body,
    /// The solution section, rendered behind a disclosure.
    Hidden,
    /// Visible flow resuming after the solution section.
    After,
}

impl SegmentRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Body => "body",
            Self::Hidden => "hidden",
            Self::After => "after",
        }
    }
}

impl std::fmt::Display for SegmentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contiguous slice of a markdown document tagged with its rendering role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub role: SegmentRole,
    pub markdown: String,
}

impl Segment {
    pub fn new(role: SegmentRole, markdown: impl Into<String>) -> Self {
        Self {
            role,
            markdown: markdown.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Rendered output
// ---------------------------------------------------------------------------

/// Sanitized HTML produced for one segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderedFragment {
    pub html: String,
}

impl RenderedFragment {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.html.trim().is_empty()
    }
}

/// A heading as rendered, with its document-unique id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingRecord {
    /// Slug used as the DOM `id` and link fragment.
    pub id: String,
    /// Plain heading text (inline markup stripped).
    pub text: String,
    /// Heading level, 1 through 6.
    pub level: u8,
}

/// A rendered `<pre><code>` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlockRecord {
    /// First word of the fence info string, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_role_serializes_lowercase() {
        let seg = Segment::new(SegmentRole::After, "## Result\nC");
        let json = serde_json::to_string(&seg).expect("serialize");
        assert_eq!(json, r###"{"role":"after","markdown":"## Result\nC"}"###);

        let parsed: Segment = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, seg);
    }

    #[test]
    fn segment_role_display() {
        assert_eq!(SegmentRole::Body.to_string(), "body");
        assert_eq!(SegmentRole::Hidden.to_string(), "hidden");
    }

    #[test]
    fn fragment_serializes_as_plain_string() {
        let fragment = RenderedFragment::new("<p>hi</p>\n");
        let json = serde_json::to_string(&fragment).expect("serialize");
        assert_eq!(json, r#""<p>hi</p>\n""#);
        assert!(RenderedFragment::new(" \n").is_empty());
    }

    #[test]
    fn code_block_without_language_omits_field() {
        let record = CodeBlockRecord { language: None };
        let json = serde_json::to_string(&record).expect("serialize");
        assert_eq!(json, "{}");
    }
}
