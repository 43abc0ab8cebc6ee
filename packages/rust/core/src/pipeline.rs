//! Per-page render pipeline: markdown → segments → HTML fragments → page HTML.

use serde::Serialize;
use tracing::{debug, instrument, warn};

use pagecraft_enhance::{Document, disclosure};
use pagecraft_markdown::{ConvertOptions, SectionMarkers, SlugRegistry, audit, convert_with, split_with};
use pagecraft_shared::{
    AppConfig, CodeBlockRecord, HeadingRecord, PagecraftError, RenderedFragment, Result,
    SegmentRole,
};

/// Base id for the element wrapping the hidden segment's content.
const SOLUTION_CONTENT_ID: &str = "solution-content";

/// Options for rendering one page.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Marker lines the splitter recognizes.
    pub markers: SectionMarkers,
    /// Converter settings applied to every segment.
    pub convert: ConvertOptions,
    /// Audit each fragment against the allow-list before assembling.
    pub verify_output: bool,
    /// Insert anchor and copy controls into the page HTML.
    pub prerender_controls: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for RenderOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            markers: SectionMarkers::from(&config.sections),
            convert: ConvertOptions::from(&config.render),
            verify_output: config.render.verify_output,
            prerender_controls: config.render.prerender_controls,
        }
    }
}

/// One converted segment.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedSegment {
    pub role: SegmentRole,
    #[serde(rename = "html")]
    pub fragment: RenderedFragment,
}

/// A fully rendered page.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RenderedPage {
    /// Converted segments in document order.
    pub segments: Vec<RenderedSegment>,
    /// Headings from every segment; ids are unique across the page.
    pub headings: Vec<HeadingRecord>,
    pub code_blocks: Vec<CodeBlockRecord>,
    pub degraded_blocks: usize,
    /// Id of the disclosure content element, when the page has a hidden segment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution_id: Option<String>,
    /// The page body, with the hidden segment behind a disclosure.
    pub html: String,
}

impl RenderedPage {
    pub fn has_solution(&self) -> bool {
        self.solution_id.is_some()
    }
}

/// Render a markdown document to page HTML.
///
/// All segments draw heading ids from one registry, so an id never repeats
/// within the page. Fails only when `verify_output` finds markup outside the
/// allow-list.
#[instrument(skip_all, fields(len = markdown.len()))]
pub fn render_markdown(markdown: &str, opts: &RenderOptions) -> Result<RenderedPage> {
    let mut slugs = SlugRegistry::new();
    let mut page = RenderedPage::default();

    for segment in split_with(markdown, &opts.markers) {
        let converted = convert_with(&segment.markdown, &mut slugs, &opts.convert);
        if opts.verify_output {
            verify_fragment(&converted.fragment, segment.role)?;
        }

        page.headings.extend(converted.headings);
        page.code_blocks.extend(converted.code_blocks);
        page.degraded_blocks += converted.degraded_blocks;
        page.segments.push(RenderedSegment {
            role: segment.role,
            fragment: converted.fragment,
        });
    }

    let mut html = String::new();
    for segment in &page.segments {
        match segment.role {
            SegmentRole::Hidden => {
                let id = slugs.claim(SOLUTION_CONTENT_ID);
                html.push_str(&disclosure::wrap(&segment.fragment, &id));
                page.solution_id = Some(id);
            }
            SegmentRole::Body | SegmentRole::After => html.push_str(&segment.fragment.html),
        }
    }

    if opts.prerender_controls {
        let mut doc = Document::parse(&html);
        let root = doc.root();
        let controls = pagecraft_enhance::prerender(&mut doc, root);
        debug!(controls, "controls prerendered");
        html = doc.to_html();
    }
    page.html = html;

    if page.degraded_blocks > 0 {
        warn!(degraded = page.degraded_blocks, "page has blocks rendered as text");
    }
    debug!(
        segments = page.segments.len(),
        headings = page.headings.len(),
        solution = page.has_solution(),
        "page rendered"
    );

    Ok(page)
}

/// Reject a fragment holding markup outside the allow-list.
pub fn verify_fragment(fragment: &RenderedFragment, role: SegmentRole) -> Result<()> {
    let violations = audit(&fragment.html);
    if violations.is_empty() {
        return Ok(());
    }

    let listed: Vec<String> = violations.iter().map(ToString::to_string).collect();
    Err(PagecraftError::Sanitize(format!(
        "{role} segment: {}",
        listed.join("; ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXERCISE: &str = "\
# Exercise

## Setup

Install it.

## Solution

```sh
npm run build
```

## Result

## Setup
";

    #[test]
    fn ids_are_unique_across_segments() {
        let page = render_markdown(EXERCISE, &RenderOptions::default()).unwrap();
        let ids: Vec<&str> = page.headings.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["exercise", "setup", "solution", "result", "setup-2"]);
    }

    #[test]
    fn hidden_segment_sits_behind_collapsed_disclosure() {
        let page = render_markdown(EXERCISE, &RenderOptions::default()).unwrap();
        let roles: Vec<SegmentRole> = page.segments.iter().map(|s| s.role).collect();
        assert_eq!(roles, [SegmentRole::Body, SegmentRole::Hidden, SegmentRole::After]);
        assert_eq!(page.solution_id.as_deref(), Some("solution-content"));

        let gate = page.html.find("class=\"disclosure\"").expect("disclosure");
        let code = page.html.find("npm run build").expect("code");
        let result = page.html.find("id=\"result\"").expect("result");
        assert!(gate < code && code < result);
        assert!(page.html.contains("data-disclosure-state=\"collapsed\""));
    }

    #[test]
    fn document_without_marker_has_no_disclosure() {
        let page = render_markdown("# Notes\n\nPlain.\n", &RenderOptions::default()).unwrap();
        assert_eq!(page.segments.len(), 1);
        assert!(!page.has_solution());
        assert!(!page.html.contains("disclosure"));
    }

    #[test]
    fn content_id_avoids_heading_ids() {
        let md = "## Solution Content\n\n## Solution\n\nx\n";
        let page = render_markdown(md, &RenderOptions::default()).unwrap();
        assert_eq!(page.headings[0].id, "solution-content");
        assert_eq!(page.solution_id.as_deref(), Some("solution-content-2"));
    }

    #[test]
    fn prerendered_controls_carry_no_markers() {
        let opts = RenderOptions {
            prerender_controls: true,
            ..RenderOptions::default()
        };
        let page = render_markdown(EXERCISE, &opts).unwrap();
        assert!(page.html.contains("class=\"heading-anchor\""));
        assert!(page.html.contains("class=\"code-copy\""));
        assert!(!page.html.contains("data-anchor-enhanced"));
    }

    #[test]
    fn raw_html_is_rendered_inert() {
        let md = "<script>alert(1)</script>\n\n[x](javascript:alert(1))\n";
        let page = render_markdown(md, &RenderOptions::default()).unwrap();
        assert!(!page.html.contains("<script"));
        assert!(!page.html.contains("javascript:"));
    }

    #[test]
    fn audit_findings_become_sanitize_errors() {
        let fragment = RenderedFragment::new("<p onclick=\"x()\">hi</p>");
        let err = verify_fragment(&fragment, SegmentRole::After).unwrap_err();
        assert!(matches!(err, PagecraftError::Sanitize(_)));
        assert!(err.to_string().contains("after segment"));
    }
}
