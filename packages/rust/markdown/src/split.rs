//! Line-based partitioning of a document around its solution section.
//!
//! The split happens on raw markdown so segment boundaries are exact:
//! joining the segments' markdown with `\n` reproduces the input.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use pagecraft_shared::{PagecraftError, Result, SectionsConfig, Segment, SegmentRole};

/// Marker headings recognized by the splitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionMarkers {
    /// Line that starts the hidden segment (compared after trimming trailing whitespace).
    pub solution: String,
    /// Line prefixes that end the hidden segment.
    pub end: Vec<String>,
}

impl Default for SectionMarkers {
    fn default() -> Self {
        Self::from(&SectionsConfig::default())
    }
}

impl From<&SectionsConfig> for SectionMarkers {
    fn from(config: &SectionsConfig) -> Self {
        Self {
            solution: config.solution_marker.clone(),
            end: config.end_markers.clone(),
        }
    }
}

impl SectionMarkers {
    fn is_solution(&self, line: &str) -> bool {
        line.trim_end() == self.solution
    }

    fn is_end(&self, line: &str) -> bool {
        self.end.iter().any(|marker| line.starts_with(marker.as_str()))
    }
}

/// Split with the default markers.
pub fn split(markdown: &str) -> Vec<Segment> {
    split_with(markdown, &SectionMarkers::default())
}

/// Partition `markdown` into `body`, `hidden` and `after` segments.
///
/// Without a solution marker the result is a single `body` segment holding the
/// whole input. Only the first solution marker is honored.
pub fn split_with(markdown: &str, markers: &SectionMarkers) -> Vec<Segment> {
    let lines: Vec<&str> = markdown.split('\n').collect();
    let scan = scan_markers(&lines, markers);

    let Some(&start) = scan.solutions.first() else {
        return vec![Segment::new(SegmentRole::Body, markdown)];
    };

    if scan.solutions.len() > 1 {
        warn!(
            count = scan.solutions.len(),
            "multiple solution markers; only the first is honored"
        );
    }

    let end = scan.ends.iter().copied().find(|&i| i > start);

    let mut segments = Vec::with_capacity(3);
    segments.push(Segment::new(SegmentRole::Body, lines[..start].join("\n")));

    match end {
        Some(end) => {
            segments.push(Segment::new(SegmentRole::Hidden, lines[start..end].join("\n")));
            segments.push(Segment::new(SegmentRole::After, lines[end..].join("\n")));
        }
        None => {
            segments.push(Segment::new(SegmentRole::Hidden, lines[start..].join("\n")));
        }
    }

    debug!(
        solution_line = start + 1,
        end_line = end.map(|e| e + 1),
        "document split around solution section"
    );

    segments
}

/// Reject documents whose section markers are ambiguous.
///
/// Rendering tolerates these (first marker wins); this is for authoring checks.
pub fn validate_sections(markdown: &str, markers: &SectionMarkers) -> Result<()> {
    let lines: Vec<&str> = markdown.split('\n').collect();
    let scan = scan_markers(&lines, markers);

    if scan.solutions.len() > 1 {
        let at: Vec<String> = scan.solutions.iter().map(|i| (i + 1).to_string()).collect();
        return Err(PagecraftError::validation(format!(
            "{} solution markers found (lines {}); a document may have at most one",
            scan.solutions.len(),
            at.join(", ")
        )));
    }

    if let Some(&start) = scan.solutions.first() {
        if let Some(&early) = scan.ends.iter().find(|&&i| i < start) {
            return Err(PagecraftError::validation(format!(
                "end marker on line {} appears before the solution marker on line {}",
                early + 1,
                start + 1
            )));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Marker scanning
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MarkerScan {
    solutions: Vec<usize>,
    ends: Vec<usize>,
}

/// Find marker line indices, skipping lines inside fenced code blocks.
fn scan_markers(lines: &[&str], markers: &SectionMarkers) -> MarkerScan {
    static FENCE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^ {0,3}(`{3,}|~{3,})(.*)$").expect("valid regex"));

    let mut scan = MarkerScan::default();
    // (fence char, fence length) of the currently open fence
    let mut open_fence: Option<(char, usize)> = None;

    for (i, line) in lines.iter().enumerate() {
        if let Some(caps) = FENCE_RE.captures(line) {
            let fence = &caps[1];
            let ch = fence.chars().next().unwrap_or('`');
            match open_fence {
                None => {
                    open_fence = Some((ch, fence.len()));
                    continue;
                }
                // A closing fence carries no info string.
                Some((open_ch, open_len))
                    if open_ch == ch && fence.len() >= open_len && caps[2].trim().is_empty() =>
                {
                    open_fence = None;
                    continue;
                }
                Some(_) => {}
            }
        }

        if open_fence.is_some() {
            continue;
        }

        if markers.is_solution(line) {
            scan.solutions.push(i);
        } else if markers.is_end(line) {
            scan.ends.push(i);
        }
    }

    scan
}
