//! Markdown-to-HTML conversion, section splitting, and heading slugs.
//!
//! Converts author-written markdown into sanitized HTML with `pulldown-cmark`.
//! The document is rendered one top-level block at a time so a block that fails
//! structural checks degrades to escaped text without taking the page down.

pub mod sanitize;
pub mod slug;
pub mod split;

use std::mem;
use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, html};
use tracing::{debug, instrument, warn};

use pagecraft_shared::{CodeBlockRecord, HeadingRecord, RenderConfig, RenderedFragment};

pub use sanitize::{ALLOWED_TAGS, Violation, audit, is_safe_url};
pub use slug::{SlugRegistry, base_slug, slugify};
pub use split::{SectionMarkers, split, split_with, validate_sections};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Options for the markdown-to-HTML conversion.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Deepest element nesting a block may reach before it degrades to text.
    pub max_nesting: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self::from(&RenderConfig::default())
    }
}

impl From<&RenderConfig> for ConvertOptions {
    fn from(config: &RenderConfig) -> Self {
        Self {
            max_nesting: config.max_nesting,
        }
    }
}

/// Result of converting one markdown source to HTML.
#[derive(Debug, Clone, Default)]
pub struct ConvertResult {
    /// The sanitized HTML.
    pub fragment: RenderedFragment,
    /// Headings in document order, with their assigned ids.
    pub headings: Vec<HeadingRecord>,
    /// Code blocks in document order.
    pub code_blocks: Vec<CodeBlockRecord>,
    /// Number of blocks rendered as escaped source instead of markup.
    pub degraded_blocks: usize,
}

/// Why a single block could not be rendered as markup.
#[derive(Debug, thiserror::Error)]
enum BlockError {
    #[error("table row {row} has {found} cells but the header has {expected}")]
    RaggedTable {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("block nests {depth} levels deep (limit {limit})")]
    TooDeep { depth: usize, limit: usize },

    #[error("unsupported construct: {0}")]
    Unsupported(String),
}

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Convert a standalone markdown document with a fresh slug registry.
pub fn convert(markdown: &str) -> ConvertResult {
    convert_with(markdown, &mut SlugRegistry::new(), &ConvertOptions::default())
}

/// Convert markdown, drawing heading ids from `slugs`.
///
/// Pass the same registry for every segment of one document so ids stay unique
/// across segments.
#[instrument(skip_all, fields(len = markdown.len()))]
pub fn convert_with(
    markdown: &str,
    slugs: &mut SlugRegistry,
    opts: &ConvertOptions,
) -> ConvertResult {
    let events = Parser::new_ext(markdown, parser_options()).into_offset_iter();
    let blocks = top_level_blocks(events);

    let mut result = ConvertResult::default();
    let mut html = String::with_capacity(markdown.len() + markdown.len() / 2);

    for block in &blocks {
        match render_block(markdown, block, slugs, opts) {
            Ok(rendered) => {
                html.push_str(&rendered.html);
                result.headings.extend(rendered.headings);
                result.code_blocks.extend(rendered.code_blocks);
            }
            Err(err) => {
                warn!(%err, range = ?block.range, "block rendered as escaped text");
                html.push_str(&escaped_paragraph(&markdown[block.range.clone()]));
                result.degraded_blocks += 1;
            }
        }
    }

    debug!(
        blocks = blocks.len(),
        headings = result.headings.len(),
        code_blocks = result.code_blocks.len(),
        degraded = result.degraded_blocks,
        "conversion complete"
    );

    result.fragment = RenderedFragment::new(html);
    result
}

fn parser_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

// ---------------------------------------------------------------------------
// Block grouping
// ---------------------------------------------------------------------------

/// One top-level block: its events and the source range it spans.
struct Block<'a> {
    events: Vec<(Event<'a>, Range<usize>)>,
    range: Range<usize>,
}

fn top_level_blocks<'a>(events: impl Iterator<Item = (Event<'a>, Range<usize>)>) -> Vec<Block<'a>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();
    let mut block_range = 0..0;
    let mut depth = 0usize;

    for (event, range) in events {
        match event {
            Event::Start(_) => {
                if depth == 0 {
                    block_range = range.clone();
                }
                depth += 1;
                current.push((event, range));
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                current.push((event, range));
                if depth == 0 {
                    blocks.push(Block {
                        events: mem::take(&mut current),
                        range: block_range.clone(),
                    });
                }
            }
            other if depth == 0 => blocks.push(Block {
                events: vec![(other, range.clone())],
                range,
            }),
            other => current.push((other, range)),
        }
    }

    if !current.is_empty() {
        blocks.push(Block {
            events: current,
            range: block_range,
        });
    }

    blocks
}

// ---------------------------------------------------------------------------
// Block rendering
// ---------------------------------------------------------------------------

struct RenderedBlock {
    html: String,
    headings: Vec<HeadingRecord>,
    code_blocks: Vec<CodeBlockRecord>,
}

/// Render one block. Slugs are only claimed once every check has passed.
fn render_block(
    source: &str,
    block: &Block<'_>,
    slugs: &mut SlugRegistry,
    opts: &ConvertOptions,
) -> Result<RenderedBlock, BlockError> {
    check_structure(source, block, opts)?;

    // Pass 1: heading texts, so ids exist before each heading opens.
    let mut heading_texts: Vec<(u8, String)> = Vec::new();
    let mut open_heading: Option<(u8, String)> = None;
    for (event, _) in &block.events {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                open_heading = Some((*level as u8, String::new()));
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(heading) = open_heading.take() {
                    heading_texts.push(heading);
                }
            }
            Event::Text(t) | Event::Code(t) | Event::InlineHtml(t) => {
                if let Some((_, text)) = open_heading.as_mut() {
                    text.push_str(t);
                }
            }
            _ => {}
        }
    }

    let headings: Vec<HeadingRecord> = heading_texts
        .into_iter()
        .map(|(level, text)| {
            let text = text.trim().to_string();
            HeadingRecord {
                id: slugify(&text, slugs),
                text,
                level,
            }
        })
        .collect();

    // Pass 2: rewrite events into their safe HTML form.
    let mut ids = headings.iter().map(|h| h.id.clone());
    let mut code_blocks = Vec::new();
    let mut events = Vec::with_capacity(block.events.len());

    for (event, _) in block.events.iter().cloned() {
        let mapped = match event {
            Event::Start(Tag::Heading { level, .. }) => Event::Start(Tag::Heading {
                level,
                id: ids.next().map(CowStr::from),
                classes: Vec::new(),
                attrs: Vec::new(),
            }),
            Event::Start(Tag::CodeBlock(kind)) => {
                let language = match &kind {
                    CodeBlockKind::Fenced(info) => info.split_whitespace().next().map(String::from),
                    CodeBlockKind::Indented => None,
                };
                let open = match &language {
                    Some(lang) => {
                        let lang = escape_html(lang);
                        format!("<pre data-language=\"{lang}\"><code class=\"language-{lang}\">")
                    }
                    None => "<pre><code>".to_string(),
                };
                code_blocks.push(CodeBlockRecord { language });
                Event::Html(CowStr::from(open))
            }
            Event::End(TagEnd::CodeBlock) => Event::Html(CowStr::Borrowed("</code></pre>\n")),
            Event::Start(Tag::HtmlBlock) => Event::Start(Tag::Paragraph),
            Event::End(TagEnd::HtmlBlock) => Event::End(TagEnd::Paragraph),
            // Author HTML is shown, never interpreted.
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            }) => Event::Start(Tag::Link {
                link_type,
                dest_url: safe_destination(dest_url, false),
                title,
                id,
            }),
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) => Event::Start(Tag::Image {
                link_type,
                dest_url: safe_destination(dest_url, true),
                title,
                id,
            }),
            other => other,
        };
        events.push(mapped);
    }

    let mut out = String::new();
    html::push_html(&mut out, events.into_iter());

    Ok(RenderedBlock {
        html: out,
        headings,
        code_blocks,
    })
}

/// Checks that must pass before a block is rendered as markup.
fn check_structure(source: &str, block: &Block<'_>, opts: &ConvertOptions) -> Result<(), BlockError> {
    let mut depth = 0usize;
    let mut in_table_head = false;
    let mut header_cells = 0usize;
    let mut body_row = 0usize;

    for (event, range) in &block.events {
        match event {
            Event::Start(tag) => {
                depth += 1;
                if depth > opts.max_nesting {
                    return Err(BlockError::TooDeep {
                        depth,
                        limit: opts.max_nesting,
                    });
                }
                match tag {
                    Tag::TableHead => in_table_head = true,
                    Tag::TableCell if in_table_head => header_cells += 1,
                    Tag::TableRow => {
                        body_row += 1;
                        let found = count_cells(&source[range.clone()]);
                        if header_cells > 0 && found > header_cells {
                            return Err(BlockError::RaggedTable {
                                row: body_row,
                                expected: header_cells,
                                found,
                            });
                        }
                    }
                    Tag::Paragraph
                    | Tag::Heading { .. }
                    | Tag::BlockQuote(_)
                    | Tag::CodeBlock(_)
                    | Tag::HtmlBlock
                    | Tag::List(_)
                    | Tag::Item
                    | Tag::Table(_)
                    | Tag::TableCell
                    | Tag::Emphasis
                    | Tag::Strong
                    | Tag::Strikethrough
                    | Tag::Link { .. }
                    | Tag::Image { .. } => {}
                    other => return Err(BlockError::Unsupported(format!("{other:?}"))),
                }
            }
            Event::End(TagEnd::TableHead) => {
                in_table_head = false;
                depth = depth.saturating_sub(1);
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Text(_)
            | Event::Code(_)
            | Event::Html(_)
            | Event::InlineHtml(_)
            | Event::SoftBreak
            | Event::HardBreak
            | Event::Rule
            | Event::TaskListMarker(_) => {}
            other => return Err(BlockError::Unsupported(format!("{other:?}"))),
        }
    }

    Ok(())
}

/// Count the cells of one source table row, honoring `\|` escapes.
fn count_cells(row: &str) -> usize {
    let row = row.trim();
    let row = row.strip_prefix('|').unwrap_or(row);
    let row = match row.strip_suffix('|') {
        Some(inner) if !inner.ends_with('\\') => inner,
        _ => row,
    };

    let mut cells = 1;
    let mut escaped = false;
    for c in row.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '|' => cells += 1,
            _ => {}
        }
    }
    cells
}

fn safe_destination(dest: CowStr<'_>, is_image: bool) -> CowStr<'_> {
    if is_safe_url(&dest, is_image) {
        dest
    } else {
        warn!(url = %dest, "dropped unsafe link destination");
        CowStr::Borrowed("#")
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Render a block's source as a paragraph of plain text.
fn escaped_paragraph(source: &str) -> String {
    format!("<p>{}</p>\n", escape_html(source.trim_end()))
}

/// Escape text for use in HTML content or a double-quoted attribute.
pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
