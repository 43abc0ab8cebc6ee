//! Tag allow-list, URL scheme checks, and an HTML audit pass.
//!
//! The converter never emits raw author HTML, so the audit is a second line of
//! verification run over finished fragments.

use scraper::{ElementRef, Html};

/// Elements a rendered fragment may contain.
pub const ALLOWED_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "ul", "ol", "li", "table", "thead", "tbody", "tr",
    "th", "td", "blockquote", "img", "a", "code", "pre", "em", "strong", "del", "hr", "br",
    "input",
];

/// Attributes holding URLs that the browser may navigate to or fetch.
const URL_ATTRS: &[&str] = &["href", "src"];

/// A piece of markup outside the allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Element not in [`ALLOWED_TAGS`].
    Tag(String),
    /// Inline event handler attribute such as `onclick`.
    EventHandler { tag: String, attr: String },
    /// URL with a script-capable scheme.
    UnsafeUrl { tag: String, attr: String, url: String },
    /// `<input>` other than a disabled task-list checkbox.
    ActiveInput,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tag(tag) => write!(f, "disallowed element <{tag}>"),
            Self::EventHandler { tag, attr } => write!(f, "event handler {attr} on <{tag}>"),
            Self::UnsafeUrl { tag, attr, url } => write!(f, "unsafe {attr}=\"{url}\" on <{tag}>"),
            Self::ActiveInput => f.write_str("enabled <input> element"),
        }
    }
}

/// Whether `url` is safe to emit as a link (`is_image == false`) or image source.
pub fn is_safe_url(url: &str, is_image: bool) -> bool {
    // Browsers ignore embedded tabs/newlines and leading control chars when resolving schemes.
    let compact: String = url
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_ascii_control())
        .collect::<String>()
        .to_ascii_lowercase();

    let Some(scheme) = scheme_of(&compact) else {
        // Relative URL, fragment, or query.
        return true;
    };

    match scheme {
        "javascript" | "vbscript" => false,
        "data" => is_image && compact.starts_with("data:image/") && !compact.starts_with("data:image/svg"),
        _ => true,
    }
}

/// Scheme of an already lower-cased URL, if it has one.
fn scheme_of(url: &str) -> Option<&str> {
    let colon = url.find(':')?;
    let candidate = &url[..colon];
    let mut chars = candidate.chars();
    let first = chars.next()?;
    let valid = first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(candidate)
}

/// Re-parse `html` and list everything outside the allow-list.
pub fn audit(html: &str) -> Vec<Violation> {
    let fragment = Html::parse_fragment(html);
    let mut violations = Vec::new();

    // First descendant is the synthetic <html> wrapper of the fragment.
    for node in fragment.root_element().descendants().skip(1) {
        let Some(el) = ElementRef::wrap(node) else {
            continue;
        };
        let tag = el.value().name();

        if !ALLOWED_TAGS.contains(&tag) {
            violations.push(Violation::Tag(tag.to_string()));
            continue;
        }

        if tag == "input"
            && (el.value().attr("type") != Some("checkbox") || el.value().attr("disabled").is_none())
        {
            violations.push(Violation::ActiveInput);
        }

        for (name, value) in el.value().attrs() {
            let lowered = name.to_ascii_lowercase();
            if lowered.starts_with("on") {
                violations.push(Violation::EventHandler {
                    tag: tag.to_string(),
                    attr: name.to_string(),
                });
            } else if URL_ATTRS.contains(&lowered.as_str()) && !is_safe_url(value, tag == "img") {
                violations.push(Violation::UnsafeUrl {
                    tag: tag.to_string(),
                    attr: name.to_string(),
                    url: value.to_string(),
                });
            }
        }
    }

    violations
}
