//! Heading slugs with per-render collision tracking.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Fallback slug for headings with no usable characters.
const EMPTY_SLUG: &str = "section";

/// Slugs already handed out during one document render.
///
/// Create one per render and pass it to every conversion of that render.
/// Never share a registry between documents.
#[derive(Debug, Clone, Default)]
pub struct SlugRegistry {
    seen: HashSet<String>,
}

impl SlugRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.seen.contains(slug)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Reserve `base`, or the first free `base-2`, `base-3`, ... variant.
    pub fn claim(&mut self, base: &str) -> String {
        if self.seen.insert(base.to_string()) {
            return base.to_string();
        }

        let mut n = 2usize;
        loop {
            let candidate = format!("{base}-{n}");
            if self.seen.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Produce a document-unique slug for `text` and record it in `seen`.
pub fn slugify(text: &str, seen: &mut SlugRegistry) -> String {
    seen.claim(&base_slug(text))
}

/// Lower-case, strip punctuation, hyphenate whitespace. No uniqueness.
pub fn base_slug(text: &str) -> String {
    static PUNCT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\s_-]").expect("valid regex"));
    static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

    let lowered = text.to_lowercase();
    let stripped = PUNCT_RE.replace_all(&lowered, "");
    let hyphenated = WS_RE.replace_all(stripped.trim(), "-");
    let slug = hyphenated.trim_matches('-');

    if slug.is_empty() {
        EMPTY_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_headings_get_numeric_suffixes() {
        let mut seen = SlugRegistry::new();
        let ids: Vec<String> = ["Setup", "Setup", "Setup"]
            .iter()
            .map(|t| slugify(t, &mut seen))
            .collect();
        assert_eq!(ids, ["setup", "setup-2", "setup-3"]);
    }

    #[test]
    fn strips_punctuation_and_hyphenates() {
        assert_eq!(base_slug("What's   new in v2.0?"), "whats-new-in-v20");
        assert_eq!(base_slug("  Step 1: Install  "), "step-1-install");
        assert_eq!(base_slug("snake_case and kebab-case"), "snake_case-and-kebab-case");
    }

    #[test]
    fn keeps_non_ascii_letters() {
        assert_eq!(base_slug("Über Äpfel"), "über-äpfel");
    }

    #[test]
    fn empty_text_falls_back() {
        let mut seen = SlugRegistry::new();
        assert_eq!(slugify("???", &mut seen), "section");
        assert_eq!(slugify("", &mut seen), "section-2");
    }

    #[test]
    fn literal_suffix_does_not_collide() {
        let mut seen = SlugRegistry::new();
        assert_eq!(slugify("Setup 2", &mut seen), "setup-2");
        assert_eq!(slugify("Setup", &mut seen), "setup");
        assert_eq!(slugify("Setup", &mut seen), "setup-3");
    }

    #[test]
    fn fresh_registry_restarts_numbering() {
        let mut first = SlugRegistry::new();
        slugify("Intro", &mut first);
        slugify("Intro", &mut first);

        let mut second = SlugRegistry::new();
        assert_eq!(slugify("Intro", &mut second), "intro");
        assert_eq!(second.len(), 1);
    }
}
