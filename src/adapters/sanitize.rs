//! Content Filters
//!
//! Default [`ContentFilter`] implementations applied to post title and body
//! before insert.

use std::sync::Arc;

use crate::domain::ContentFilter;

/// Replacement written over each sensitive word
pub const REPLACEMENT: &str = "***";

/// Escapes HTML markup so stored text renders literally.
///
/// Uses [`ammonia::clean_text`], which also escapes whitespace, `/`, `=` and
/// backticks so the output is safe inside unquoted attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlEscapeFilter;

impl ContentFilter for HtmlEscapeFilter {
    fn filter(&self, text: &str) -> String {
        ammonia::clean_text(text)
    }
}

/// Masks every occurrence of a configured word list
#[derive(Debug, Clone, Default)]
pub struct SensitiveWordFilter {
    words: Vec<String>,
}

impl SensitiveWordFilter {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut words: Vec<String> = words
            .into_iter()
            .map(Into::into)
            .filter(|w| !w.trim().is_empty())
            .collect();
        // Longest first so a word is not partially masked by its prefix
        words.sort_by_key(|w| std::cmp::Reverse(w.len()));
        Self { words }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl ContentFilter for SensitiveWordFilter {
    fn filter(&self, text: &str) -> String {
        self.words
            .iter()
            .fold(text.to_string(), |acc, word| acc.replace(word.as_str(), REPLACEMENT))
    }
}

/// Applies filters in order
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn ContentFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: impl ContentFilter + 'static) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }
}

impl ContentFilter for FilterChain {
    fn filter(&self, text: &str) -> String {
        self.filters
            .iter()
            .fold(text.to_string(), |acc, f| f.filter(&acc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        assert_eq!(HtmlEscapeFilter.filter("<b>"), "&lt;b&gt;");
        assert_eq!(HtmlEscapeFilter.filter("Tom&Jerry"), "Tom&amp;Jerry");
        assert_eq!(HtmlEscapeFilter.filter("\"q\""), "&quot;q&quot;");
        assert_eq!(HtmlEscapeFilter.filter("plain"), "plain");

        let escaped = HtmlEscapeFilter.filter("<script>alert('x')</script>");
        assert!(!escaped.contains('<'));
        assert!(!escaped.contains('\''));
        assert!(escaped.starts_with("&lt;script&gt;"));
    }

    #[test]
    fn test_sensitive_words_masked() {
        let filter = SensitiveWordFilter::new(["gamble", "gambler", " "]);
        assert_eq!(filter.len(), 2);
        assert_eq!(
            filter.filter("no gambler shall gamble here"),
            "no *** shall *** here"
        );
    }

    #[test]
    fn test_chain_applies_in_order() {
        let chain = FilterChain::new()
            .with(HtmlEscapeFilter)
            .with(SensitiveWordFilter::new(["drugs"]));
        assert_eq!(chain.filter("<i>drugs"), "&lt;i&gt;***");
    }

    #[test]
    fn test_empty_chain_is_identity() {
        assert_eq!(FilterChain::new().filter("<x>"), "<x>");
    }
}
