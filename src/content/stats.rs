//! Word count and reading time estimates

use super::dom;

/// Default reading speed in words per minute
pub const DEFAULT_WORDS_PER_MINUTE: usize = 200;

/// Count whitespace-separated words in the text content of an HTML fragment
pub fn word_count(html: &str) -> usize {
    if html.trim().is_empty() {
        return 0;
    }
    let fragment = dom::parse(html);
    let root = fragment.root();
    dom::text_content(&root).split_whitespace().count()
}

/// Estimated reading time in whole minutes, rounded up
pub fn reading_time(html: &str, words_per_minute: usize) -> usize {
    let wpm = if words_per_minute == 0 {
        DEFAULT_WORDS_PER_MINUTE
    } else {
        words_per_minute
    };
    word_count(html).div_ceil(wpm)
}
