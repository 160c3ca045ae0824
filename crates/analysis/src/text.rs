//! Text normalization shared by the detectors and word metrics.

/// Normalize text for matching: lowercase, strip punctuation, collapse
/// whitespace.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split normalized text into words.
pub fn normalize_words(text: &str) -> Vec<String> {
    normalize_text(text)
        .split_whitespace()
        .map(|w| w.to_string())
        .collect()
}

/// Number of words after normalization.
pub fn word_count(text: &str) -> u64 {
    normalize_text(text).split_whitespace().count() as u64
}

/// Counts whole-word occurrences of a (possibly multi-word) phrase in
/// already-normalized text.
pub fn count_phrase(normalized: &str, phrase: &str) -> usize {
    let words: Vec<&str> = normalized.split_whitespace().collect();
    let needle: Vec<&str> = phrase.split_whitespace().collect();
    if needle.is_empty() || words.len() < needle.len() {
        return 0;
    }
    words
        .windows(needle.len())
        .filter(|w| *w == needle.as_slice())
        .count()
}
