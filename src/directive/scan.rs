//! Byte-offset helpers shared by the parser and the output filter.
//!
//! Matching is ASCII case-insensitive. Callers lowercase the haystack once
//! with [`str::to_ascii_lowercase`], which preserves byte offsets, and
//! search it with lowercase needles.

/// Byte index of the next `\n` at or after `from`, or `text.len()`.
pub(crate) fn line_end(text: &str, from: usize) -> usize {
    text[from..].find('\n').map_or(text.len(), |i| from + i)
}

/// Whether a match starting at `at` is not glued to a preceding word.
pub(crate) fn starts_word(text: &str, at: usize) -> bool {
    text[..at]
        .chars()
        .next_back()
        .is_none_or(|c| !(c.is_alphanumeric() || c == '_' || c == '-'))
}

/// Whether a match ending at `end` is not glued to a following word.
pub(crate) fn ends_word(text: &str, end: usize) -> bool {
    text[end..]
        .chars()
        .next()
        .is_none_or(|c| !(c.is_alphanumeric() || c == '_' || c == '-'))
}

/// All word-aligned occurrences of `needle` in `lower`, left to right,
/// non-overlapping.
pub(crate) fn find_all(lower: &str, needle: &str) -> Vec<usize> {
    let mut hits = Vec::new();
    if needle.is_empty() {
        return hits;
    }
    let mut from = 0;
    while let Some(i) = lower[from..].find(needle) {
        let at = from + i;
        if starts_word(lower, at) {
            hits.push(at);
            from = at + needle.len();
        } else {
            from = at + lower[at..].chars().next().map_or(1, char::len_utf8);
        }
    }
    hits
}

/// Whether the text at `at` opens a `--flag` token: two dashes at a token
/// boundary followed by an ASCII letter.
pub(crate) fn is_flag_start(text: &str, at: usize) -> bool {
    let rest = &text[at..];
    rest.starts_with("--")
        && rest[2..].chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && text[..at]
            .chars()
            .next_back()
            .is_none_or(|c| c.is_whitespace() || matches!(c, '(' | '`' | '"' | '\''))
}

/// Byte index of the next `--flag` token at or after `from`.
pub(crate) fn next_flag(text: &str, from: usize) -> Option<usize> {
    let mut search = from;
    while let Some(i) = text[search..].find("--") {
        let at = search + i;
        if is_flag_start(text, at) {
            return Some(at);
        }
        search = at + 1;
    }
    None
}
