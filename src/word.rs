//! Word-boundary predicates over the plain-text coordinate space.
//!
//! Every character is either a word character (alphanumeric or `_`) or a
//! separator. A position `p` in `0..=len` is a boundary when it does not fall
//! between two word characters; string edges are always boundaries.

/// Classify a single character.
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whether cutting at `pos` keeps every word whole.
pub fn is_boundary(chars: &[char], pos: usize) -> bool {
    if pos == 0 || pos >= chars.len() {
        return true;
    }
    !(is_word_char(chars[pos - 1]) && is_word_char(chars[pos]))
}

/// Whether `pos` sits right after the last character of a word.
pub fn is_word_end(chars: &[char], pos: usize) -> bool {
    pos > 0
        && pos <= chars.len()
        && is_word_char(chars[pos - 1])
        && chars.get(pos).is_none_or(|c| !is_word_char(*c))
}

/// Rightmost boundary at or before `pos` (clamped to the text length).
pub fn boundary_at_or_before(chars: &[char], pos: usize) -> usize {
    let mut cut = pos.min(chars.len());
    while !is_boundary(chars, cut) {
        cut -= 1;
    }
    cut
}

/// End of the first complete word that finishes strictly after `pos` and
/// strictly before `limit`.
pub fn word_end_after(chars: &[char], pos: usize, limit: usize) -> Option<usize> {
    let limit = limit.min(chars.len());
    (pos.saturating_add(1)..limit).find(|&p| is_word_end(chars, p))
}

/// Length of `chars[..end]` once trailing whitespace is dropped.
pub fn trim_trailing_whitespace(chars: &[char], end: usize) -> usize {
    let mut end = end.min(chars.len());
    while end > 0 && chars[end - 1].is_whitespace() {
        end -= 1;
    }
    end
}
