use serde::{Deserialize, Serialize};

/// One raw regex hit for a field: the extracted value, the full surface
/// match, trimmed context on both sides, and the match position in chars.
///
/// Candidates are transient: produced and consumed within one extraction
/// call. Context is only ever an input to scoring; it never alters `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub value: String,
    pub full_match: String,
    pub pre_context: String,
    pub post_context: String,
    /// Char offset of the match start in the source text.
    pub start: usize,
    /// Char offset one past the match end.
    pub end: usize,
}

/// Walk back `count` chars from `byte_pos`, returning the new byte index.
pub(crate) fn back_up_chars(text: &str, byte_pos: usize, count: usize) -> usize {
    let mut idx = byte_pos;
    for _ in 0..count {
        match text[..idx].chars().next_back() {
            Some(c) => idx -= c.len_utf8(),
            None => break,
        }
    }
    idx
}

/// Walk forward `count` chars from `byte_pos`, returning the new byte index.
pub(crate) fn forward_chars(text: &str, byte_pos: usize, count: usize) -> usize {
    let mut idx = byte_pos;
    let mut chars = text[byte_pos..].chars();
    for _ in 0..count {
        match chars.next() {
            Some(c) => idx += c.len_utf8(),
            None => break,
        }
    }
    idx
}
