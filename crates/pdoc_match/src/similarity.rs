//! String similarity metrics used for registry lookups.
//!
//! `ratio` is the order-sensitive edit-distance similarity for identifiers
//! (certificate and house numbers), `token_sort_ratio` the order-tolerant
//! variant for addresses. On unsegmented CJK text with no whitespace the
//! two coincide, since the whole string is a single token.

/// Normalized Levenshtein similarity in [0, 1].
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    strsim::normalized_levenshtein(a, b)
}

/// Whitespace-tokenize both inputs, sort the tokens, rejoin, then compare.
/// Tolerates word reordering and stray token insertions.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}
