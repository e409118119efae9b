//! Tokenization and string-overlap helpers shared by the scoring providers.

/// Split text into lowercase alphanumeric tokens.
///
/// Punctuation is stripped from token edges, so "FOLFIRINOX," and
/// "folfirinox" tokenize identically. Tokens that are empty after
/// stripping are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// Jaccard similarity of the character sets of two tokens.
///
/// Returns 0.0 when either token is empty.
pub fn char_jaccard(a: &str, b: &str) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let set_a: std::collections::HashSet<char> = a.chars().collect();
    let set_b: std::collections::HashSet<char> = b.chars().collect();

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();

    intersection as f32 / union as f32
}
