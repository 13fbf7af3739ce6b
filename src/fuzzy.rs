/// Normalized Levenshtein similarity between two strings.
///
/// Returns `1 - distance / max(len)`, measured in characters, so `1.0` is an
/// exact match and `0.0` means nothing lines up. Two empty strings score
/// `1.0`.
pub fn score(query: &str, candidate: &str) -> f64 {
    let max_len = query.chars().count().max(candidate.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - edit_distance(query, candidate) as f64 / max_len as f64
}

/// Classic unit-cost Levenshtein distance over characters.
pub fn edit_distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}
