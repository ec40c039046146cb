/// Cap applied to the diff section of the embeddable payload.
pub const MAX_DIFF_CHARS: usize = 4000;

/// Trim a diff summary to at most `max_chars` code points.
///
/// Counting code points rather than bytes keeps multibyte content intact; a
/// byte cut could split a character and corrupt the payload.
pub fn truncate_diff(diff: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }

    if diff.chars().count() <= max_chars {
        return diff.to_string();
    }

    diff.chars().take(max_chars).collect()
}
