//! String utilities for the domain layer.

/// Single-line preview of a model output for log lines (UTF-8 safe)
///
/// Runs of whitespace (including newlines) collapse to one space, and the
/// result is cut at `max_chars` characters with a trailing ellipsis.
pub fn preview(s: &str, max_chars: usize) -> String {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let kept: String = collapsed.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}
