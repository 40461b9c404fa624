//! Text helpers for log lines and notices.

/// Shorten text to at most `max_len` characters, ending with `...` when cut.
pub fn truncate_for_summary(text: &str, max_len: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_len {
        return trimmed.to_string();
    }

    // Reserve space for the trailing ellipsis ("...").
    let target_len = max_len.saturating_sub(3);
    let truncated: String = trimmed.chars().take(target_len).collect();
    format!("{}...", truncated.trim_end())
}
