// Output formatting — terminal display and export files.

pub mod export;
pub mod terminal;

use chrono::{DateTime, Utc};

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Respects UTF-8 character boundaries, so display names with emoji or
/// accented letters never panic.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let char_count = text.chars().count();
    if char_count <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}

/// Signed delta for display: "+3", "-2", or "" when unchanged.
pub fn format_delta(delta: i64) -> String {
    match delta {
        0 => String::new(),
        d if d > 0 => format!("+{d}"),
        d => d.to_string(),
    }
}

/// Coarse relative time ("just now", "5m ago", "3h ago", "2d ago").
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    let mins = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if mins < 1 {
        "just now".to_string()
    } else if mins < 60 {
        format!("{mins}m ago")
    } else if hours < 24 {
        format!("{hours}h ago")
    } else {
        format!("{days}d ago")
    }
}
