const MINUTES_PER_HOUR: i64 = 60;
const MINUTES_PER_DAY: i64 = 24 * MINUTES_PER_HOUR;

/// Format an age in minutes for display ("just now", "5m ago", "2h ago", "3d ago").
/// Hours and days are rounded to the nearest unit.
pub fn format_age(minutes: i64) -> String {
    match minutes {
        // Negative ages come from clock skew
        m if m < 1 => "just now".to_string(),
        m if m < MINUTES_PER_HOUR => format!("{}m ago", m),
        m if m < MINUTES_PER_DAY => format!("{}h ago", round_to(m, MINUTES_PER_HOUR)),
        m => format!("{}d ago", round_to(m, MINUTES_PER_DAY)),
    }
}

fn round_to(minutes: i64, unit: i64) -> i64 {
    (minutes + unit / 2) / unit
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
