//! Reusable formatting utilities for CLI output

use chrono::{TimeZone, Utc};
use serde_json::Value;

/// Format epoch milliseconds as local date/time.
///
/// Returns "N/A" for out-of-range timestamps.
///
/// # Example output
/// `2025-01-15 14:30`
pub fn format_epoch_millis(millis: i64) -> String {
    match Utc.timestamp_millis_opt(millis) {
        chrono::LocalResult::Single(dt) => dt
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
            .to_string(),
        _ => "N/A".to_string(),
    }
}

/// Format an age in milliseconds as a short human duration.
///
/// # Example output
/// - `2h 15m` (hours, minutes)
/// - `5m 10s` (minutes, seconds)
/// - `45s` (seconds only)
pub fn format_age(millis: i64) -> String {
    let secs = (millis.max(0) / 1000) as u64;

    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else if mins > 0 {
        format!("{}m {}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Format bytes as human-readable size
pub fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;
    const GB: usize = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Render one JSON field value for a table cell or pretty line
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => nested.to_string(),
    }
}
