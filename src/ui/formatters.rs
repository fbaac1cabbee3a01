use chrono::{DateTime, Local};
use humansize::{format_size as human_format_size, DECIMAL};
use std::time::{Duration, SystemTime};

/// Format file size in human-readable format
pub fn format_size(size: u64) -> String {
    human_format_size(size, DECIMAL)
}

/// Format timestamp as HH:MM:SS, used as the log line prefix
pub fn format_time(time: SystemTime) -> String {
    let datetime: DateTime<Local> = time.into();
    datetime.format("%H:%M:%S").to_string()
}

/// Format an elapsed duration as `1h 02m 03s`, `2m 03s` or `3s`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);

    if h > 0 {
        format!("{}h {:02}m {:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m {:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}

/// Cut `text` to at most `max` characters, ending in `…` when shortened
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(max - 1).collect();
    out.push('…');
    out
}
