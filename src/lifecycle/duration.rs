use chrono::{DateTime, Utc};

/// Format elapsed time as `HH:MM:SS`.
///
/// Seconds are floored and the hours field is not capped at 24, so a
/// 25 hour run renders as `25:00:00`. Negative spans clamp to zero.
pub fn format_hhmmss(elapsed: chrono::Duration) -> String {
    let total = elapsed.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

pub fn format_between(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format_hhmmss(end - start)
}

/// Parse a `HH:MM:SS` string back into whole seconds.
pub fn parse_hhmmss(value: &str) -> Option<i64> {
    let mut parts = value.split(':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds: i64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || !(0..60).contains(&minutes) || !(0..60).contains(&seconds) {
        return None;
    }
    if hours < 0 {
        return None;
    }
    Some(hours * 3600 + minutes * 60 + seconds)
}
