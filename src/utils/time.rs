//! Time utilities for reference dates and offset parsing
//!
//! Temporal classification never looks at the system's local timezone. The
//! reference date is always derived from UTC plus a configured fixed offset.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use regex::Regex;

/// Parse a time offset string like "+8h", "+5h30m", "-45m", "0"
pub fn parse_time_offset(offset_str: &str) -> Result<i32, String> {
    let offset_str = offset_str.trim();

    // Handle the simple "0" case or empty string
    if offset_str == "0" || offset_str.is_empty() {
        return Ok(0);
    }

    let re = Regex::new(r"^([+-]?)(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?$")
        .map_err(|e| format!("Invalid regex: {e}"))?;

    let caps = re.captures(offset_str).ok_or_else(|| {
        format!(
            "Invalid time offset format: '{offset_str}'. Expected format like '+8h', '+5h30m', '-45m', or '0'"
        )
    })?;

    let sign = match caps.get(1).map(|m| m.as_str()) {
        Some("-") => -1,
        _ => 1,
    };

    let field = |idx: usize, unit: &str| -> Result<i32, String> {
        caps.get(idx)
            .map(|m| {
                m.as_str()
                    .parse::<i32>()
                    .map_err(|_| format!("{unit} offset out of range: '{}'", m.as_str()))
            })
            .transpose()
            .map(|value| value.unwrap_or(0))
    };

    let hours = field(2, "Hour")?;
    let minutes = field(3, "Minute")?;
    let seconds = field(4, "Second")?;

    if hours > 23 {
        return Err(format!(
            "Hour offset too large: {hours}h. Maximum allowed is 23h"
        ));
    }

    if minutes > 59 {
        return Err(format!(
            "Minute offset too large: {minutes}m. Maximum allowed is 59m"
        ));
    }

    if seconds > 59 {
        return Err(format!(
            "Second offset too large: {seconds}s. Maximum allowed is 59s"
        ));
    }

    let total_seconds = (hours * 3600) + (minutes * 60) + seconds;
    Ok(sign * total_seconds)
}

/// Build a fixed offset from seconds east of UTC
pub fn fixed_offset(offset_seconds: i32) -> Result<FixedOffset, String> {
    FixedOffset::east_opt(offset_seconds).ok_or_else(|| {
        format!(
            "Offset out of range: {}",
            format_duration(offset_seconds.abs())
        )
    })
}

/// Calendar date at `now` in the given fixed offset
pub fn reference_date(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

/// Parse an 8-digit `YYYYMMDD` token; calendar-invalid tokens yield `None`
pub fn parse_date_token(token: &str) -> Option<NaiveDate> {
    if token.len() != 8 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(token, "%Y%m%d").ok()
}

/// Timestamp written into the playlist trailer
pub fn format_update_timestamp(now: DateTime<Utc>, offset: FixedOffset) -> String {
    now.with_timezone(&offset)
        .format("%Y-%m-%d %H:%M:%S %:z")
        .to_string()
}

fn format_duration(seconds: i32) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if secs > 0 {
        parts.push(format!("{secs}s"));
    }

    if parts.is_empty() {
        "0s".to_string()
    } else {
        parts.join("")
    }
}
