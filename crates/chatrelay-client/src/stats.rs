//! Display helpers for processing statistics.

use chatrelay_protocol::{CacheInfo, ChatInfo, ProcessingInfo};
use chrono::{DateTime, NaiveDateTime, Utc};

/// `0.25` → `"250ms"`, `1.5` → `"1.50s"`.
pub fn format_response_time(seconds: f64) -> String {
    if seconds < 1.0 {
        format!("{:.0}ms", seconds * 1000.0)
    } else {
        format!("{:.2}s", seconds)
    }
}

/// `1234567` → `"1,234,567"`.
pub fn format_number(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Parse a backend timestamp. Naive timestamps are taken as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn seconds_between(from: Option<&str>, to: Option<&str>) -> Option<f64> {
    let from = parse_timestamp(from?)?;
    let to = parse_timestamp(to?)?;
    Some((to - from).num_milliseconds() as f64 / 1000.0)
}

/// Seconds from processing start to completion.
pub fn processing_time(start: Option<&str>, end: Option<&str>) -> Option<f64> {
    seconds_between(start, end)
}

/// Seconds from processing start to the first token.
pub fn first_token_time(start: Option<&str>, first_token: Option<&str>) -> Option<f64> {
    seconds_between(start, first_token)
}

/// One-line summary of a message's statistics, e.g.
/// `"response 1.50s · first token 250ms · cache miss"`.
pub fn describe_message(processing: Option<&ProcessingInfo>, cache: Option<&CacheInfo>) -> String {
    let mut parts = Vec::new();
    if let Some(info) = processing {
        let start = info.start_timestamp.as_deref();
        if let Some(total) = processing_time(start, info.end_timestamp.as_deref()) {
            parts.push(format!("response {}", format_response_time(total)));
        }
        if let Some(first) = first_token_time(start, info.first_token_timestamp.as_deref()) {
            parts.push(format!("first token {}", format_response_time(first)));
        }
    }
    if let Some(cache) = cache {
        if cache.hit {
            parts.push(format!("cache hit ({} hits)", format_number(cache.num_hits)));
        } else {
            parts.push("cache miss".to_string());
        }
    }
    parts.join(" · ")
}

/// Footer line for the aggregate chat statistics.
pub fn describe_chat_info(info: &ChatInfo) -> String {
    format!(
        "{} chats · {} messages · {} avg response · {} avg first token",
        format_number(info.chats_created),
        format_number(info.messages_received),
        format_response_time(info.average_response_time),
        format_response_time(info.average_first_token_time),
    )
}
