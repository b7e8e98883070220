//! Auth-log line recognition.
//!
//! Recognizes failed SSH authentication events in raw log lines and extracts
//! a structured [`LogEvent`]. Matching is driven by an ordered table of
//! pattern/kind pairs; the first match wins, so any accidental overlap
//! between patterns resolves deterministically.
//!
//! Non-matching lines are not an error, they simply yield `None`.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use regex::Regex;
use std::net::IpAddr;
use std::sync::LazyLock;

/// Kind of authentication failure recognized in a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    FailedPassword,
    InvalidUser,
    FailedPublicKey,
}

/// One recognized authentication-failure event.
///
/// Ephemeral: produced here, consumed immediately by the aggregator.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub address: IpAddr,
    pub kind: EventKind,
    pub raw: String,
}

/// Ordered failure-pattern table. Evaluated top to bottom, first match wins.
///
/// The address capture accepts both IPv4 and IPv6 literals; the candidate is
/// validated through `IpAddr::from_str` afterwards, so a malformed literal
/// rejects the whole line.
static PATTERNS: LazyLock<Vec<(Regex, EventKind)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"Failed password .*from\s+([0-9A-Fa-f:.]+)").expect("regex"),
            EventKind::FailedPassword,
        ),
        (
            Regex::new(r"Invalid user .*from\s+([0-9A-Fa-f:.]+)").expect("regex"),
            EventKind::InvalidUser,
        ),
        (
            Regex::new(r"Failed publickey .*from\s+([0-9A-Fa-f:.]+)").expect("regex"),
            EventKind::FailedPublicKey,
        ),
    ]
});

/// Syslog timestamp header: "Mon DD HH:MM:SS"
static RE_SYSLOG_TS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z][a-z]{2})\s+(\d{1,2})\s+(\d{2}:\d{2}:\d{2})").expect("regex")
});

/// Parse one log line against the failure-pattern table.
///
/// `fallback` is used as the event timestamp when the line carries no
/// parseable syslog header (typically the source file's mtime, with the
/// wall clock as the caller's last resort).
pub fn parse_line(line: &str, fallback: DateTime<Utc>) -> Option<LogEvent> {
    // Quick reject before touching the regex table.
    if !line.contains("from") {
        return None;
    }

    for (pattern, kind) in PATTERNS.iter() {
        if let Some(caps) = pattern.captures(line) {
            let address: IpAddr = caps.get(1)?.as_str().parse().ok()?;
            let timestamp = parse_syslog_timestamp(line).unwrap_or(fallback);
            return Some(LogEvent {
                timestamp,
                address,
                kind: *kind,
                raw: line.trim_end().to_string(),
            });
        }
    }
    None
}

/// Best-effort parse of the leading syslog timestamp.
///
/// Syslog headers carry no year, so the current year is assumed; a result
/// more than a day in the future rolls back one year (a December log read
/// in January).
fn parse_syslog_timestamp(line: &str) -> Option<DateTime<Utc>> {
    let caps = RE_SYSLOG_TS.captures(line)?;
    let month = month_number(caps.get(1)?.as_str())?;
    let day: u32 = caps.get(2)?.as_str().parse().ok()?;
    let time = NaiveTime::parse_from_str(caps.get(3)?.as_str(), "%H:%M:%S").ok()?;

    let now = Utc::now();
    let candidate = NaiveDate::from_ymd_opt(now.year(), month, day)?.and_time(time);
    let candidate = Utc.from_utc_datetime(&candidate);

    if candidate > now + Duration::days(1) {
        let adjusted = NaiveDate::from_ymd_opt(now.year() - 1, month, day)?.and_time(time);
        Some(Utc.from_utc_datetime(&adjusted))
    } else {
        Some(candidate)
    }
}

fn month_number(abbrev: &str) -> Option<u32> {
    match abbrev {
        "Jan" => Some(1),
        "Feb" => Some(2),
        "Mar" => Some(3),
        "Apr" => Some(4),
        "May" => Some(5),
        "Jun" => Some(6),
        "Jul" => Some(7),
        "Aug" => Some(8),
        "Sep" => Some(9),
        "Oct" => Some(10),
        "Nov" => Some(11),
        "Dec" => Some(12),
        _ => None,
    }
}
