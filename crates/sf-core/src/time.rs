//! Lightweight UTC date/time utilities (no chrono dependency).
//!
//! Uses Howard Hinnant's civil_from_days / days_from_civil algorithms for
//! Unix-to-date conversion in both directions. Timestamps are whole Unix
//! seconds; sub-second precision on restored strings is dropped.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{CoreError, Result};

/// Current UTC time as Unix seconds.
pub fn now_unix_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Current UTC timestamp in ISO-8601 format.
pub fn now_iso8601() -> String {
    unix_to_iso8601(now_unix_secs())
}

/// Convert Unix seconds to ISO-8601 UTC string.
pub fn unix_to_iso8601(secs: i64) -> String {
    let days = secs.div_euclid(86400);
    let time_of_day = secs.rem_euclid(86400);
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let (y, m, d) = civil_from_days(days);
    format!("{y:04}-{m:02}-{d:02}T{hours:02}:{minutes:02}:{seconds:02}Z")
}

/// Parse an ISO-8601 timestamp back to Unix seconds.
///
/// Accepts `T` or a space as separator, optional fractional seconds, and a
/// `Z`, `±HH:MM` or missing offset (missing means UTC).
pub fn iso8601_to_unix(s: &str) -> Result<i64> {
    let bad = || CoreError::Parse(format!("invalid ISO-8601 timestamp: {s:?}"));
    let s = s.trim();
    if s.len() < 19 || !s.is_char_boundary(10) {
        return Err(bad());
    }
    let (date, rest) = s.split_at(10);
    let rest = rest.strip_prefix(['T', ' ']).ok_or_else(bad)?;

    let mut date_parts = date.splitn(3, '-');
    let year: i64 = parse_field(date_parts.next()).ok_or_else(bad)?;
    let month: u32 = parse_field(date_parts.next()).ok_or_else(bad)?;
    let day: u32 = parse_field(date_parts.next()).ok_or_else(bad)?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(bad());
    }

    let (clock, offset_secs) = split_offset(rest).ok_or_else(bad)?;
    let clock = clock.split('.').next().unwrap_or(clock);
    let mut clock_parts = clock.splitn(3, ':');
    let hours: i64 = parse_field(clock_parts.next()).ok_or_else(bad)?;
    let minutes: i64 = parse_field(clock_parts.next()).ok_or_else(bad)?;
    let seconds: i64 = parse_field(clock_parts.next()).ok_or_else(bad)?;
    if hours > 23 || minutes > 59 || seconds > 60 {
        return Err(bad());
    }

    let days = days_from_civil(year, month, day);
    Ok(days * 86400 + hours * 3600 + minutes * 60 + seconds - offset_secs)
}

fn parse_field<T: std::str::FromStr>(field: Option<&str>) -> Option<T> {
    let field = field?;
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// Split `HH:MM:SS[.frac][Z|±HH:MM]` into the clock part and offset seconds.
fn split_offset(rest: &str) -> Option<(&str, i64)> {
    if let Some(clock) = rest.strip_suffix('Z') {
        return Some((clock, 0));
    }
    match rest.rfind(['+', '-']) {
        Some(pos) => {
            let (clock, offset) = rest.split_at(pos);
            let sign = if offset.starts_with('-') { -1 } else { 1 };
            let mut parts = offset[1..].splitn(2, ':');
            let h: i64 = parse_field(parts.next())?;
            let m: i64 = parse_field(parts.next())?;
            Some((clock, sign * (h * 3600 + m * 60)))
        }
        None => Some((rest, 0)),
    }
}

/// Howard Hinnant's civil_from_days: Unix epoch days → (year, month, day).
fn civil_from_days(days: i64) -> (i64, u64, u64) {
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

/// Inverse of `civil_from_days`: (year, month, day) → Unix epoch days.
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let m = month as i64;
    let mp = if m > 2 { m - 3 } else { m + 9 };
    let doy = (153 * mp + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe - 719468
}

/// Serde adapter storing Unix seconds as an ISO-8601 string.
pub mod iso8601 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(secs: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::unix_to_iso8601(*secs))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::iso8601_to_unix(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_epoch() {
        assert_eq!(unix_to_iso8601(0), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn test_known_date() {
        // 2026-02-21T00:00:00Z = 1771632000
        assert_eq!(unix_to_iso8601(1771632000), "2026-02-21T00:00:00Z");
    }

    #[test]
    fn test_parse_known_date() {
        assert_eq!(iso8601_to_unix("2026-02-21T00:00:00Z").unwrap(), 1771632000);
    }

    #[test]
    fn test_parse_fraction_and_offset() {
        let secs = iso8601_to_unix("2026-02-21T01:30:00.123456+01:30").unwrap();
        assert_eq!(secs, 1771632000);
    }

    #[test]
    fn test_parse_without_offset_is_utc() {
        assert_eq!(iso8601_to_unix("1970-01-01 00:01:05").unwrap(), 65);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(iso8601_to_unix("yesterday").is_err());
        assert!(iso8601_to_unix("2026-13-01T00:00:00Z").is_err());
        assert!(iso8601_to_unix("2026-01-01T25:00:00Z").is_err());
    }

    #[test]
    fn test_days_inverse() {
        for days in [-800_000, -1, 0, 59, 60, 11_016, 20_505, 400_000] {
            let (y, m, d) = civil_from_days(days);
            assert_eq!(days_from_civil(y, m as u32, d as u32), days);
        }
    }

    #[test]
    fn test_now_is_recent() {
        let ts = now_iso8601();
        assert!(ts.starts_with("20"), "timestamp should be in 2000s: {ts}");
    }
}
