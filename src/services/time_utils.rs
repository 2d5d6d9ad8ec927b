use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Format a UTC instant as ISO-8601 with a literal `Z` suffix.
///
/// Fractional seconds are only emitted when non-zero.
pub fn to_utc_string(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn epoch_millis_to_utc(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// Midnight UTC of the day containing `at`.
pub fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(chrono::NaiveTime::MIN).and_utc()
}

pub fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

pub fn one_day() -> Duration {
    Duration::days(1)
}

/// Lenient UTC parser for timestamps coming from config files and upstream
/// metadata: RFC 3339, `YYYY-MM-DD HH:MM:SS` (assumed UTC) or a bare date.
pub fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(midnight_utc)
}

/// Document id of a coin's daily history record, e.g. `01-07-2021`.
pub fn coin_day_id(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}
