//! Time-of-day helpers shared by the scheduling cells.
//!
//! Times of day are `chrono::NaiveTime` values exchanged as zero-padded
//! `HH:MM` strings. Arithmetic never rolls over midnight: an interval that
//! would end on the next calendar day is rejected with
//! [`TimeError::CrossesMidnight`].

use std::sync::OnceLock;

use chrono::{Duration, NaiveTime, Timelike, Weekday};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    #[error("Invalid time '{0}': expected HH:MM between 00:00 and 23:59")]
    InvalidFormat(String),

    #[error("Minute offset {0} is outside a single day")]
    OutOfRange(u32),

    #[error("Interval starting at {start} lasting {minutes} minutes would cross midnight")]
    CrossesMidnight { start: String, minutes: u32 },

    #[error("Duration must be greater than zero")]
    ZeroDuration,
}

fn hhmm_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([01][0-9]|2[0-3]):([0-5][0-9])$").expect("static HH:MM pattern is valid")
    })
}

/// Parse a strict `HH:MM` string.
pub fn parse_time(value: &str) -> Result<NaiveTime, TimeError> {
    let caps = hhmm_pattern()
        .captures(value)
        .ok_or_else(|| TimeError::InvalidFormat(value.to_string()))?;

    let hours: u32 = caps[1].parse().map_err(|_| TimeError::InvalidFormat(value.to_string()))?;
    let minutes: u32 = caps[2].parse().map_err(|_| TimeError::InvalidFormat(value.to_string()))?;

    NaiveTime::from_hms_opt(hours, minutes, 0).ok_or_else(|| TimeError::InvalidFormat(value.to_string()))
}

pub fn format_time(time: NaiveTime) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}

pub fn time_to_minutes(value: &str) -> Result<u32, TimeError> {
    parse_time(value).map(minutes_of)
}

pub fn minutes_to_time(minutes: u32) -> Result<String, TimeError> {
    from_minutes(minutes).map(format_time)
}

/// Minutes since midnight, ignoring seconds.
pub fn minutes_of(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

pub fn from_minutes(minutes: u32) -> Result<NaiveTime, TimeError> {
    if minutes >= MINUTES_PER_DAY {
        return Err(TimeError::OutOfRange(minutes));
    }
    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0).ok_or(TimeError::OutOfRange(minutes))
}

/// End of an interval of `minutes` starting at `start`, on the same day.
pub fn add_minutes(start: NaiveTime, minutes: u32) -> Result<NaiveTime, TimeError> {
    if minutes == 0 {
        return Err(TimeError::ZeroDuration);
    }

    let (end, overflow_secs) = start.overflowing_add_signed(Duration::minutes(minutes as i64));
    if overflow_secs != 0 || end <= start {
        return Err(TimeError::CrossesMidnight {
            start: format_time(start),
            minutes,
        });
    }

    Ok(end)
}

/// Half-open time-of-day interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn starting_at(start: NaiveTime, minutes: u32) -> Result<Self, TimeError> {
        Ok(Self {
            start,
            end: add_minutes(start, minutes)?,
        })
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        overlaps(self.start, self.end, other.start, other.end)
    }

    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn duration_minutes(&self) -> u32 {
        minutes_of(self.end).saturating_sub(minutes_of(self.start))
    }
}

/// `[a_start, a_end)` and `[b_start, b_end)` intersect. Touching ends do not.
pub fn overlaps<T: PartialOrd>(a_start: T, a_end: T, b_start: T, b_end: T) -> bool {
    a_start < b_end && b_start < a_end
}

/// Lower-case English weekday name. Fixed mapping, independent of locale.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Serde adapter for `NaiveTime` as `HH:MM`.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_time(*time))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_time(&raw).map_err(de::Error::custom)
    }

    /// PostgREST returns `time` columns as `HH:MM:SS`; accept both.
    pub mod lenient {
        use chrono::NaiveTime;
        use serde::{de, Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            super::serialize(time, serializer)
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw = String::deserialize(deserializer)?;
            let trimmed = match raw.len() {
                8 if raw.ends_with(":00") => &raw[..5],
                _ => raw.as_str(),
            };
            crate::time::parse_time(trimmed).map_err(de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn t(s: &str) -> NaiveTime {
        parse_time(s).unwrap()
    }

    #[test]
    fn converts_between_strings_and_minutes() {
        assert_eq!(time_to_minutes("00:00"), Ok(0));
        assert_eq!(time_to_minutes("09:30"), Ok(570));
        assert_eq!(time_to_minutes("23:59"), Ok(1439));
        assert_eq!(minutes_to_time(570).as_deref(), Ok("09:30"));
        assert_eq!(minutes_to_time(5).as_deref(), Ok("00:05"));
    }

    #[test]
    fn rejects_malformed_times() {
        for bad in ["9:00", "24:00", "12:60", "12-30", "", "12:3", "ab:cd", "12:30:00"] {
            assert_matches!(parse_time(bad), Err(TimeError::InvalidFormat(_)), "{}", bad);
        }
        assert_matches!(minutes_to_time(1440), Err(TimeError::OutOfRange(1440)));
    }

    #[test]
    fn add_minutes_stays_within_the_day() {
        assert_eq!(add_minutes(t("09:00"), 30), Ok(t("09:30")));
        assert_eq!(add_minutes(t("23:00"), 59), Ok(t("23:59")));
    }

    #[test]
    fn add_minutes_rejects_midnight_crossing() {
        assert_matches!(
            add_minutes(t("23:50"), 30),
            Err(TimeError::CrossesMidnight { minutes: 30, .. })
        );
        // Landing exactly on midnight is the next day as well.
        assert_matches!(add_minutes(t("23:30"), 30), Err(TimeError::CrossesMidnight { .. }));
        assert_matches!(add_minutes(t("10:00"), 0), Err(TimeError::ZeroDuration));
    }

    #[test]
    fn overlap_uses_half_open_intervals() {
        let a = TimeRange::new(t("09:00"), t("09:30"));
        let b = TimeRange::new(t("09:30"), t("10:00"));
        let c = TimeRange::new(t("09:15"), t("09:45"));
        let inner = TimeRange::new(t("09:05"), t("09:10"));

        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
        assert!(a.overlaps(&inner));
        assert!(inner.overlaps(&a));
        assert!(a.overlaps(&a));
    }

    #[test]
    fn overlap_matches_reference_formula_on_a_grid() {
        for a in 0..6u32 {
            for b in a + 1..7 {
                for c in 0..6u32 {
                    for d in c + 1..7 {
                        assert_eq!(overlaps(a, b, c, d), a < d && c < b);
                    }
                }
            }
        }
    }

    #[test]
    fn weekday_names_are_fixed() {
        assert_eq!(weekday_name(Weekday::Mon), "monday");
        assert_eq!(weekday_name(Weekday::Sun), "sunday");
    }

    #[test]
    fn time_range_serializes_as_hhmm() {
        let range = TimeRange::new(t("09:00"), t("09:30"));
        let json = serde_json::to_value(range).unwrap();
        assert_eq!(json, serde_json::json!({ "start": "09:00", "end": "09:30" }));

        let parsed: TimeRange = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, range);
        assert_eq!(parsed.duration_minutes(), 30);
    }

    #[test]
    fn lenient_adapter_accepts_postgres_time() {
        #[derive(Deserialize)]
        struct Row {
            #[serde(with = "hhmm::lenient")]
            start: NaiveTime,
        }
        let row: Row = serde_json::from_str(r#"{ "start": "14:15:00" }"#).unwrap();
        assert_eq!(row.start, t("14:15"));
    }
}
