//! Resolution of human-friendly date tokens into absolute dates.
//!
//! Accepted forms, tried in order: `YYYY-MM-DD`, `YYYY-MM-DD HH:MM[:SS]`,
//! `YYYY-MM`, `YYYY`, a weekday name (`fri`), a weekday with a time
//! (`fri-18:00`, or `fri-` for 23:59), and a bare time of day (`18:00`).
//! Month and year tokens are range anchors: they only make sense as filters.

use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use thiserror::Error;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Time attached to `weekday-` when the time part is left empty.
const END_OF_DAY: (u32, u32) = (23, 59);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid date '{0}'")]
pub struct InvalidToken(pub String);

/// Which occurrence of a weekday a bare weekday token refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Next occurrence strictly after today (1..=7 days ahead). Used for due dates.
    Forward,
    /// Most recent occurrence, today included (0..=6 days back). Used for created filters.
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedDate {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Month { year: i32, month: u32 },
    Year(i32),
}

impl ResolvedDate {
    /// True for a concrete day or moment, false for a month/year anchor.
    pub fn is_point(&self) -> bool {
        matches!(self, Self::Date(_) | Self::DateTime(_))
    }

    /// The value as written to the store, or `None` for range anchors.
    pub fn point_value(&self) -> Option<String> {
        match self {
            Self::Date(d) => Some(d.format(DATE_FORMAT).to_string()),
            Self::DateTime(dt) => Some(format_timestamp(*dt)),
            Self::Month { .. } | Self::Year(_) => None,
        }
    }
}

impl fmt::Display for ResolvedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Self::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            Self::Month { year, month } => write!(f, "{year:04}-{month:02}"),
            Self::Year(year) => write!(f, "{year:04}"),
        }
    }
}

pub fn format_timestamp(dt: NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

/// Resolve `token` relative to `now`. Pure: the result depends only on the inputs.
pub fn resolve(token: &str, now: NaiveDateTime, direction: Direction) -> Result<ResolvedDate, InvalidToken> {
    let trimmed = token.trim();
    let invalid = || InvalidToken(token.to_string());

    if has_shape(trimmed, "dddd-dd-dd") {
        return NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
            .map(ResolvedDate::Date)
            .map_err(|_| invalid());
    }
    if has_shape(trimmed, "dddd-dd-dd dd:dd") {
        return NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M")
            .map(ResolvedDate::DateTime)
            .map_err(|_| invalid());
    }
    if has_shape(trimmed, "dddd-dd-dd dd:dd:dd") {
        // chrono reads second 60 as a leap second; SQLite's date functions do not.
        return NaiveDateTime::parse_from_str(trimmed, DATETIME_FORMAT)
            .ok()
            .filter(|dt| dt.nanosecond() < 1_000_000_000)
            .map(ResolvedDate::DateTime)
            .ok_or_else(invalid);
    }
    if has_shape(trimmed, "dddd-dd") {
        let year: i32 = trimmed[..4].parse().map_err(|_| invalid())?;
        let month: u32 = trimmed[5..].parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        return Ok(ResolvedDate::Month { year, month });
    }
    if has_shape(trimmed, "dddd") {
        return trimmed.parse().map(ResolvedDate::Year).map_err(|_| invalid());
    }

    let lower = trimmed.to_ascii_lowercase();
    let (day_part, time_part) = match lower.split_once('-') {
        Some((day, time)) => (day, Some(time)),
        None => (lower.as_str(), None),
    };

    if let Some(weekday) = parse_weekday(day_part) {
        let date = weekday_date(now.date(), weekday, direction);
        return match time_part {
            None => Ok(ResolvedDate::Date(date)),
            Some("") => {
                let (h, m) = END_OF_DAY;
                let time = NaiveTime::from_hms_opt(h, m, 0).ok_or_else(invalid)?;
                Ok(ResolvedDate::DateTime(date.and_time(time)))
            }
            Some(t) => {
                let time = parse_time(t).ok_or_else(invalid)?;
                Ok(ResolvedDate::DateTime(date.and_time(time)))
            }
        };
    }

    if time_part.is_none() {
        if let Some(time) = parse_time(day_part) {
            return Ok(ResolvedDate::DateTime(now.date().and_time(time)));
        }
    }

    Err(invalid())
}

fn parse_weekday(s: &str) -> Option<Weekday> {
    match s {
        "sun" => Some(Weekday::Sun),
        "mon" => Some(Weekday::Mon),
        "tue" => Some(Weekday::Tue),
        "wed" => Some(Weekday::Wed),
        "thu" => Some(Weekday::Thu),
        "fri" => Some(Weekday::Fri),
        "sat" => Some(Weekday::Sat),
        _ => None,
    }
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    if !has_shape(s, "dd:dd") {
        return None;
    }
    NaiveTime::parse_from_str(s, "%H:%M").ok()
}

fn weekday_date(today: NaiveDate, target: Weekday, direction: Direction) -> NaiveDate {
    let today_idx = i64::from(today.weekday().num_days_from_sunday());
    let target_idx = i64::from(target.num_days_from_sunday());
    match direction {
        Direction::Forward => {
            let ahead = (target_idx - today_idx).rem_euclid(7);
            today + Duration::days(if ahead == 0 { 7 } else { ahead })
        }
        Direction::Backward => today - Duration::days((today_idx - target_idx).rem_euclid(7)),
    }
}

/// Match `s` against a pattern where `d` stands for one ASCII digit and any
/// other character must appear literally.
fn has_shape(s: &str, pattern: &str) -> bool {
    s.len() == pattern.len()
        && s.bytes().zip(pattern.bytes()).all(|(c, p)| match p {
            b'd' => c.is_ascii_digit(),
            _ => c == p,
        })
}
