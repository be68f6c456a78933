use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::{Datelike, Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Years a caller may ask for. Any week or month window derived from one of
// them stays inside `RENDERED_YEARS`.
const INPUT_YEARS: RangeInclusive<i32> = 1..=9998;
// Every year a window can contain. Serialized dates read back within it.
const RENDERED_YEARS: RangeInclusive<i32> = 0..=9999;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("date must be YYYY-MM-DD, got {0:?}")]
    MalformedDate(String),
    #[error("year {0} is out of range")]
    YearOutOfRange(i32),
    #[error("hour must be HH:00 between 00:00 and 23:00, got {0:?}")]
    MalformedHour(String),
    #[error("month must be between 1 and 12, got {0}")]
    MalformedMonth(u32),
    #[error("week_start must be sunday or monday, got {0:?}")]
    MalformedWeekStart(String),
}

/// A calendar day, always rendered as zero-padded `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CalendarDate(NaiveDate);

impl CalendarDate {
    /// Parses a date supplied by a caller. Years 0001 to 9998 only.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        parse_in(s, INPUT_YEARS)
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self, ParseError> {
        let date = NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| ParseError::MalformedDate(format!("{year:04}-{month:02}-{day:02}")))?;
        Self::try_from(date)
    }

    /// The server's local calendar date.
    pub fn today() -> Self {
        CalendarDate(Local::now().date_naive())
    }

    pub fn as_naive(self) -> NaiveDate {
        self.0
    }

    pub fn year(self) -> i32 {
        self.0.year()
    }

    pub fn month(self) -> u32 {
        self.0.month()
    }

    pub fn day(self) -> u32 {
        self.0.day()
    }

    /// 0 = Sunday ... 6 = Saturday.
    pub fn weekday_index(self) -> u32 {
        self.0.weekday().num_days_from_sunday()
    }

    pub fn checked_add_days(self, n: u64) -> Option<Self> {
        self.0
            .checked_add_days(Days::new(n))
            .and_then(|d| Self::try_from(d).ok())
    }

    pub fn checked_sub_days(self, n: u64) -> Option<Self> {
        self.0
            .checked_sub_days(Days::new(n))
            .and_then(|d| Self::try_from(d).ok())
    }

    // Only called with offsets of at most a few weeks from an accepted date,
    // which keeps the result inside chrono's range.
    pub(super) fn add_days(self, n: u64) -> Self {
        CalendarDate(self.0 + Days::new(n))
    }

    pub(super) fn sub_days(self, n: u64) -> Self {
        CalendarDate(self.0 - Days::new(n))
    }

    pub(super) fn from_naive(date: NaiveDate) -> Self {
        CalendarDate(date)
    }
}

fn parse_in(s: &str, years: RangeInclusive<i32>) -> Result<CalendarDate, ParseError> {
    let s = s.trim();
    // chrono accepts unpadded fields for %m and %d; the wire form does not.
    if !has_iso_shape(s) {
        return Err(ParseError::MalformedDate(s.to_string()));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| ParseError::MalformedDate(s.to_string()))?;
    in_years(date, years)
}

fn in_years(date: NaiveDate, years: RangeInclusive<i32>) -> Result<CalendarDate, ParseError> {
    if years.contains(&date.year()) {
        Ok(CalendarDate(date))
    } else {
        Err(ParseError::YearOutOfRange(date.year()))
    }
}

fn has_iso_shape(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 10
        && b.iter().enumerate().all(|(i, c)| match i {
            4 | 7 => *c == b'-',
            _ => c.is_ascii_digit(),
        })
}

impl TryFrom<NaiveDate> for CalendarDate {
    type Error = ParseError;

    fn try_from(date: NaiveDate) -> Result<Self, ParseError> {
        in_years(date, INPUT_YEARS)
    }
}

// Deserialization accepts what serialization can emit.
impl TryFrom<String> for CalendarDate {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, ParseError> {
        parse_in(&s, RENDERED_YEARS)
    }
}

impl From<CalendarDate> for String {
    fn from(date: CalendarDate) -> String {
        date.to_string()
    }
}

impl FromStr for CalendarDate {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, ParseError> {
        CalendarDate::parse(s)
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}
