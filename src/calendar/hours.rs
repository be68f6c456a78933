use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use super::ParseError;

const HOURS_IN_DAY: u8 = 24;

/// An on-the-hour grid row label such as `08:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HourLabel(u8);

impl HourLabel {
    pub fn new(hour: u8) -> Option<Self> {
        (hour < HOURS_IN_DAY).then_some(HourLabel(hour))
    }

    pub fn hour(self) -> u8 {
        self.0
    }

    /// Strict `HH:00`.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let malformed = || ParseError::MalformedHour(s.to_string());
        let b = s.as_bytes();
        if b.len() != 5 || b[2] != b':' || &b[3..] != b"00" {
            return Err(malformed());
        }
        if !b[0].is_ascii_digit() || !b[1].is_ascii_digit() {
            return Err(malformed());
        }
        HourLabel::new((b[0] - b'0') * 10 + (b[1] - b'0')).ok_or_else(malformed)
    }

    /// Grid row of a stored `time` column. Seconds are ignored and minutes
    /// must be zero, so `08:00:59` is row `08:00` and `08:30:00` is none.
    pub fn from_time(time: NaiveTime) -> Option<Self> {
        if time.minute() != 0 {
            return None;
        }
        u8::try_from(time.hour()).ok().and_then(HourLabel::new)
    }

    pub fn to_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(u32::from(self.0), 0, 0).unwrap_or_default()
    }
}

impl fmt::Display for HourLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:00", self.0)
    }
}

impl FromStr for HourLabel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, ParseError> {
        HourLabel::parse(s)
    }
}

impl TryFrom<String> for HourLabel {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, ParseError> {
        HourLabel::parse(&s)
    }
}

impl From<HourLabel> for String {
    fn from(h: HourLabel) -> String {
        h.to_string()
    }
}

/// Labels from `first` to `last` inclusive. Hours past 23 are dropped.
pub fn hour_range(first: u8, last: u8) -> Vec<HourLabel> {
    (first..=last).filter_map(HourLabel::new).collect()
}

/// Parses a comma separated list such as `08:00,09:00`, keeping the given
/// order.
pub fn parse_hour_list(s: &str) -> Result<Vec<HourLabel>, ParseError> {
    let hours = s
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(HourLabel::parse)
        .collect::<Result<Vec<_>, _>>()?;
    if hours.is_empty() {
        return Err(ParseError::MalformedHour(s.to_string()));
    }
    Ok(hours)
}
