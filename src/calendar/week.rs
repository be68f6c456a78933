use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{CalendarDate, ParseError};

pub const DAYS_IN_WEEK: usize = 7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    #[default]
    Sunday,
    Monday,
}

impl WeekStart {
    // Number of days between the first day of the week and a day whose
    // Sunday-based weekday index is `weekday_index`.
    fn offset(self, weekday_index: u32) -> u32 {
        match self {
            WeekStart::Sunday => weekday_index,
            WeekStart::Monday => (weekday_index + 6) % 7,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WeekStart::Sunday => "sunday",
            WeekStart::Monday => "monday",
        }
    }
}

impl FromStr for WeekStart {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, ParseError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sunday" => Ok(WeekStart::Sunday),
            "monday" => Ok(WeekStart::Monday),
            _ => Err(ParseError::MalformedWeekStart(s.to_string())),
        }
    }
}

/// Week start from an optional query value. Absent or blank means
/// `default`.
pub fn resolve_week_start(
    param: Option<&str>,
    default: WeekStart,
) -> Result<WeekStart, ParseError> {
    match param.map(str::trim) {
        None | Some("") => Ok(default),
        Some(s) => s.parse(),
    }
}

impl fmt::Display for WeekStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Seven consecutive days, serialized as a plain array of dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct WeekWindow([CalendarDate; DAYS_IN_WEEK]);

impl WeekWindow {
    fn starting_at(first: CalendarDate) -> Self {
        WeekWindow(std::array::from_fn(|i| first.add_days(i as u64)))
    }

    pub fn days(&self) -> &[CalendarDate; DAYS_IN_WEEK] {
        &self.0
    }

    pub fn first(&self) -> CalendarDate {
        self.0[0]
    }

    pub fn last(&self) -> CalendarDate {
        self.0[DAYS_IN_WEEK - 1]
    }

    pub fn position(&self, date: CalendarDate) -> Option<usize> {
        self.0.iter().position(|d| *d == date)
    }

    pub fn iter(&self) -> impl Iterator<Item = CalendarDate> + '_ {
        self.0.iter().copied()
    }

    /// The window seven days earlier, or `None` at the start of the
    /// supported calendar.
    pub fn previous(&self) -> Option<WeekWindow> {
        self.first()
            .checked_sub_days(DAYS_IN_WEEK as u64)
            .map(WeekWindow::starting_at)
    }

    /// The window seven days later, or `None` at the end of the supported
    /// calendar.
    pub fn next(&self) -> Option<WeekWindow> {
        self.first()
            .checked_add_days(DAYS_IN_WEEK as u64)
            .map(WeekWindow::starting_at)
    }
}

/// Returns the week containing `reference`, which can be any day of the week.
/// Under `Monday`, a Sunday belongs to the week that started the previous
/// Monday.
pub fn compute_week(reference: CalendarDate, week_start: WeekStart) -> WeekWindow {
    let back = week_start.offset(reference.weekday_index());
    WeekWindow::starting_at(reference.sub_days(u64::from(back)))
}
