use std::collections::BTreeSet;
use std::iter::successors;

use chrono::Datelike;
use serde::Serialize;

use super::{CalendarDate, ParseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthDay {
    pub date: CalendarDate,
    pub day: u32,
    pub marked: bool,
}

/// Mini-calendar of one month. The first row starts on Sunday, so the grid
/// opens with `leading_blanks` empty cells before the 1st.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub leading_blanks: u32,
    pub days: Vec<MonthDay>,
}

impl MonthGrid {
    pub fn new(year: i32, month: u32, marked: &BTreeSet<CalendarDate>) -> Result<Self, ParseError> {
        let days = month_days(year, month)?;
        let leading_blanks = days.first().map_or(0, |d| d.weekday_index());
        Ok(MonthGrid {
            year,
            month,
            leading_blanks,
            days: days
                .into_iter()
                .map(|date| MonthDay {
                    date,
                    day: date.day(),
                    marked: marked.contains(&date),
                })
                .collect(),
        })
    }

    pub fn previous(&self) -> (i32, u32) {
        shift_month(self.year, self.month, -1)
    }

    pub fn next(&self) -> (i32, u32) {
        shift_month(self.year, self.month, 1)
    }
}

/// All dates of a month, in order.
pub fn month_days(year: i32, month: u32) -> Result<Vec<CalendarDate>, ParseError> {
    if !(1..=12).contains(&month) {
        return Err(ParseError::MalformedMonth(month));
    }
    let first = CalendarDate::from_ymd(year, month, 1)?;
    Ok(successors(Some(first.as_naive()), |d| d.succ_opt())
        .take_while(|d| d.month() == month)
        .map(CalendarDate::from_naive)
        .collect())
}

fn shift_month(year: i32, month: u32, delta: i32) -> (i32, u32) {
    // Months counted from year 0 so that division handles the wrap.
    let index = year * 12 + (month as i32 - 1) + delta;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}
