//! Week, slot and month arithmetic shared by every agenda view.
//!
//! Everything here is pure: callers fetch records, hand a snapshot in, and
//! get back windows and grids. No function in this module fails on a value
//! that made it through [`CalendarDate::parse`].

mod date;
mod hours;
mod month;
mod slots;
mod week;

pub use self::date::{CalendarDate, ParseError};
pub use self::hours::{HourLabel, hour_range, parse_hour_list};
pub use self::month::{MonthGrid, month_days};
pub use self::slots::{Scheduled, SlotGrid, build_slot_grid, marked_dates};
pub use self::week::{WeekStart, WeekWindow, compute_week, resolve_week_start};
