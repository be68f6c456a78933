use std::collections::BTreeSet;

use serde::ser::{Serialize, Serializer};

use super::{CalendarDate, HourLabel, WeekWindow};

/// Key fields an appointment record exposes to the agenda grid. A record
/// whose date or hour cannot be read returns `None` and is left out of every
/// grid.
pub trait Scheduled {
    fn slot_date(&self) -> Option<CalendarDate>;
    fn slot_hour(&self) -> Option<HourLabel>;
}

impl<T: Scheduled + ?Sized> Scheduled for &T {
    fn slot_date(&self) -> Option<CalendarDate> {
        (**self).slot_date()
    }

    fn slot_hour(&self) -> Option<HourLabel> {
        (**self).slot_hour()
    }
}

/// One cell of the grid, borrowed from a [`SlotGrid`].
#[derive(Debug, serde::Serialize)]
pub struct AppointmentSlot<'a, R> {
    pub date: CalendarDate,
    pub hour: HourLabel,
    pub appointments: &'a [R],
}

/// Records bucketed by `(date, hour)` over a week window and an hour list.
/// Every pair of the cross product has a bucket, possibly empty.
#[derive(Debug, Clone)]
pub struct SlotGrid<R> {
    window: WeekWindow,
    hours: Vec<HourLabel>,
    // Day-major: the bucket of (day i, hour j) is cells[i * hours.len() + j].
    cells: Vec<Vec<R>>,
}

impl<R> SlotGrid<R> {
    #[cfg(test)]
    pub fn get(&self, date: CalendarDate, hour: HourLabel) -> Option<&[R]> {
        let i = self.index(date, hour)?;
        self.cells.get(i).map(Vec::as_slice)
    }

    pub fn slots(&self) -> impl Iterator<Item = AppointmentSlot<'_, R>> + '_ {
        self.window.iter().enumerate().flat_map(move |(i, date)| {
            self.hours.iter().enumerate().map(move |(j, &hour)| AppointmentSlot {
                date,
                hour,
                appointments: &self.cells[i * self.hours.len() + j],
            })
        })
    }

    /// Number of records that landed in some bucket.
    pub fn placed(&self) -> usize {
        self.cells.iter().map(Vec::len).sum()
    }

    fn index(&self, date: CalendarDate, hour: HourLabel) -> Option<usize> {
        let i = self.window.position(date)?;
        let j = self.hours.iter().position(|h| *h == hour)?;
        Some(i * self.hours.len() + j)
    }
}

impl<R: Serialize> Serialize for SlotGrid<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.slots())
    }
}

/// Groups `records` into the `window × hours` grid, keeping their relative
/// order inside each bucket. Records dated outside the window, or whose hour
/// is not one of `hours`, are dropped without notice.
pub fn build_slot_grid<R, I>(window: &WeekWindow, hours: &[HourLabel], records: I) -> SlotGrid<R>
where
    R: Scheduled,
    I: IntoIterator<Item = R>,
{
    let mut grid = SlotGrid {
        window: *window,
        hours: hours.to_vec(),
        cells: std::iter::repeat_with(Vec::new)
            .take(window.days().len() * hours.len())
            .collect(),
    };
    for record in records {
        let Some((date, hour)) = record.slot_date().zip(record.slot_hour()) else {
            continue;
        };
        if let Some(i) = grid.index(date, hour) {
            grid.cells[i].push(record);
        }
    }
    grid
}

/// Distinct dates carrying at least one record.
pub fn marked_dates<I>(records: I) -> BTreeSet<CalendarDate>
where
    I: IntoIterator,
    I::Item: Scheduled,
{
    records.into_iter().filter_map(|r| r.slot_date()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{WeekStart, compute_week, hour_range};
    use chrono::NaiveTime;

    #[derive(Debug, Clone, PartialEq, serde::Serialize)]
    struct Rec {
        id: String,
        date: String,
        hour: String,
    }

    impl Scheduled for Rec {
        fn slot_date(&self) -> Option<CalendarDate> {
            CalendarDate::parse(&self.date).ok()
        }

        fn slot_hour(&self) -> Option<HourLabel> {
            NaiveTime::parse_from_str(&self.hour, "%H:%M:%S")
                .ok()
                .and_then(HourLabel::from_time)
        }
    }

    fn rec(id: &str, date: &str, hour: &str) -> Rec {
        Rec {
            id: id.to_string(),
            date: date.to_string(),
            hour: hour.to_string(),
        }
    }

    fn date(s: &str) -> CalendarDate {
        CalendarDate::parse(s).unwrap()
    }

    fn hour(s: &str) -> HourLabel {
        HourLabel::parse(s).unwrap()
    }

    fn may_week() -> WeekWindow {
        compute_week(date("2024-05-15"), WeekStart::Monday)
    }

    #[test]
    fn test_single_record_lands_in_its_bucket() {
        let hours = [hour("08:00"), hour("09:00")];
        let records = vec![rec("a", "2024-05-13", "08:00:00")];
        let grid = build_slot_grid(&may_week(), &hours, records);

        assert_eq!(grid.slots().count(), 14);
        assert_eq!(
            grid.get(date("2024-05-13"), hour("08:00")).map(|b| b.len()),
            Some(1)
        );
        assert_eq!(grid.get(date("2024-05-13"), hour("08:00")).unwrap()[0].id, "a");
        let empty = grid.slots().filter(|s| s.appointments.is_empty()).count();
        assert_eq!(empty, 13);
    }

    #[test]
    fn test_bucket_keeps_input_order() {
        let records = vec![
            rec("z", "2024-05-14", "10:00:00"),
            rec("x", "2024-05-15", "10:00:00"),
            rec("y", "2024-05-14", "10:00:00"),
            rec("a", "2024-05-14", "10:00:00"),
        ];
        let grid = build_slot_grid(&may_week(), &hour_range(8, 19), records.iter());
        let ids: Vec<_> = grid
            .get(date("2024-05-14"), hour("10:00"))
            .unwrap()
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, ["z", "y", "a"]);
    }

    #[test]
    fn test_unmatched_records_are_dropped() {
        let records = vec![
            rec("outside-window", "2024-05-20", "08:00:00"),
            rec("outside-hours", "2024-05-13", "20:00:00"),
            rec("half-past", "2024-05-13", "08:30:00"),
            rec("garbage-hour", "2024-05-13", "eight"),
            rec("garbage-date", "13/05/2024", "08:00:00"),
            rec("kept", "2024-05-19", "09:00:00"),
        ];
        let grid = build_slot_grid(&may_week(), &[hour("08:00"), hour("09:00")], records);
        assert_eq!(grid.placed(), 1);
        assert_eq!(grid.get(date("2024-05-19"), hour("09:00")).unwrap()[0].id, "kept");
        assert_eq!(grid.get(date("2024-05-20"), hour("08:00")), None);
    }

    #[test]
    fn test_every_matching_record_is_kept() {
        let window = may_week();
        let hours = hour_range(0, 23);
        let mut records = Vec::new();
        for d in window.iter() {
            for h in &hours {
                records.push(rec("r", &d.to_string(), &format!("{h}:00")));
            }
        }
        let grid = build_slot_grid(&window, &hours, records.iter());
        assert_eq!(grid.placed(), 7 * 24);
        assert!(grid.slots().all(|s| s.appointments.len() == 1));
    }

    #[test]
    fn test_empty_hours_gives_empty_grid() {
        let grid = build_slot_grid(&may_week(), &[], vec![rec("a", "2024-05-13", "08:00:00")]);
        assert_eq!(grid.slots().count(), 0);
        assert_eq!(grid.placed(), 0);
    }

    #[test]
    fn test_slots_walk_days_then_hours() {
        let hours = [hour("09:00"), hour("08:00")];
        let grid = build_slot_grid::<Rec, _>(&may_week(), &hours, Vec::new());
        let first: Vec<_> = grid
            .slots()
            .take(3)
            .map(|s| format!("{} {}", s.date, s.hour))
            .collect();
        assert_eq!(
            first,
            ["2024-05-13 09:00", "2024-05-13 08:00", "2024-05-14 09:00"]
        );
    }

    #[test]
    fn test_grid_serializes_as_slot_list() {
        let grid = build_slot_grid(
            &may_week(),
            &[hour("08:00")],
            vec![rec("a", "2024-05-13", "08:00:00")],
        );
        let json = serde_json::to_value(&grid).unwrap();
        assert_eq!(json.as_array().map(Vec::len), Some(7));
        assert_eq!(json[0]["date"], "2024-05-13");
        assert_eq!(json[0]["hour"], "08:00");
        assert_eq!(json[0]["appointments"][0]["id"], "a");
        assert_eq!(json[1]["appointments"].as_array().map(Vec::len), Some(0));
    }

    #[test]
    fn test_marked_dates_dedupes() {
        let records = [
            rec("1", "2024-05-01", "08:00:00"),
            rec("2", "2024-05-01", "09:00:00"),
            rec("3", "2024-05-02", "08:00:00"),
        ];
        let marked = marked_dates(&records);
        assert_eq!(
            marked.into_iter().map(|d| d.to_string()).collect::<Vec<_>>(),
            ["2024-05-01", "2024-05-02"]
        );
    }

    #[test]
    fn test_marked_dates_skips_unreadable_dates() {
        let records = [rec("1", "yesterday", "08:00:00")];
        assert!(marked_dates(&records).is_empty());
    }
}
