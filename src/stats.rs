//! Dashboard aggregates over a snapshot of appointment rows.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::calendar::CalendarDate;

/// The columns the dashboard needs from `scheduling`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StatRow {
    pub cpf: Option<String>,
    pub patient_name: String,
    pub doctor_name: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCount {
    pub day: CalendarDate,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthCount {
    pub month: String,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DoctorCount {
    pub name: String,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientCount {
    pub cpf: String,
    pub name: String,
    pub total: usize,
}

/// The `n` dates ending with `today`, oldest first. Stops early at the start
/// of the supported calendar.
pub fn last_days(today: CalendarDate, n: usize) -> Vec<CalendarDate> {
    let mut days: Vec<_> = (0..n as u64)
        .map_while(|back| today.checked_sub_days(back))
        .collect();
    days.reverse();
    days
}

pub fn daily_counts(days: &[CalendarDate], rows: &[StatRow]) -> Vec<DayCount> {
    days.iter()
        .map(|&day| DayCount {
            day,
            total: rows.iter().filter(|r| r.date == day.as_naive()).count(),
        })
        .collect()
}

/// Twelve entries labelled `MM/YYYY`.
pub fn monthly_counts(year: i32, rows: &[StatRow]) -> Vec<MonthCount> {
    let mut totals = [0usize; 12];
    for r in rows.iter().filter(|r| r.date.year() == year) {
        totals[r.date.month0() as usize] += 1;
    }
    totals
        .iter()
        .enumerate()
        .map(|(i, &total)| MonthCount {
            month: format!("{:02}/{year}", i + 1),
            total,
        })
        .collect()
}

/// Totals per doctor name in order of first appearance.
pub fn count_by_doctor(rows: &[StatRow]) -> Vec<DoctorCount> {
    let mut out: Vec<DoctorCount> = Vec::new();
    for r in rows {
        match out.iter_mut().find(|d| d.name == r.doctor_name) {
            Some(d) => d.total += 1,
            None => out.push(DoctorCount {
                name: r.doctor_name.clone(),
                total: 1,
            }),
        }
    }
    out
}

/// Patients with the most appointments, grouped by CPF. Ties keep the order
/// in which the patients first appear. Rows without a CPF are skipped.
pub fn top_patients(rows: &[StatRow], n: usize) -> Vec<PatientCount> {
    let mut out: Vec<PatientCount> = Vec::new();
    for r in rows {
        let Some(cpf) = r.cpf.as_deref().filter(|c| !c.is_empty()) else {
            continue;
        };
        match out.iter_mut().find(|p| p.cpf == cpf) {
            Some(p) => p.total += 1,
            None => out.push(PatientCount {
                cpf: cpf.to_string(),
                name: r.patient_name.clone(),
                total: 1,
            }),
        }
    }
    // sort_by is stable
    out.sort_by(|a, b| b.total.cmp(&a.total));
    out.truncate(n);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cpf: Option<&str>, patient: &str, doctor: &str, date: &str) -> StatRow {
        StatRow {
            cpf: cpf.map(str::to_string),
            patient_name: patient.to_string(),
            doctor_name: doctor.to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        }
    }

    fn date(s: &str) -> CalendarDate {
        CalendarDate::parse(s).unwrap()
    }

    #[test]
    fn test_last_days_crosses_month() {
        let days: Vec<_> = last_days(date("2024-03-02"), 4)
            .into_iter()
            .map(|d| d.to_string())
            .collect();
        assert_eq!(days, ["2024-02-28", "2024-02-29", "2024-03-01", "2024-03-02"]);
        assert!(last_days(date("2024-03-02"), 0).is_empty());
        assert_eq!(last_days(date("0001-01-02"), 7).len(), 2);
    }

    #[test]
    fn test_daily_counts() {
        let rows = [
            row(None, "Ana", "Dr. Silva", "2024-05-14"),
            row(None, "Bia", "Dr. Silva", "2024-05-14"),
            row(None, "Caio", "Dr. Lima", "2024-05-15"),
            row(None, "Davi", "Dr. Lima", "2024-04-15"),
        ];
        let counts = daily_counts(&last_days(date("2024-05-15"), 3), &rows);
        let totals: Vec<_> = counts.iter().map(|c| c.total).collect();
        assert_eq!(totals, [0, 2, 1]);
    }

    #[test]
    fn test_monthly_counts_labels_and_year_filter() {
        let rows = [
            row(None, "Ana", "Dr. Silva", "2024-01-10"),
            row(None, "Ana", "Dr. Silva", "2024-01-11"),
            row(None, "Ana", "Dr. Silva", "2024-12-01"),
            row(None, "Ana", "Dr. Silva", "2023-01-10"),
        ];
        let months = monthly_counts(2024, &rows);
        assert_eq!(months.len(), 12);
        assert_eq!(months[0], MonthCount { month: "01/2024".into(), total: 2 });
        assert_eq!(months[11], MonthCount { month: "12/2024".into(), total: 1 });
        assert_eq!(months.iter().map(|m| m.total).sum::<usize>(), 3);
    }

    #[test]
    fn test_count_by_doctor_keeps_first_appearance() {
        let rows = [
            row(None, "Ana", "Dr. Silva", "2024-05-14"),
            row(None, "Bia", "Dr. Lima", "2024-05-14"),
            row(None, "Caio", "Dr. Silva", "2024-05-15"),
        ];
        let by_doctor = count_by_doctor(&rows);
        assert_eq!(
            by_doctor,
            [
                DoctorCount { name: "Dr. Silva".into(), total: 2 },
                DoctorCount { name: "Dr. Lima".into(), total: 1 },
            ]
        );
    }

    #[test]
    fn test_top_patients() {
        let rows = [
            row(Some("111"), "Ana", "Dr. Silva", "2024-05-14"),
            row(Some("222"), "Bia", "Dr. Silva", "2024-05-14"),
            row(Some("333"), "Caio", "Dr. Silva", "2024-05-14"),
            row(Some("222"), "Bia Souza", "Dr. Lima", "2024-05-15"),
            row(None, "Walk-in", "Dr. Lima", "2024-05-15"),
            row(Some("333"), "Caio", "Dr. Lima", "2024-05-16"),
        ];
        let top = top_patients(&rows, 2);
        assert_eq!(top.len(), 2);
        assert_eq!((top[0].cpf.as_str(), top[0].name.as_str(), top[0].total), ("222", "Bia", 2));
        assert_eq!((top[1].cpf.as_str(), top[1].total), ("333", 2));
        assert_eq!(top_patients(&rows, 5).len(), 3);
    }
}
