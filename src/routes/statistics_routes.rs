use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    calendar::{CalendarDate, WeekWindow, compute_week},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, Role},
    routes::scheduling_routes::record_scope,
    stats::{
        DayCount, DoctorCount, MonthCount, PatientCount, StatRow, count_by_doctor, daily_counts,
        last_days, monthly_counts, top_patients,
    },
};

const TOP_PATIENTS: usize = 5;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(statistics))
}

#[derive(Debug, Deserialize)]
pub struct StatisticsQuery {
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct StatisticsData {
    pub today: CalendarDate,
    pub last_7_days: Vec<DayCount>,
    pub current_week: Vec<DayCount>,
    pub by_month: Vec<MonthCount>,
    pub by_doctor: Vec<DoctorCount>,
    pub top_patients: Vec<PatientCount>,
}

fn summarize(today: CalendarDate, week: &WeekWindow, rows: &[StatRow]) -> StatisticsData {
    StatisticsData {
        today,
        last_7_days: daily_counts(&last_days(today, 7), rows),
        current_week: daily_counts(week.days(), rows),
        by_month: monthly_counts(today.year(), rows),
        by_doctor: count_by_doctor(rows),
        top_patients: top_patients(rows, TOP_PATIENTS),
    }
}

pub async fn statistics(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<StatisticsQuery>,
) -> Result<Json<ApiOk<StatisticsData>>, ApiError> {
    if auth.role == Role::Patient {
        return Err(ApiError::forbidden("Statistics are for clinic staff"));
    }
    let scope = record_scope(&auth, q.doctor_id)?;

    let rows: Vec<StatRow> = sqlx::query_as::<_, StatRow>(
        r#"
        SELECT cpf, patient_name, doctor_name, date
        FROM scheduling
        WHERE canceled_at IS NULL
          AND ($1::uuid IS NULL OR doctor_id = $1)
        ORDER BY created_at
        "#,
    )
    .bind(scope.doctor_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    let today = CalendarDate::today();
    let week = compute_week(today, state.agenda.week_start);
    Ok(Json(ApiOk::new(summarize(today, &week, &rows))))
}
