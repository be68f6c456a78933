// src/routes/scheduling_routes.rs

use std::collections::BTreeSet;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    calendar::{
        CalendarDate, HourLabel, MonthGrid, ParseError, SlotGrid, WeekStart, WeekWindow,
        build_slot_grid, compute_week, hour_range, marked_dates, month_days, parse_hour_list,
        resolve_week_start,
    },
    cpf::Cpf,
    db::is_unique_violation,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, OkResponse, Role, SCHEDULING_COLUMNS, SchedulingRow},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_day).post(create_appointment))
        .route("/week", get(week_view))
        .route("/month", get(month_view))
        .route("/{id}", get(get_appointment).delete(delete_appointment))
        .route("/{id}/rating", post(rate_appointment))
        .route("/{id}/cancel", post(cancel_appointment))
}

/* -------------------------
   Scoping
--------------------------*/

/// Which appointments a caller may read. `None` means unrestricted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordScope {
    pub doctor_id: Option<Uuid>,
    pub cpf: Option<String>,
}

impl RecordScope {
    pub fn permits(&self, row: &SchedulingRow) -> bool {
        self.doctor_id.is_none_or(|id| id == row.doctor_id)
            && self
                .cpf
                .as_deref()
                .is_none_or(|cpf| row.cpf.as_deref() == Some(cpf))
    }
}

/// Narrows `requested_doctor` to what the caller may see. A patient without a
/// CPF on file gets an empty CPF filter, which matches no stored row.
pub fn record_scope(
    auth: &AuthContext,
    requested_doctor: Option<Uuid>,
) -> Result<RecordScope, ApiError> {
    match auth.role {
        Role::Admin | Role::Receptionist => Ok(RecordScope {
            doctor_id: requested_doctor,
            cpf: None,
        }),
        Role::Doctor => match requested_doctor {
            Some(id) if id != auth.user_id => Err(ApiError::forbidden(
                "Doctors can only see their own agenda",
            )),
            _ => Ok(RecordScope {
                doctor_id: Some(auth.user_id),
                cpf: None,
            }),
        },
        Role::Patient => Ok(RecordScope {
            doctor_id: requested_doctor,
            cpf: Some(auth.cpf.clone().unwrap_or_default()),
        }),
    }
}

/* -------------------------
   Query parsing
--------------------------*/

/// `business` (or absent) keeps the configured hours, `full` is the whole
/// day, anything else is a comma separated list of `HH:00` labels.
pub fn resolve_hours(
    param: Option<&str>,
    business: &[HourLabel],
) -> Result<Vec<HourLabel>, ParseError> {
    match param.map(str::trim) {
        None | Some("") | Some("business") => Ok(business.to_vec()),
        Some("full") => Ok(hour_range(0, 23)),
        Some(list) => parse_hour_list(list),
    }
}

fn reference_date(param: Option<&str>) -> Result<CalendarDate, ParseError> {
    match param {
        Some(s) if !s.trim().is_empty() => CalendarDate::parse(s),
        _ => Ok(CalendarDate::today()),
    }
}

#[derive(Debug, Deserialize)]
pub struct WeekQuery {
    pub date: Option<String>,
    pub week_start: Option<String>,
    pub hours: Option<String>,
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub date: String,
    pub doctor_id: Option<Uuid>,
}

/* -------------------------
   Responses
--------------------------*/

#[derive(Debug, Serialize)]
pub struct WeekData {
    pub week_start: WeekStart,
    pub today: CalendarDate,
    pub window: WeekWindow,
    pub previous: Option<CalendarDate>,
    pub next: Option<CalendarDate>,
    pub hours: Vec<HourLabel>,
    pub slots: SlotGrid<SchedulingRow>,
    pub marked_dates: BTreeSet<CalendarDate>,
}

#[derive(Debug, Serialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl From<(i32, u32)> for YearMonth {
    fn from((year, month): (i32, u32)) -> Self {
        YearMonth { year, month }
    }
}

#[derive(Debug, Serialize)]
pub struct MonthData {
    pub calendar: MonthGrid,
    pub previous: YearMonth,
    pub next: YearMonth,
}

#[derive(Debug, Serialize)]
pub struct DayData {
    pub date: CalendarDate,
    pub appointments: Vec<SchedulingRow>,
}

/* -------------------------
   Reads
--------------------------*/

async fn fetch_on_dates(
    state: &AppState,
    dates: Vec<NaiveDate>,
    scope: &RecordScope,
) -> Result<Vec<SchedulingRow>, ApiError> {
    sqlx::query_as::<_, SchedulingRow>(&format!(
        r#"
        SELECT {SCHEDULING_COLUMNS}
        FROM scheduling
        WHERE date = ANY($1)
          AND canceled_at IS NULL
          AND ($2::uuid IS NULL OR doctor_id = $2)
          AND ($3::text IS NULL OR cpf = $3)
        ORDER BY date, hour, created_at
        "#
    ))
    .bind(dates)
    .bind(scope.doctor_id)
    .bind(scope.cpf.as_deref())
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)
}

pub async fn week_view(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<WeekQuery>,
) -> Result<Json<ApiOk<WeekData>>, ApiError> {
    let reference = reference_date(q.date.as_deref())?;
    let week_start = resolve_week_start(q.week_start.as_deref(), state.agenda.week_start)?;
    let hours = resolve_hours(q.hours.as_deref(), &state.agenda.business_hours)?;
    let scope = record_scope(&auth, q.doctor_id)?;

    let window = compute_week(reference, week_start);
    let dates = window.iter().map(CalendarDate::as_naive).collect();
    let rows = fetch_on_dates(&state, dates, &scope).await?;
    let fetched = rows.len();

    let marked = marked_dates(&rows);
    let slots = build_slot_grid(&window, &hours, rows);
    tracing::debug!(
        from = %window.first(),
        to = %window.last(),
        fetched,
        placed = slots.placed(),
        "week grid built"
    );

    Ok(Json(ApiOk::new(WeekData {
        week_start,
        today: CalendarDate::today(),
        previous: window.previous().map(|w| w.first()),
        next: window.next().map(|w| w.first()),
        window,
        hours,
        slots,
        marked_dates: marked,
    })))
}

pub async fn month_view(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<MonthQuery>,
) -> Result<Json<ApiOk<MonthData>>, ApiError> {
    let today = CalendarDate::today();
    let year = q.year.unwrap_or(today.year());
    let month = q.month.unwrap_or(today.month());
    let scope = record_scope(&auth, q.doctor_id)?;

    let dates = month_days(year, month)?
        .into_iter()
        .map(CalendarDate::as_naive)
        .collect();
    let rows = fetch_on_dates(&state, dates, &scope).await?;
    let calendar = MonthGrid::new(year, month, &marked_dates(&rows))?;

    Ok(Json(ApiOk::new(MonthData {
        previous: calendar.previous().into(),
        next: calendar.next().into(),
        calendar,
    })))
}

pub async fn list_day(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<DayQuery>,
) -> Result<Json<ApiOk<DayData>>, ApiError> {
    let date = CalendarDate::parse(&q.date)?;
    let scope = record_scope(&auth, q.doctor_id)?;
    let appointments = fetch_on_dates(&state, vec![date.as_naive()], &scope).await?;
    Ok(Json(ApiOk::new(DayData { date, appointments })))
}

async fn fetch_one(state: &AppState, id: Uuid) -> Result<Option<SchedulingRow>, ApiError> {
    sqlx::query_as::<_, SchedulingRow>(&format!(
        "SELECT {SCHEDULING_COLUMNS} FROM scheduling WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)
}

pub async fn get_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiOk<SchedulingRow>>, ApiError> {
    let scope = record_scope(&auth, None)?;
    let row = fetch_one(&state, id)
        .await?
        .filter(|r| scope.permits(r))
        .ok_or_else(|| ApiError::not_found("appointment"))?;
    Ok(Json(ApiOk::new(row)))
}

/* -------------------------
   Writes
--------------------------*/

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub title: String,
    pub description: Option<String>,
    pub doctor_id: Option<Uuid>,
    pub date: String,
    pub hour: String,
    pub patient_name: Option<String>,
    pub cpf: Option<String>,
    pub phone: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub neighborhood: Option<String>,
    pub house_number: Option<String>,
}

/// Who the appointment is for, as far as the form alone can tell.
#[derive(Debug, PartialEq, Eq)]
enum Booker {
    /// The caller books for themselves.
    Patient,
    Staff { patient_name: String, cpf: Cpf },
}

#[derive(Debug, PartialEq, Eq)]
struct NewAppointment {
    title: String,
    doctor_id: Uuid,
    date: CalendarDate,
    hour: HourLabel,
    booker: Booker,
}

fn non_blank(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

fn validate_create(req: &CreateAppointmentRequest, role: Role) -> Result<NewAppointment, ApiError> {
    if role == Role::Doctor {
        return Err(ApiError::forbidden("Doctors cannot book appointments"));
    }
    let title = non_blank(Some(&req.title))
        .ok_or_else(|| ApiError::validation("title is required"))?
        .to_string();
    let doctor_id = req
        .doctor_id
        .ok_or_else(|| ApiError::validation("doctor_id is required"))?;
    let date = CalendarDate::parse(&req.date)?;
    let hour = HourLabel::parse(req.hour.trim())?;

    let booker = if role.is_staff() {
        let patient_name = non_blank(req.patient_name.as_deref())
            .ok_or_else(|| ApiError::validation("patient_name is required"))?
            .to_string();
        let cpf = non_blank(req.cpf.as_deref())
            .ok_or_else(|| ApiError::validation("cpf is required"))?;
        Booker::Staff {
            patient_name,
            cpf: Cpf::parse(cpf)?,
        }
    } else {
        Booker::Patient
    };

    Ok(NewAppointment {
        title,
        doctor_id,
        date,
        hour,
        booker,
    })
}

pub async fn create_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<Json<ApiOk<SchedulingRow>>, ApiError> {
    let new = validate_create(&req, auth.role)?;

    let (patient_name, cpf) = match new.booker {
        Booker::Patient => {
            let cpf = auth.cpf.clone().ok_or_else(|| {
                ApiError::BadRequest(
                    "CPF_REQUIRED",
                    "Add your CPF to your profile before booking".into(),
                )
            })?;
            (auth.name.clone(), cpf)
        }
        Booker::Staff { patient_name, cpf } => {
            let registered: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE cpf = $1)")
                    .bind(cpf.as_str())
                    .fetch_one(&state.db)
                    .await
                    .map_err(ApiError::db)?;
            if !registered {
                return Err(ApiError::NotFound(
                    "PATIENT_NOT_FOUND",
                    "No registered patient has this CPF".into(),
                ));
            }
            (patient_name, String::from(cpf))
        }
    };

    let doctor: Option<(String, String)> =
        sqlx::query_as("SELECT name, role FROM users WHERE id = $1")
            .bind(new.doctor_id)
            .fetch_optional(&state.db)
            .await
            .map_err(ApiError::db)?;
    let doctor_name = match doctor {
        Some((name, role)) if Role::from_db(&role) == Some(Role::Doctor) => name,
        Some(_) => return Err(ApiError::validation("doctor_id does not belong to a doctor")),
        None => return Err(ApiError::NotFound("DOCTOR_NOT_FOUND", "doctor not found".into())),
    };

    let row = sqlx::query_as::<_, SchedulingRow>(&format!(
        r#"
        INSERT INTO scheduling
            (title, description, doctor_id, doctor_name, patient_name, cpf,
             phone, state, city, neighborhood, house_number, date, hour)
        VALUES
            ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING {SCHEDULING_COLUMNS}
        "#
    ))
    .bind(&new.title)
    .bind(non_blank(req.description.as_deref()))
    .bind(new.doctor_id)
    .bind(&doctor_name)
    .bind(&patient_name)
    .bind(&cpf)
    .bind(non_blank(req.phone.as_deref()))
    .bind(non_blank(req.state.as_deref()))
    .bind(non_blank(req.city.as_deref()))
    .bind(non_blank(req.neighborhood.as_deref()))
    .bind(non_blank(req.house_number.as_deref()))
    .bind(new.date.as_naive())
    .bind(new.hour.to_time())
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            tracing::warn!(
                doctor_id = %new.doctor_id,
                date = %new.date,
                hour = %new.hour,
                "slot already taken"
            );
            ApiError::slot_taken()
        } else {
            ApiError::db(e)
        }
    })?;

    tracing::info!(
        appointment_id = %row.id,
        doctor_id = %row.doctor_id,
        date = %new.date,
        hour = %new.hour,
        by = %auth.user_id,
        "appointment created"
    );
    Ok(Json(ApiOk::new(row)))
}

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    pub rating: i16,
}

fn validate_rating(rating: i16) -> Result<i16, ApiError> {
    if (1..=5).contains(&rating) {
        Ok(rating)
    } else {
        Err(ApiError::validation("rating must be between 1 and 5"))
    }
}

pub async fn rate_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<RatingRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    if auth.role != Role::Patient {
        return Err(ApiError::forbidden("Only the patient can rate an appointment"));
    }
    let rating = validate_rating(req.rating)?;
    let scope = record_scope(&auth, None)?;

    let res = sqlx::query(
        r#"
        UPDATE scheduling
        SET rating = $2
        WHERE id = $1
          AND cpf = $3
          AND canceled_at IS NULL
        "#,
    )
    .bind(id)
    .bind(rating)
    .bind(scope.cpf.as_deref())
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("appointment"));
    }

    tracing::info!(appointment_id = %id, rating, "appointment rated");
    Ok(Json(OkResponse::ok()))
}

pub async fn cancel_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    if auth.role == Role::Doctor {
        return Err(ApiError::forbidden("Doctors cannot cancel appointments"));
    }
    let scope = record_scope(&auth, None)?;

    let res = sqlx::query(
        r#"
        UPDATE scheduling
        SET canceled_at = now()
        WHERE id = $1
          AND canceled_at IS NULL
          AND ($2::text IS NULL OR cpf = $2)
        "#,
    )
    .bind(id)
    .bind(scope.cpf.as_deref())
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("appointment"));
    }

    tracing::info!(appointment_id = %id, by = %auth.user_id, "appointment canceled");
    Ok(Json(OkResponse::ok()))
}

pub async fn delete_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    auth.require_staff()?;

    let res = sqlx::query("DELETE FROM scheduling WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("appointment"));
    }

    tracing::info!(appointment_id = %id, by = %auth.user_id, "appointment deleted");
    Ok(Json(OkResponse::ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Utc};

    fn caller(role: Role, cpf: Option<&str>) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            role,
            name: "Ana".into(),
            cpf: cpf.map(str::to_string),
            session_token_id: Uuid::new_v4(),
        }
    }

    fn row(doctor_id: Uuid, cpf: Option<&str>) -> SchedulingRow {
        SchedulingRow {
            id: Uuid::new_v4(),
            title: "Consulta".into(),
            description: None,
            doctor_id,
            doctor_name: "Dr. Silva".into(),
            patient_name: "Ana".into(),
            cpf: cpf.map(str::to_string),
            phone: None,
            state: None,
            city: None,
            neighborhood: None,
            house_number: None,
            date: NaiveDate::from_ymd_opt(2024, 5, 13).unwrap(),
            hour: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            rating: None,
            canceled_at: None,
            created_at: Utc::now(),
        }
    }

    fn request() -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            title: "Consulta".into(),
            description: None,
            doctor_id: Some(Uuid::new_v4()),
            date: "2024-05-13".into(),
            hour: "08:00".into(),
            patient_name: None,
            cpf: None,
            phone: None,
            state: None,
            city: None,
            neighborhood: None,
            house_number: None,
        }
    }

    #[test]
    fn test_staff_scope_follows_requested_doctor() {
        let doctor = Uuid::new_v4();
        for role in [Role::Admin, Role::Receptionist] {
            let scope = record_scope(&caller(role, None), Some(doctor)).unwrap();
            assert_eq!(scope, RecordScope { doctor_id: Some(doctor), cpf: None });
            let all = record_scope(&caller(role, None), None).unwrap();
            assert!(all.permits(&row(Uuid::new_v4(), None)));
        }
    }

    #[test]
    fn test_doctor_is_pinned_to_own_agenda() {
        let me = caller(Role::Doctor, None);
        let scope = record_scope(&me, None).unwrap();
        assert_eq!(scope.doctor_id, Some(me.user_id));
        assert!(scope.permits(&row(me.user_id, Some("12345678901"))));
        assert!(!scope.permits(&row(Uuid::new_v4(), Some("12345678901"))));

        assert!(record_scope(&me, Some(me.user_id)).is_ok());
        assert!(record_scope(&me, Some(Uuid::new_v4())).is_err());
    }

    #[test]
    fn test_patient_sees_only_own_cpf() {
        let me = caller(Role::Patient, Some("12345678901"));
        let scope = record_scope(&me, None).unwrap();
        assert!(scope.permits(&row(Uuid::new_v4(), Some("12345678901"))));
        assert!(!scope.permits(&row(Uuid::new_v4(), Some("10987654321"))));
        assert!(!scope.permits(&row(Uuid::new_v4(), None)));

        let no_cpf = record_scope(&caller(Role::Patient, None), None).unwrap();
        assert!(!no_cpf.permits(&row(Uuid::new_v4(), Some("12345678901"))));
    }

    #[test]
    fn test_resolve_hours() {
        let business = hour_range(8, 19);
        assert_eq!(resolve_hours(None, &business).unwrap(), business);
        assert_eq!(resolve_hours(Some("business"), &business).unwrap(), business);
        assert_eq!(resolve_hours(Some("full"), &business).unwrap().len(), 24);
        let custom = resolve_hours(Some("14:00,09:00"), &business).unwrap();
        assert_eq!(custom.iter().map(|h| h.hour()).collect::<Vec<_>>(), [14, 9]);
        assert!(resolve_hours(Some("9am"), &business).is_err());
    }

    #[test]
    fn test_reference_date_defaults_to_today() {
        assert_eq!(reference_date(None).unwrap(), CalendarDate::today());
        assert_eq!(reference_date(Some("")).unwrap(), CalendarDate::today());
        assert_eq!(reference_date(Some("2024-05-15")).unwrap().to_string(), "2024-05-15");
        assert!(reference_date(Some("15/05/2024")).is_err());
    }

    #[test]
    fn test_blank_week_query_uses_defaults() {
        // ?date=&week_start=&hours=
        let business = hour_range(8, 19);
        assert_eq!(reference_date(Some("")).unwrap(), CalendarDate::today());
        assert_eq!(resolve_hours(Some(""), &business).unwrap(), business);
        assert_eq!(
            resolve_week_start(Some(""), WeekStart::Monday).unwrap(),
            WeekStart::Monday
        );
        assert!(resolve_week_start(Some("midweek"), WeekStart::Monday).is_err());
    }

    #[test]
    fn test_patient_booking_takes_no_patient_fields() {
        let new = validate_create(&request(), Role::Patient).unwrap();
        assert_eq!(new.booker, Booker::Patient);
        assert_eq!(new.hour.to_string(), "08:00");
        assert_eq!(new.date.to_string(), "2024-05-13");
    }

    #[test]
    fn test_staff_booking_requires_patient() {
        assert!(validate_create(&request(), Role::Receptionist).is_err());

        let req = CreateAppointmentRequest {
            patient_name: Some("Bia".into()),
            cpf: Some("123.456.789-01".into()),
            ..request()
        };
        let new = validate_create(&req, Role::Admin).unwrap();
        match new.booker {
            Booker::Staff { patient_name, cpf } => {
                assert_eq!(patient_name, "Bia");
                assert_eq!(cpf.as_str(), "12345678901");
            }
            Booker::Patient => panic!("expected a staff booking"),
        }

        let bad_cpf = CreateAppointmentRequest { cpf: Some("1234".into()), ..req };
        let err = validate_create(&bad_cpf, Role::Admin).unwrap_err();
        assert_eq!(err.body().error.code, "INVALID_CPF");
    }

    #[test]
    fn test_create_rejects_bad_form() {
        assert!(validate_create(&request(), Role::Doctor).is_err());
        let cases = [
            CreateAppointmentRequest { title: " ".into(), ..request() },
            CreateAppointmentRequest { doctor_id: None, ..request() },
            CreateAppointmentRequest { date: "2024-02-30".into(), ..request() },
            CreateAppointmentRequest { hour: "08:30".into(), ..request() },
            CreateAppointmentRequest { hour: "8".into(), ..request() },
        ];
        for req in &cases {
            assert!(validate_create(req, Role::Patient).is_err(), "{req:?}");
        }
    }

    #[test]
    fn test_validate_rating() {
        assert_eq!(validate_rating(1).ok(), Some(1));
        assert_eq!(validate_rating(5).ok(), Some(5));
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
        assert!(validate_rating(-3).is_err());
    }
}
