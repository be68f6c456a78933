use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::calendar::{CalendarDate, HourLabel, Scheduled};
use crate::config::AgendaConfig;
use crate::cpf::format_cpf;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub session_ttl_hours: i64,
    pub agenda: AgendaConfig,
}

/* -------------------------
   Roles
--------------------------*/

/// Stored in `users.role` as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "user")]
    Patient,
    #[serde(rename = "medico")]
    Doctor,
    #[serde(rename = "secretaria")]
    Receptionist,
    #[serde(rename = "admin")]
    Admin,
}

impl Role {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::Patient),
            "medico" => Some(Role::Doctor),
            "secretaria" => Some(Role::Receptionist),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_db(self) -> &'static str {
        match self {
            Role::Patient => "user",
            Role::Doctor => "medico",
            Role::Receptionist => "secretaria",
            Role::Admin => "admin",
        }
    }

    /// Name of the page a client shows after login.
    pub fn view(self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Receptionist => "receptionist",
            Role::Admin => "admin",
        }
    }

    pub fn is_staff(self) -> bool {
        matches!(self, Role::Receptionist | Role::Admin)
    }
}

/* -------------------------
   API DTOs
--------------------------*/

/// Success envelope shared by every route.
#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

impl<T> ApiOk<T> {
    pub fn new(data: T) -> Self {
        ApiOk { data }
    }
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

pub type OkResponse = ApiOk<OkData>;

impl OkResponse {
    pub fn ok() -> Self {
        ApiOk::new(OkData { ok: true })
    }
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub cpf: Option<String>,
    /// `cpf` under the `000.000.000-00` mask, for display.
    pub cpf_formatted: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/* -------------------------
   DB Row Models
--------------------------*/

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub cpf: Option<String>,
}

impl UserRow {
    pub fn profile(&self, role: Role) -> UserProfile {
        UserProfile {
            user_id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role,
            cpf: self.cpf.clone(),
            cpf_formatted: self.cpf.as_deref().map(format_cpf),
        }
    }
}

#[derive(Debug, Serialize, FromRow)]
pub struct UserPublicRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub cpf: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct DoctorRow {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, FromRow)]
pub struct SessionTokenRow {
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// One row of `scheduling`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SchedulingRow {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub patient_name: String,
    pub cpf: Option<String>,
    pub phone: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub neighborhood: Option<String>,
    pub house_number: Option<String>,
    pub date: NaiveDate,
    pub hour: NaiveTime,
    pub rating: Option<i16>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub const SCHEDULING_COLUMNS: &str = "id, title, description, doctor_id, doctor_name, \
     patient_name, cpf, phone, state, city, neighborhood, house_number, date, hour, \
     rating, canceled_at, created_at";

impl Scheduled for SchedulingRow {
    fn slot_date(&self) -> Option<CalendarDate> {
        CalendarDate::try_from(self.date).ok()
    }

    fn slot_hour(&self) -> Option<HourLabel> {
        HourLabel::from_time(self.hour)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_through_db_text() {
        for role in [Role::Patient, Role::Doctor, Role::Receptionist, Role::Admin] {
            assert_eq!(Role::from_db(role.as_db()), Some(role));
        }
        assert_eq!(Role::from_db("manager"), None);
        assert_eq!(Role::from_db("Admin"), None);
    }

    #[test]
    fn test_role_serializes_as_db_text() {
        assert_eq!(serde_json::to_string(&Role::Doctor).unwrap(), "\"medico\"");
        assert_eq!(Role::Doctor.view(), "doctor");
        assert!(Role::Receptionist.is_staff());
        assert!(!Role::Doctor.is_staff());
    }

    fn user_row(cpf: Option<&str>) -> UserRow {
        UserRow {
            id: Uuid::nil(),
            name: "Ana".into(),
            email: "ana@example.com".into(),
            password: String::new(),
            role: Role::Patient.as_db().into(),
            cpf: cpf.map(str::to_string),
        }
    }

    #[test]
    fn test_profile_carries_masked_cpf() {
        let profile = user_row(Some("12345678901")).profile(Role::Patient);
        assert_eq!(profile.cpf.as_deref(), Some("12345678901"));
        assert_eq!(profile.cpf_formatted.as_deref(), Some("123.456.789-01"));

        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["cpf_formatted"], "123.456.789-01");

        let profile = user_row(None).profile(Role::Patient);
        assert_eq!(profile.cpf_formatted, None);
    }
}
