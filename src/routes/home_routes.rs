use axum::{Json, Router, extract::State, routing::get};

use crate::calendar::{CalendarDate, WeekWindow, compute_week};
use crate::error::ApiError;
use crate::middleware::auth_context::AuthContext;
use crate::models::{ApiOk, AppState, Role};

#[derive(serde::Serialize)]
pub struct HomeData {
    pub view: &'static str,
    pub name: String,
    pub role: Role,
    pub today: CalendarDate,
    pub week: WeekWindow,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/home", get(home))
}

pub async fn home(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<HomeData>>, ApiError> {
    let today = CalendarDate::today();
    Ok(Json(ApiOk::new(HomeData {
        view: auth.role.view(),
        name: auth.name,
        role: auth.role,
        today,
        week: compute_week(today, state.agenda.week_start),
    })))
}
