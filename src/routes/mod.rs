use crate::models::AppState;
use axum::Router;

pub mod auth_routes;
pub mod home_routes;
pub mod scheduling_routes;
pub mod statistics_routes;
pub mod user_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1/auth", auth_routes::router())
        .nest("/api/v1/users", user_routes::router())
        .nest("/api/v1/doctors", user_routes::doctors_router())
        .nest("/api/v1/scheduling", scheduling_routes::router())
        .nest("/api/v1/statistics", statistics_routes::router())
        .merge(home_routes::router())
        .with_state(state)
}
