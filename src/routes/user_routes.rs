// src/routes/user_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::is_foreign_key_violation,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, DoctorRow, OkResponse, Role, UserPublicRow},
};

#[derive(Debug, Serialize)]
pub struct UsersListData {
    pub users: Vec<UserPublicRow>,
}

#[derive(Debug, Serialize)]
pub struct DoctorsListData {
    pub doctors: Vec<DoctorRow>,
}

#[derive(Debug, Deserialize)]
pub struct RenameUserRequest {
    pub name: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        // /api/v1/users
        .route("/", get(list_users))
        // /api/v1/users/{user_id}
        .route("/{user_id}", patch(rename_user).delete(delete_user))
        // /api/v1/users/{user_id}/promote
        .route("/{user_id}/promote", post(promote_user))
}

pub fn doctors_router() -> Router<AppState> {
    Router::new().route("/", get(list_doctors))
}

fn validate_name(name: &str) -> Result<&str, ApiError> {
    let n = name.trim();
    if n.is_empty() {
        return Err(ApiError::validation("name is required"));
    }
    Ok(n)
}

pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<UsersListData>>, ApiError> {
    auth.require_admin()?;

    let users: Vec<UserPublicRow> = sqlx::query_as::<_, UserPublicRow>(
        r#"
        SELECT id, name, email, role, cpf, created_at
        FROM users
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk::new(UsersListData { users })))
}

pub async fn rename_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
    Json(req): Json<RenameUserRequest>,
) -> Result<Json<ApiOk<UserPublicRow>>, ApiError> {
    auth.require_admin()?;
    let name = validate_name(&req.name)?;

    let user: UserPublicRow = sqlx::query_as::<_, UserPublicRow>(
        r#"
        UPDATE users
        SET name = $2
        WHERE id = $1
        RETURNING id, name, email, role, cpf, created_at
        "#,
    )
    .bind(user_id)
    .bind(name)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("user"))?;

    tracing::info!(%user_id, by = %auth.user_id, "user renamed");
    Ok(Json(ApiOk::new(user)))
}

pub async fn promote_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    auth.require_admin()?;

    let res = sqlx::query("UPDATE users SET role = $2 WHERE id = $1")
        .bind(user_id)
        .bind(Role::Admin.as_db())
        .execute(&state.db)
        .await
        .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("user"));
    }

    tracing::info!(%user_id, by = %auth.user_id, "user promoted to admin");
    Ok(Json(OkResponse::ok()))
}

pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    auth.require_admin()?;

    let role: String = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::not_found("user"))?;

    if Role::from_db(&role) == Some(Role::Admin) {
        return Err(ApiError::Forbidden(
            "ADMIN_PROTECTED",
            "Admin accounts cannot be deleted".into(),
        ));
    }

    // Sessions go with the user.
    let mut tx = state.db.begin().await.map_err(ApiError::db)?;
    sqlx::query("DELETE FROM session_token WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::db)?;
    sqlx::query("DELETE FROM users WHERE id = $1 AND role <> $2")
        .bind(user_id)
        .bind(Role::Admin.as_db())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            // A doctor still referenced by scheduling rows.
            if is_foreign_key_violation(&e) {
                ApiError::Conflict(
                    "USER_HAS_APPOINTMENTS",
                    "Delete or reassign this user's appointments first".into(),
                )
            } else {
                ApiError::db(e)
            }
        })?;
    tx.commit().await.map_err(ApiError::db)?;

    tracing::info!(%user_id, by = %auth.user_id, "user deleted");
    Ok(Json(OkResponse::ok()))
}

pub async fn list_doctors(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<DoctorsListData>>, ApiError> {
    let doctors: Vec<DoctorRow> = sqlx::query_as::<_, DoctorRow>(
        r#"
        SELECT id, name
        FROM users
        WHERE role = $1
        ORDER BY name
        "#,
    )
    .bind(Role::Doctor.as_db())
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk::new(DoctorsListData { doctors })))
}
