use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{
        MIN_PASSWORD_LEN, generate_access_token, hash_access_token, hash_password,
        normalize_email, verify_password,
    },
    cpf::Cpf,
    db::{is_unique_violation, violated_constraint},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::*,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/logout", post(logout))
}

/* -------------------------
   DTOs
--------------------------*/

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub cpf: Option<String>,
    pub rua: Option<String>,
    pub numero_casa: Option<String>,
    pub bairro: Option<String>,
    pub cidade: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub device_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginData {
    pub access_token: String,
    pub expires_at: chrono::DateTime<Utc>,
    pub user: UserProfile,
    pub view: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MeData {
    pub user: UserProfile,
    pub session: SessionInfo,
}

#[derive(Debug, Serialize)]
pub struct SignupData {
    pub user_id: Uuid,
    pub role: Role,
}

/// A sign-up form that passed every check that needs no database.
#[derive(Debug, PartialEq, Eq)]
struct NewUser {
    name: String,
    email: String,
    role: Role,
    cpf: Option<Cpf>,
    address: Option<Address>,
}

#[derive(Debug, PartialEq, Eq)]
struct Address {
    rua: String,
    numero_casa: String,
    bairro: String,
    cidade: String,
}

fn required(field: &'static str, value: Option<&str>) -> Result<String, ApiError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ApiError::validation(format!("{field} is required"))),
    }
}

fn validate_signup(req: &SignupRequest) -> Result<NewUser, ApiError> {
    let name = required("name", Some(&req.name))?;
    let email = normalize_email(&req.email);
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::validation("a valid email is required"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let role = match Role::from_db(req.role.trim()) {
        Some(Role::Admin) => {
            return Err(ApiError::forbidden("admin accounts cannot be self-registered"));
        }
        Some(role) => role,
        None => {
            return Err(ApiError::validation(
                "role must be one of user, medico, secretaria",
            ));
        }
    };

    let cpf = match req.cpf.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(Cpf::parse(raw)?),
        _ => None,
    };

    let address = if role == Role::Doctor {
        if cpf.is_none() {
            return Err(ApiError::validation("cpf is required for doctors"));
        }
        Some(Address {
            rua: required("rua", req.rua.as_deref())?,
            numero_casa: required("numero_casa", req.numero_casa.as_deref())?,
            bairro: required("bairro", req.bairro.as_deref())?,
            cidade: required("cidade", req.cidade.as_deref())?,
        })
    } else {
        None
    };

    Ok(NewUser {
        name,
        email,
        role,
        cpf,
        address,
    })
}

fn cpf_taken() -> ApiError {
    ApiError::Conflict("CPF_TAKEN", "CPF already registered".into())
}

fn email_taken() -> ApiError {
    ApiError::Conflict("EMAIL_TAKEN", "Email already registered".into())
}

/* -------------------------
   Handlers
--------------------------*/

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<ApiOk<SignupData>>, ApiError> {
    let user = validate_signup(&req)?;

    if let Some(cpf) = &user.cpf {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE cpf = $1)")
                .bind(cpf.as_str())
                .fetch_one(&state.db)
                .await
                .map_err(ApiError::db)?;
        if exists {
            return Err(cpf_taken());
        }
    }

    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
        .bind(&user.email)
        .fetch_one(&state.db)
        .await
        .map_err(ApiError::db)?;
    if exists {
        return Err(email_taken());
    }

    let password_hash = hash_password(&req.password)
        .map_err(|e| ApiError::Internal(format!("argon2 hash error: {e}")))?;

    let addr = user.address.as_ref();
    let user_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO users (name, email, password, role, cpf, rua, numero_casa, bairro, cidade)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id
        "#,
    )
    .bind(&user.name)
    .bind(&user.email)
    .bind(&password_hash)
    .bind(user.role.as_db())
    .bind(user.cpf.as_ref().map(Cpf::as_str))
    .bind(addr.map(|a| a.rua.as_str()))
    .bind(addr.map(|a| a.numero_casa.as_str()))
    .bind(addr.map(|a| a.bairro.as_str()))
    .bind(addr.map(|a| a.cidade.as_str()))
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        // Two sign-ups racing past the checks above.
        if is_unique_violation(&e) {
            match violated_constraint(&e) {
                Some(c) if c.contains("cpf") => cpf_taken(),
                _ => email_taken(),
            }
        } else {
            ApiError::db(e)
        }
    })?;

    tracing::info!(%user_id, role = user.role.as_db(), "user signed up");

    Ok(Json(ApiOk::new(SignupData {
        user_id,
        role: user.role,
    })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiOk<LoginData>>, ApiError> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("email and password are required"));
    }

    let user: UserRow = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT id, name, email, password, role, cpf
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(&email)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::invalid_credentials)?;

    if !verify_password(&req.password, &user.password) {
        return Err(ApiError::invalid_credentials());
    }

    let role = Role::from_db(&user.role).ok_or_else(|| {
        ApiError::Forbidden("UNKNOWN_ROLE", format!("unknown role {:?}", user.role))
    })?;

    let access_token = generate_access_token();
    let token_hash = hash_access_token(&access_token);
    let expires_at = Utc::now() + Duration::hours(state.session_ttl_hours);

    let session: SessionTokenRow = sqlx::query_as::<_, SessionTokenRow>(
        r#"
        INSERT INTO session_token (user_id, session_token_hash, device_name, expires_at)
        VALUES ($1, $2, $3, $4)
        RETURNING session_token_id, expires_at
        "#,
    )
    .bind(user.id)
    .bind(&token_hash)
    .bind(req.device_name.as_deref())
    .bind(expires_at)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    tracing::info!(user_id = %user.id, "login");

    Ok(Json(ApiOk::new(LoginData {
        access_token,
        expires_at: session.expires_at,
        user: user.profile(role),
        view: role.view(),
    })))
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<MeData>>, ApiError> {
    let user: UserRow = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT id, name, email, password, role, cpf
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::session_expired)?;

    let session: SessionTokenRow = sqlx::query_as::<_, SessionTokenRow>(
        r#"
        SELECT session_token_id, expires_at
        FROM session_token
        WHERE session_token_id = $1
          AND user_id = $2
          AND revoked_at IS NULL
          AND expires_at > now()
        "#,
    )
    .bind(auth.session_token_id)
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::session_expired)?;

    Ok(Json(ApiOk::new(MeData {
        user: user.profile(auth.role),
        session: SessionInfo {
            session_token_id: session.session_token_id,
            expires_at: session.expires_at,
        },
    })))
}

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<OkResponse>, ApiError> {
    let rows = sqlx::query(
        r#"
        UPDATE session_token
        SET revoked_at = now()
        WHERE session_token_id = $1
          AND user_id = $2
          AND revoked_at IS NULL
        "#,
    )
    .bind(auth.session_token_id)
    .bind(auth.user_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if rows.rows_affected() == 0 {
        return Err(ApiError::session_expired());
    }

    Ok(Json(OkResponse::ok()))
}
