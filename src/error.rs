use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::calendar::ParseError;
use crate::cpf::CpfError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str, String),
    Forbidden(&'static str, String),
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    Conflict(&'static str, String),
    Internal(String),
}

impl ApiError {
    pub fn invalid_credentials() -> Self {
        ApiError::Unauthorized("INVALID_CREDENTIALS", "Email or password is incorrect".into())
    }

    pub fn session_expired() -> Self {
        ApiError::Unauthorized("SESSION_EXPIRED", "Session expired".into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::BadRequest("VALIDATION_ERROR", message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden("FORBIDDEN", message.into())
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound("NOT_FOUND", format!("{what} not found"))
    }

    pub fn slot_taken() -> Self {
        ApiError::Conflict(
            "SLOT_TAKEN",
            "This doctor already has an appointment at that date and hour".into(),
        )
    }

    /// Logs a storage failure and hides its detail from the client.
    pub fn db(e: sqlx::Error) -> Self {
        tracing::error!(error = %e, "database error");
        ApiError::Internal("database error".into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(..) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(..) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(..) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(..) => StatusCode::NOT_FOUND,
            ApiError::Conflict(..) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorResponse {
        let (code, message) = match self {
            ApiError::Unauthorized(code, msg)
            | ApiError::Forbidden(code, msg)
            | ApiError::BadRequest(code, msg)
            | ApiError::NotFound(code, msg)
            | ApiError::Conflict(code, msg) => (*code, msg.as_str()),
            ApiError::Internal(msg) => ("INTERNAL", msg.as_str()),
        };
        ErrorResponse {
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
                retryable: matches!(self, ApiError::Conflict(..)),
            },
        }
    }
}

impl From<ParseError> for ApiError {
    fn from(e: ParseError) -> Self {
        ApiError::validation(e.to_string())
    }
}

impl From<CpfError> for ApiError {
    fn from(e: CpfError) -> Self {
        ApiError::BadRequest("INVALID_CPF", e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::CalendarDate;
    use crate::cpf::Cpf;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::session_expired().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("no").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::validation("bad").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::not_found("user").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::slot_taken().status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_only_conflicts_are_retryable() {
        let json = serde_json::to_value(ApiError::slot_taken().body()).unwrap();
        assert_eq!(json["error"]["code"], "SLOT_TAKEN");
        assert_eq!(json["error"]["retryable"], true);

        let json = serde_json::to_value(ApiError::not_found("appointment").body()).unwrap();
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert_eq!(json["error"]["message"], "appointment not found");
        assert_eq!(json["error"]["retryable"], false);
    }

    #[test]
    fn test_domain_errors_become_bad_requests() {
        let err: ApiError = CalendarDate::parse("2024-13-01").unwrap_err().into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.body().error.code, "VALIDATION_ERROR");

        let err: ApiError = Cpf::parse("123").unwrap_err().into();
        assert_eq!(err.body().error.code, "INVALID_CPF");
    }
}
