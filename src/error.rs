use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::db::StoreError;

/// Failure half of the response envelope: `{"success": false, "code": ..., "message": ...}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str, String),
    Forbidden(&'static str, String),
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    Internal(String),
}

impl ApiError {
    pub fn invalid_credentials() -> Self {
        ApiError::Unauthorized("INVALID_CREDENTIALS", "Invalid credentials".into())
    }

    pub fn missing_token() -> Self {
        ApiError::Unauthorized("MISSING_TOKEN", "Missing bearer token".into())
    }

    pub fn session_expired() -> Self {
        ApiError::Unauthorized("SESSION_EXPIRED", "Invalid or expired token".into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::BadRequest("VALIDATION_ERROR", message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound("NOT_FOUND", message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden("FORBIDDEN", message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(..) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(..) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(..) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(..) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn to_error_response(code: &str, message: &str) -> Json<ErrorResponse> {
        Json(ErrorResponse {
            success: false,
            code: code.to_string(),
            message: message.to_string(),
        })
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail(entity) => ApiError::BadRequest(
                "DUPLICATE_EMAIL",
                format!("{entity} with this email already exists"),
            ),
            StoreError::SlotTaken => ApiError::BadRequest(
                "SLOT_TAKEN",
                "Doctor is not available at the requested time".into(),
            ),
            StoreError::NotFound(entity) => ApiError::not_found(format!("{entity} not found")),
            StoreError::Database(e) => ApiError::Internal(format!("db error: {e}")),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::Unauthorized(code, msg)
            | ApiError::Forbidden(code, msg)
            | ApiError::BadRequest(code, msg)
            | ApiError::NotFound(code, msg) => {
                (status, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Internal(msg) => {
                // never leak driver details to clients
                tracing::error!(error = %msg, "internal error");
                (
                    status,
                    ApiError::to_error_response("INTERNAL", "Internal server error"),
                )
                    .into_response()
            }
        }
    }
}
