use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::schedule::error::ScheduleError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorObject,
    pub status: u16,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
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
    pub fn unauthenticated() -> Self {
        ApiError::Unauthorized("UNAUTHENTICATED", "No active session".into())
    }

    pub fn not_found() -> Self {
        ApiError::NotFound("NOT_FOUND", "record not found".into())
    }

    fn to_error_response(status: StatusCode, code: &str, message: &str) -> Json<ErrorResponse> {
        Json(ErrorResponse {
            success: false,
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
            },
            status: status.as_u16(),
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, msg) = match self {
            ApiError::Unauthorized(code, msg) => (StatusCode::UNAUTHORIZED, code, msg),
            ApiError::Forbidden(code, msg) => (StatusCode::FORBIDDEN, code, msg),
            ApiError::BadRequest(code, msg) => (StatusCode::BAD_REQUEST, code, msg),
            ApiError::NotFound(code, msg) => (StatusCode::NOT_FOUND, code, msg),
            ApiError::Conflict(code, msg) => (StatusCode::CONFLICT, code, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", msg),
        };
        (status, ApiError::to_error_response(status, code, &msg)).into_response()
    }
}

impl From<ScheduleError> for ApiError {
    fn from(e: ScheduleError) -> Self {
        match e {
            ScheduleError::Validation(msg) => ApiError::BadRequest("VALIDATION_ERROR", msg),
            ScheduleError::Authorization(msg) => ApiError::Forbidden("FORBIDDEN", msg),
            ScheduleError::Conflict(reason) => ApiError::Conflict(reason.code(), reason.to_string()),
            ScheduleError::NotFound => ApiError::not_found(),
            ScheduleError::Dependency(cause) => {
                tracing::error!(error = ?cause, "dependency failure");
                ApiError::Internal("service temporarily unavailable".into())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest("VALIDATION_ERROR", e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::BadRequest("VALIDATION_ERROR", e.body_text())
    }
}
