use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::services::PromoError;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    DatabaseError(String),

    ValidationError(String),

    Conflict(String),

    InternalError(String),

    Unauthorized(String),

    Forbidden(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            ApiError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
        };

        let body = ApiResponse::<()>::error(error_message);
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<PromoError> for ApiError {
    fn from(err: PromoError) -> Self {
        match err {
            PromoError::NotFound => ApiError::NotFound(err.to_string()),
            PromoError::Database(e) => ApiError::DatabaseError(e.to_string()),
            _ => ApiError::ValidationError(err.to_string()),
        }
    }
}

impl ApiError {
    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        ApiError::NotFound(format!("{} {} not found", resource, id))
    }

    pub fn course_not_found(reference: impl fmt::Display) -> Self {
        ApiError::NotFound(format!("Course {} not found", reference))
    }

    pub fn lesson_not_found(id: impl fmt::Display) -> Self {
        ApiError::NotFound(format!("Lesson {} not found", id))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::ValidationError(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::InternalError(msg.into())
    }

    pub fn unauthorized() -> Self {
        ApiError::Unauthorized("Not authenticated".to_string())
    }

    pub fn forbidden() -> Self {
        ApiError::Forbidden("Admin access required".to_string())
    }
}
