use alerta_services::auth::AuthError;
use alerta_services::dao::base::DaoError;
use alerta_services::projector::ProjectorError;
use alerta_services::{AlertError, TransitionError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    /// Missing or malformed arguments on the callable endpoint.
    InvalidArgument(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    InvalidTransition(String),
    Internal(String),
    Validation(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl ApiError {
    pub fn parts(&self) -> (StatusCode, &'static str, &str) {
        match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::InvalidArgument(msg) => (StatusCode::BAD_REQUEST, "invalid-argument", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::InvalidTransition(msg) => {
                (StatusCode::CONFLICT, "invalid_transition", msg)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg),
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "validation", msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = self.parts();
        if status.is_server_error() {
            error!(%message, "Request failed");
        }

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: message.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<DaoError> for ApiError {
    fn from(err: DaoError) -> Self {
        match err {
            DaoError::NotFound => ApiError::NotFound("Resource not found".to_string()),
            DaoError::DuplicateKey(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => {
                ApiError::Unauthorized("Invalid credentials".to_string())
            }
            AuthError::TokenExpired => ApiError::Unauthorized("Token expired".to_string()),
            AuthError::InvalidToken(msg) => ApiError::Unauthorized(msg),
            AuthError::HashError(msg) => ApiError::Internal(msg),
            AuthError::Validation(msg) => ApiError::Validation(msg),
        }
    }
}

impl From<AlertError> for ApiError {
    fn from(err: AlertError) -> Self {
        match err {
            AlertError::Validation(msg) => ApiError::Validation(msg),
            AlertError::Unauthorized(msg) => ApiError::Forbidden(msg),
            AlertError::NotFound => ApiError::NotFound("Alert not found".to_string()),
            AlertError::Store(e) => e.into(),
        }
    }
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Unauthorized(msg) => ApiError::Forbidden(msg),
            e @ TransitionError::InvalidTransition { .. } => {
                ApiError::InvalidTransition(e.to_string())
            }
            TransitionError::NotFound => ApiError::NotFound("Alert not found".to_string()),
            TransitionError::Store(e) => e.into(),
        }
    }
}

impl From<ProjectorError> for ApiError {
    fn from(err: ProjectorError) -> Self {
        match err {
            e @ ProjectorError::CoolingDown { .. } => ApiError::Conflict(e.to_string()),
            e @ ProjectorError::Busy => ApiError::Conflict(e.to_string()),
            ProjectorError::Alert(e) => e.into(),
            ProjectorError::Transition(e) => e.into(),
        }
    }
}
