use axum::{
    Json,
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::dao::storage::StorageError;

/// Failures surfaced by the service functions, independent of HTTP.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The backend failed mid-operation.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// No backend is connected yet, or the supervisor gave up on it.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// No principal could be resolved for the caller.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// Concurrent writers kept winning, or the id is already taken.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl ServiceError {
    pub fn game_not_found(id: Uuid) -> Self {
        ServiceError::NotFound(format!("game `{id}` does not exist"))
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { id } => ServiceError::game_not_found(id),
            StorageError::AlreadyExists { id } => {
                ServiceError::Conflict(format!("game `{id}` already exists"))
            }
            StorageError::VersionConflict { id, .. } => {
                ServiceError::Conflict(format!("game `{id}` was modified concurrently"))
            }
            unavailable @ StorageError::Unavailable { .. } => ServiceError::Unavailable(unavailable),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {err}"))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Handler-facing error; each variant owns one status code and renders as `{"message": ...}`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Unauthenticated(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Conflict(message) => AppError::Conflict(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = ErrorBody {
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ServiceError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn service_errors_map_to_http_statuses() {
        let id = Uuid::new_v4();
        assert_eq!(status_of(ServiceError::game_not_found(id)), StatusCode::NOT_FOUND);
        assert_eq!(status_of(ServiceError::Conflict("busy".into())), StatusCode::CONFLICT);
        assert_eq!(status_of(ServiceError::InvalidInput("bad".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(ServiceError::Unauthenticated("missing".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(ServiceError::Degraded), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn storage_errors_keep_their_meaning() {
        let id = Uuid::new_v4();
        assert!(matches!(
            ServiceError::from(StorageError::NotFound { id }),
            ServiceError::NotFound(_)
        ));
        assert!(matches!(
            ServiceError::from(StorageError::AlreadyExists { id }),
            ServiceError::Conflict(_)
        ));
        assert!(matches!(
            ServiceError::from(StorageError::VersionConflict { id, expected: 3 }),
            ServiceError::Conflict(_)
        ));

        let io = std::io::Error::other("connection reset");
        let unavailable = ServiceError::from(StorageError::unavailable("down".into(), io));
        assert_eq!(status_of(unavailable), StatusCode::SERVICE_UNAVAILABLE);
    }
}
