use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Unauthorized(String),

    #[error("permission denied")]
    PermissionDenied,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::PermissionDenied => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(e) = &self {
            error!(error = ?e, "internal error");
        }
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Failures reported by repository implementations.
#[derive(Error, Debug)]
pub enum RepoError {
    /// A unique constraint was violated.
    #[error("{0} already exists")]
    Conflict(&'static str),

    /// A referenced row does not exist (foreign key violation).
    #[error("{0} not found")]
    Missing(&'static str),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Conflict(what) => AppError::Conflict(format!("{what} already exists")),
            RepoError::Missing(what) => AppError::NotFound(what),
            RepoError::Other(e) => AppError::Internal(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_error_kind() {
        let v: AppError = ValidationError::new("proteins", "too big").into();
        assert_eq!(v.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::PermissionDenied.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound("meal").status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::NotFound("meal").to_string(), "meal not found");
    }

    #[test]
    fn repo_errors_map_to_http_kinds() {
        let conflict: AppError = RepoError::Conflict("product").into();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        let missing: AppError = RepoError::Missing("category").into();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let other: AppError = RepoError::Other(anyhow::anyhow!("boom")).into();
        assert_eq!(other.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(other.to_string(), "internal error");
    }
}
