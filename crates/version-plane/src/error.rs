use axum::{response::{IntoResponse, Response}, Json, http::StatusCode};
use serde::Serialize;
use utoipa::ToSchema;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Failures of the version engine. Every variant names the operation it came from.
/// A query that simply matches nothing is not an error; readers return `Option`/empty lists.
#[derive(Debug, Error)]
pub enum VersionError {
    #[error("not found: {0}")]
    NotFound(String),
    /// The request collides with state already in the store.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("{op}: malformed input: {source:#}")]
    MalformedInput { op: &'static str, #[source] source: anyhow::Error },
    #[error("{op}: input preparation failed: {source:#}")]
    InputPreparation { op: &'static str, #[source] source: anyhow::Error },
    #[error("{op}: {source}")]
    Persistence { op: &'static str, #[source] source: sqlx::Error },
}

impl VersionError {
    /// `map_err` adapter: `.map_err(VersionError::persistence("deploy.begin"))`.
    pub fn persistence(op: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Persistence { op, source }
    }
    pub fn malformed(op: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self::MalformedInput { op, source }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiErrorBody { pub code: &'static str, pub message: String }

#[derive(Debug, Clone)]
pub struct ApiError { pub status: StatusCode, pub code: &'static str, pub message: String }

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into() }
    }
    pub fn not_found(msg: impl Into<String>) -> Self { Self::new(StatusCode::NOT_FOUND, "not_found", msg) }
    pub fn internal(msg: impl Into<String>) -> Self { Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", msg) }
    pub fn bad_request(msg: impl Into<String>) -> Self { Self::new(StatusCode::BAD_REQUEST, "bad_request", msg) }
    pub fn conflict(msg: impl Into<String>) -> Self { Self::new(StatusCode::CONFLICT, "conflict", msg) }
    pub fn unprocessable(msg: impl Into<String>) -> Self { Self::new(StatusCode::UNPROCESSABLE_ENTITY, "input_preparation", msg) }
}

impl From<VersionError> for ApiError {
    fn from(e: VersionError) -> Self {
        let msg = e.to_string();
        match e {
            VersionError::NotFound(_) => ApiError::not_found(msg),
            VersionError::Conflict(_) => ApiError::conflict(msg),
            VersionError::MalformedInput { .. } => ApiError::bad_request(msg),
            VersionError::InputPreparation { .. } => ApiError::unprocessable(msg),
            VersionError::Persistence { .. } => {
                tracing::error!(error=%msg, "persistence failure");
                ApiError::internal(msg)
            }
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "{}: {}", self.code, self.message) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody { code: self.code, message: self.message };
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_errors_map_to_http_status() {
        let nf: ApiError = VersionError::NotFound("app demo".into()).into();
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        let bad: ApiError = VersionError::MalformedInput { op: "create_version.load", source: anyhow::anyhow!("bad yaml") }.into();
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert!(bad.message.starts_with("create_version.load"));
        let taken: ApiError = VersionError::Conflict("sequence 0 of demo".into()).into();
        assert_eq!(taken.status, StatusCode::CONFLICT);
        assert_eq!(taken.code, "conflict");
        let db: ApiError = VersionError::Persistence { op: "deploy.commit", source: sqlx::Error::PoolClosed }.into();
        assert_eq!(db.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
