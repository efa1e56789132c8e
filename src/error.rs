use crate::directory::DirectoryError;
use crate::guard::GuardViolation;
use crate::query::QueryError;
use crate::validation::ValidationError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Configuration loading errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("Invalid page limit: {0}")]
    InvalidLimit(String),
    #[error("Invalid TTL: {0}")]
    InvalidTtl(String),
    #[error("Invalid zone name: {0}")]
    InvalidZoneName(String),
    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

/// Categorised failure of a collection operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Structurally invalid input
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Invalid paging or sorting parameters
    #[error(transparent)]
    InvalidQuery(QueryError),

    #[error("{0}")]
    BadRequest(String),

    /// Business rule violation
    #[error(transparent)]
    Guard(#[from] GuardViolation),

    #[error(transparent)]
    NotFound(DirectoryError),

    /// Backend failure, passed through untouched
    #[error(transparent)]
    Directory(DirectoryError),
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::InvalidFilters(_) => ApiError::BadRequest(err.to_string()),
            other => ApiError::InvalidQuery(other),
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::ZoneNotFound(_) | DirectoryError::RecordSetNotFound(_) => {
                ApiError::NotFound(err)
            }
            other => ApiError::Directory(other),
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::InvalidQuery(_)
            | ApiError::BadRequest(_)
            | ApiError::Guard(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Directory(err) => match err {
                DirectoryError::ZoneNotFound(_) | DirectoryError::RecordSetNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                DirectoryError::MarkerNotFound(_)
                | DirectoryError::InvalidRecordSetLocation(_)
                | DirectoryError::UnsupportedCriterion(_) => StatusCode::BAD_REQUEST,
                DirectoryError::DuplicateRecordSet(_) | DirectoryError::Conflict(_) => {
                    StatusCode::CONFLICT
                }
                DirectoryError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
        }
    }

    /// Stable machine-readable error type
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Validation(ValidationError::InvalidJson(_)) => "invalid_json",
            ApiError::Validation(ValidationError::InvalidIdentifier(_)) => "invalid_uuid",
            ApiError::Validation(_) => "invalid_object",
            ApiError::InvalidQuery(QueryError::InvalidLimit(_)) => "invalid_limit",
            ApiError::InvalidQuery(QueryError::InvalidSortKey(_)) => "invalid_sort_key",
            ApiError::InvalidQuery(QueryError::InvalidSortDir(_)) => "invalid_sort_dir",
            ApiError::InvalidQuery(QueryError::InvalidMarker(_)) => "invalid_marker",
            ApiError::InvalidQuery(QueryError::InvalidFilters(_)) => "bad_request",
            ApiError::BadRequest(_) | ApiError::Guard(_) => "bad_request",
            ApiError::NotFound(DirectoryError::ZoneNotFound(_)) => "zone_not_found",
            ApiError::NotFound(_) => "recordset_not_found",
            ApiError::Directory(err) => match err {
                DirectoryError::ZoneNotFound(_) => "zone_not_found",
                DirectoryError::RecordSetNotFound(_) => "recordset_not_found",
                DirectoryError::MarkerNotFound(_) => "marker_not_found",
                DirectoryError::InvalidRecordSetLocation(_) => "invalid_recordset_location",
                DirectoryError::UnsupportedCriterion(_) => "bad_request",
                DirectoryError::DuplicateRecordSet(_) => "duplicate_recordset",
                DirectoryError::Conflict(_) => "conflict",
                DirectoryError::Unavailable(_) => "service_unavailable",
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        let body = json!({
            "code": status.as_u16(),
            "type": self.error_type(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
