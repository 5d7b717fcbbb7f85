//! # Error Handling
//!
//! A single error type used at every fallible boundary in the platform.
//! It maps to an HTTP status code, logs the internal cause through `tracing`,
//! and never leaks database/filesystem detail to the client.
//!
//! **Never expose internal errors to users.** Database errors, stack traces, and
//! internal implementation details are logged server-side but never sent to clients.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use sea_orm::DbErr;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Platform-wide error type with automatic logging and sanitized responses.
#[derive(Debug)]
pub enum ApiError {
    /// 404 - resource doesn't exist
    NotFound { resource: String, id: Option<String> },
    /// 400 - invalid input, unresolved relation, failed schema validation
    BadRequest { message: String },
    /// 401 - authentication required or failed
    Unauthorized { message: String },
    /// 403 - authenticated but not permitted
    Forbidden { message: String },
    /// 400 - business-rule conflict (unique constraint, ambiguous resolution, etc.)
    ///
    /// The shipped behavior uses 400 rather than 409 for these; see `SPEC_FULL.md` §7/§9.
    Conflict { message: String, details: Option<Value> },
    /// 500 - a component required at startup is missing (e.g. a seeded permission key)
    InternalNotInitialized { message: String },
    /// 500 - a multi-step operation partially committed (e.g. publish committed to the
    /// database but the artifact rename failed)
    PartialFailure { message: String, details: Option<Value> },
    /// 500 - storage or filesystem failure with no further recovery available here
    NetworkOrStorage { message: String, internal: Option<String> },
    /// 500 - database error, logged with full detail, never surfaced to the client
    Database { internal: DbErr },
}

impl ApiError {
    pub fn not_found(resource: impl Into<String>, id: Option<String>) -> Self {
        Self::NotFound { resource: resource.into(), id }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest { message: message.into() }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized { message: message.into() }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden { message: message.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict { message: message.into(), details: None }
    }

    pub fn conflict_with(message: impl Into<String>, details: Value) -> Self {
        Self::Conflict { message: message.into(), details: Some(details) }
    }

    pub fn not_initialized(message: impl Into<String>) -> Self {
        Self::InternalNotInitialized { message: message.into() }
    }

    pub fn partial_failure(message: impl Into<String>, details: Option<Value>) -> Self {
        Self::PartialFailure { message: message.into(), details }
    }

    pub fn storage(message: impl Into<String>, internal: impl Into<String>) -> Self {
        Self::NetworkOrStorage { message: message.into(), internal: Some(internal.into()) }
    }

    pub fn database(err: DbErr) -> Self {
        Self::Database { internal: err }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::Conflict { .. } => StatusCode::BAD_REQUEST,
            Self::InternalNotInitialized { .. }
            | Self::PartialFailure { .. }
            | Self::NetworkOrStorage { .. }
            | Self::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn user_message(&self) -> String {
        match self {
            Self::NotFound { resource, id } => match id {
                Some(id) => format!("{resource} with id '{id}' not found"),
                None => format!("{resource} not found"),
            },
            Self::BadRequest { message }
            | Self::Unauthorized { message }
            | Self::Forbidden { message } => message.clone(),
            Self::Conflict { message, .. } => message.clone(),
            Self::InternalNotInitialized { message } => message.clone(),
            Self::PartialFailure { message, .. } => message.clone(),
            Self::NetworkOrStorage { message, .. } => message.clone(),
            Self::Database { .. } => "A storage error occurred".to_string(),
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            Self::Conflict { details, .. } | Self::PartialFailure { details, .. } => details.clone(),
            _ => None,
        }
    }

    fn log_internal(&self) {
        match self {
            Self::Database { internal } => {
                tracing::error!(error = ?internal, "database error");
            }
            Self::NetworkOrStorage { internal: Some(detail), .. } => {
                tracing::error!(detail = %detail, "storage/filesystem error");
            }
            Self::InternalNotInitialized { message } => {
                tracing::error!(message = %message, "startup invariant missing");
            }
            Self::PartialFailure { message, details } => {
                tracing::error!(message = %message, details = ?details, "partial failure");
            }
            _ => {
                tracing::debug!(status = %self.status_code(), message = %self.user_message(), "rejected request");
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log_internal();
        let status = self.status_code();
        let body = ErrorBody { success: false, message: self.user_message(), details: self.details() };
        (status, Json(body)).into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for ApiError {}

impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        match &err {
            DbErr::RecordNotFound(msg) => Self::not_found("record", Some(msg.clone())),
            other => {
                let text = other.to_string();
                if text.to_lowercase().contains("unique") {
                    Self::conflict("a record with that value already exists")
                } else {
                    Self::database(err)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_has_404() {
        let err = ApiError::not_found("User", Some("42".into()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert!(err.user_message().contains("42"));
    }

    #[test]
    fn conflict_maps_to_400_per_spec_choice() {
        let err = ApiError::conflict("duplicate");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn database_message_never_leaks_internal_detail() {
        let err = ApiError::database(DbErr::Custom("column students.secret leaked".into()));
        assert_eq!(err.user_message(), "A storage error occurred");
    }

    #[test]
    fn unique_constraint_db_error_becomes_conflict() {
        let err: ApiError = DbErr::Custom("UNIQUE constraint failed: records.id".into()).into();
        assert!(matches!(err, ApiError::Conflict { .. }));
    }
}
