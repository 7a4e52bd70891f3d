//! # AppError
//!
//! Centralized error handling for EduTrack.
//! Every port and service returns this type; adapters translate it to their
//! own transport (HTTP status codes, log levels).

use serde::Serialize;
use thiserror::Error;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// The primary error type for all EduTrack operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., Student, Assignment, Notification)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Business-rule failure that is the caller's fault (e.g., locked attendance sheet)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Request body failed field validation
    #[error("validation failed on {} field(s)", .0.len())]
    InvalidFields(Vec<FieldError>),

    /// Missing or bad credentials / token
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but the role or ownership check failed
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Too many failed logins; carries the lock expiry
    #[error("account locked until {0}")]
    AccountLocked(chrono::DateTime<chrono::Utc>),

    /// Resource already exists (e.g., duplicate email, parent already linked)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Rate limit exceeded
    #[error("too many requests: {0}")]
    RateLimitExceeded(String),

    /// Infrastructure failure (e.g., DB down, upstream verifier unreachable)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        AppError::NotFound(entity.to_string(), id.to_string())
    }

    pub fn invalid_field(field: &str, message: &str) -> Self {
        AppError::InvalidFields(vec![FieldError::new(field, message)])
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("serialization: {err}"))
    }
}

/// A specialized Result type for EduTrack logic.
pub type Result<T> = std::result::Result<T, AppError>;
