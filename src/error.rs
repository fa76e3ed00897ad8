//! Structured error types surfaced to dashboard and API callers.

use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (4xx-like)
    MissingRequiredField,
    InvalidFieldValue,

    // Not found errors
    NotFound,

    // Conflict errors
    AlreadyExists,
    Conflict,

    // Internal errors
    ConnectionUnavailable,
    DatabaseError,
    InternalError,
}

/// Structured error with a human-readable message.
#[derive(Debug, Serialize)]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    // Convenience constructors

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("{} is required", field),
        )
        .with_field(field)
    }

    pub fn invalid_value(field: &str, reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidFieldValue, reason).with_field(field)
    }

    pub fn not_found(what: &str, id: impl fmt::Display) -> Self {
        Self::new(ErrorCode::NotFound, format!("{} not found: {}", what, id))
    }

    pub fn already_exists(what: &str, name: &str) -> Self {
        Self::new(
            ErrorCode::AlreadyExists,
            format!("{} already exists: {}", what, name),
        )
    }

    pub fn conflict(expected: i64, actual: i64) -> Self {
        Self::new(
            ErrorCode::Conflict,
            format!(
                "Status was changed by someone else (expected version {}, found {})",
                expected, actual
            ),
        )
    }

    pub fn connection_unavailable(err: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::ConnectionUnavailable,
            format!("Database unavailable: {}", err),
        )
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<AppError>() {
            Ok(app_err) => app_err,
            Err(err) => match err.downcast::<rusqlite::Error>() {
                Ok(sql_err) => AppError::database(sql_err),
                Err(err) => AppError::internal(err),
            },
        }
    }
}

/// Result type for operations surfaced to callers.
pub type AppResult<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_code_in_screaming_case() {
        let err = AppError::invalid_value("sector", "Unknown sector: X");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "INVALID_FIELD_VALUE");
        assert_eq!(json["field"], "sector");
    }

    #[test]
    fn test_anyhow_round_trip_keeps_code() {
        let err: anyhow::Error = AppError::conflict(2, 3).into();
        let app: AppError = err.into();
        assert_eq!(app.code, ErrorCode::Conflict);
    }

    #[test]
    fn test_sqlite_errors_become_database_errors() {
        let err: anyhow::Error = rusqlite::Error::QueryReturnedNoRows.into();
        let app: AppError = err.into();
        assert_eq!(app.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn test_other_errors_become_internal() {
        let app: AppError = anyhow::anyhow!("boom").into();
        assert_eq!(app.code, ErrorCode::InternalError);
        assert_eq!(app.to_string(), "boom");
    }
}
