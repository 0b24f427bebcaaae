//! Application-wide error types.
//!
//! Domain crates keep their own error enums and convert into `AppError` at the
//! boundary where a request layer needs a status code and a stable error code.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Business rule violation.
    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    /// Conflict (e.g., duplicate entry, concurrent update).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::BusinessRule(_) => 422,
            Self::Conflict(_) => 409,
            Self::Configuration(_) | Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::BusinessRule(_) => "BUSINESS_RULE_VIOLATION",
            Self::Conflict(_) => "CONFLICT",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}
