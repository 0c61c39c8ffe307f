//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Caller identity missing or malformed.
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Caller lacks the permission for this operation.
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Input rejected before any write.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation refused until the caller acts (e.g. forced deletion).
    #[error("Blocked: {0}")]
    Blocked(String),

    /// Concurrent modification; the caller may retry.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Balances and transactions diverged.
    #[error("Data integrity violation: {0}")]
    Integrity(String),

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
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::Blocked(_) | Self::Conflict(_) => 409,
            Self::Database(_) => 503,
            Self::Integrity(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Blocked(_) => "BLOCKED",
            Self::Conflict(_) => "CONFLICT",
            Self::Integrity(_) => "INTEGRITY_VIOLATION",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
