use libris_http::error::AppError;
use thiserror::Error;

use super::store::StoreError;

/// Failures of catalog operations
#[derive(Error, Debug)]
pub enum BookError {
    /// Malformed or missing input, or an illegal status transition
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// ISBN collision
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(anyhow::Error),
}

impl BookError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound("Book not found".to_string())
    }

    pub fn isbn_conflict() -> Self {
        Self::Conflict("ISBN already exists".to_string())
    }
}

impl From<StoreError> for BookError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation => BookError::isbn_conflict(),
            other => BookError::Internal(anyhow::Error::new(other)),
        }
    }
}

impl From<BookError> for AppError {
    fn from(err: BookError) -> Self {
        match err {
            BookError::Validation(message) => AppError::validation(message),
            BookError::NotFound(message) => AppError::not_found(message),
            BookError::Conflict(message) => AppError::conflict(message),
            BookError::Internal(err) => AppError::Internal(err),
        }
    }
}
