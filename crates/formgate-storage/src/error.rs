//! Storage operation errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("List failed: {0}")]
    ListFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for formgate_core::AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ValidationFailed(msg) => formgate_core::AppError::FileUploadFailed(msg),
            other => formgate_core::AppError::Storage(other.to_string()),
        }
    }
}
