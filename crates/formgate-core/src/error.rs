//! Error types module
//!
//! All errors surfaced by the ingestion plane are unified under the `AppError`
//! enum. Each variant carries its HTTP presentation through the
//! `ErrorMetadata` trait so handlers never hand-pick status codes.

use crate::crypto::CryptoError;
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like inactive forms
    Debug,
    /// Warning level - for recoverable issues like payload bounds
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented.
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "FORM_NOT_FOUND")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether internal details must be hidden from the response
    fn is_sensitive(&self) -> bool;

    /// Whether an alert should fire for this error
    fn should_alert(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Form not found")]
    FormNotFound,

    #[error("Form is inactive")]
    FormInactive,

    #[error("Organization is paused")]
    SpacePaused,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("CAPTCHA token required")]
    CaptchaRequired,

    #[error("CAPTCHA verification failed: {0}")]
    CaptchaFailed(String),

    #[error("File upload failed: {0}")]
    FileUploadFailed(String),

    #[error("Free trial submission limit reached")]
    SubmissionLimitReached,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Credential decryption failed: {0}")]
    Crypto(#[source] CryptoError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<CryptoError> for AppError {
    fn from(err: CryptoError) -> Self {
        AppError::Crypto(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidRequest(format!("JSON parsing error: {}", err))
    }
}

/// Static metadata per variant:
/// (http_status, error_code, recoverable, sensitive, alert, log_level).
/// client_message stays per-variant for dynamic content.
fn static_metadata(err: &AppError) -> (u16, &'static str, bool, bool, bool, LogLevel) {
    match err {
        AppError::Database(_) => (503, "DATABASE_ERROR", true, true, true, LogLevel::Error),
        AppError::Storage(_) => (503, "STORAGE_ERROR", true, true, true, LogLevel::Error),
        AppError::FormNotFound => (404, "FORM_NOT_FOUND", false, false, false, LogLevel::Debug),
        AppError::FormInactive => (403, "FORM_INACTIVE", false, false, false, LogLevel::Debug),
        AppError::SpacePaused => (403, "SPACE_PAUSED", false, false, false, LogLevel::Debug),
        AppError::InvalidRequest(_) => {
            (400, "INVALID_REQUEST", false, false, false, LogLevel::Debug)
        }
        AppError::CaptchaRequired => {
            (400, "CAPTCHA_REQUIRED", false, false, false, LogLevel::Debug)
        }
        AppError::CaptchaFailed(_) => (403, "CAPTCHA_FAILED", false, false, false, LogLevel::Debug),
        AppError::FileUploadFailed(_) => {
            (400, "FILE_UPLOAD_FAILED", false, false, false, LogLevel::Warn)
        }
        AppError::SubmissionLimitReached => (
            403,
            "SUBMISSION_LIMIT_REACHED",
            false,
            false,
            false,
            LogLevel::Debug,
        ),
        AppError::RateLimitExceeded => (
            429,
            "RATE_LIMIT_EXCEEDED",
            true,
            false,
            false,
            LogLevel::Debug,
        ),
        AppError::Unauthorized(_) => (401, "UNAUTHORIZED", false, false, false, LogLevel::Debug),
        AppError::NotFound(_) => (404, "NOT_FOUND", false, false, false, LogLevel::Debug),
        // A decryption failure means a mis-provisioned tenant; treat as infrastructure.
        AppError::Crypto(_) => (500, "INTERNAL_ERROR", false, true, true, LogLevel::Error),
        AppError::Internal(_) => (500, "INTERNAL_ERROR", true, true, true, LogLevel::Error),
        AppError::InternalWithSource { .. } => {
            (500, "INTERNAL_ERROR", true, true, true, LogLevel::Error)
        }
    }
}

impl AppError {
    /// Get the error type name for structured logging
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::FormNotFound => "FormNotFound",
            AppError::FormInactive => "FormInactive",
            AppError::SpacePaused => "SpacePaused",
            AppError::InvalidRequest(_) => "InvalidRequest",
            AppError::CaptchaRequired => "CaptchaRequired",
            AppError::CaptchaFailed(_) => "CaptchaFailed",
            AppError::FileUploadFailed(_) => "FileUploadFailed",
            AppError::SubmissionLimitReached => "SubmissionLimitReached",
            AppError::RateLimitExceeded => "RateLimitExceeded",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::NotFound(_) => "NotFound",
            AppError::Crypto(_) => "Crypto",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Detailed message including the source chain, for internal logs only.
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();
        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        static_metadata(self).2
    }

    fn is_sensitive(&self) -> bool {
        static_metadata(self).3
    }

    fn should_alert(&self) -> bool {
        static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Unable to connect to form database".to_string(),
            AppError::Storage(_) => "File storage is not available".to_string(),
            AppError::FormNotFound => "Form not found".to_string(),
            AppError::FormInactive => {
                "This form is no longer accepting submissions".to_string()
            }
            AppError::SpacePaused => "This form is temporarily unavailable".to_string(),
            AppError::InvalidRequest(msg) => msg.clone(),
            AppError::CaptchaRequired => "CAPTCHA verification is required".to_string(),
            AppError::CaptchaFailed(_) => {
                "CAPTCHA verification failed. Please try again.".to_string()
            }
            AppError::FileUploadFailed(msg) => msg.clone(),
            AppError::SubmissionLimitReached => {
                "Free trial submission limit reached. Connect your own infrastructure for unlimited submissions."
                    .to_string()
            }
            AppError::RateLimitExceeded => {
                "Too many submissions. Please slow down.".to_string()
            }
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Crypto(_) => "Internal server error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_database() {
        let err = AppError::from(sqlx::Error::PoolClosed);
        assert_eq!(err.http_status_code(), 503);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert!(err.is_recoverable());
        assert!(err.is_sensitive());
        assert!(err.should_alert());
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_error_metadata_client_errors_never_alert() {
        let errors = [
            AppError::FormNotFound,
            AppError::FormInactive,
            AppError::SpacePaused,
            AppError::InvalidRequest("bad".into()),
            AppError::CaptchaRequired,
            AppError::CaptchaFailed("timeout-or-duplicate".into()),
            AppError::FileUploadFailed("too large".into()),
            AppError::SubmissionLimitReached,
            AppError::RateLimitExceeded,
        ];
        for err in errors {
            assert!(!err.should_alert(), "{} must not alert", err.error_code());
            assert!(err.http_status_code() < 500);
        }
    }

    #[test]
    fn test_error_metadata_status_codes() {
        assert_eq!(AppError::FormNotFound.http_status_code(), 404);
        assert_eq!(AppError::FormInactive.error_code(), "FORM_INACTIVE");
        assert_eq!(AppError::SpacePaused.error_code(), "SPACE_PAUSED");
        assert_eq!(AppError::SubmissionLimitReached.http_status_code(), 403);
        assert_eq!(AppError::RateLimitExceeded.http_status_code(), 429);
        assert_eq!(AppError::CaptchaRequired.http_status_code(), 400);
        assert_eq!(AppError::CaptchaFailed("x".into()).http_status_code(), 403);
    }

    #[test]
    fn test_crypto_errors_are_sensitive_and_alert() {
        let err = AppError::Crypto(CryptoError::AuthenticationFailure);
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
        assert!(err.is_sensitive());
        assert!(err.should_alert());
        assert_eq!(err.client_message(), "Internal server error");
    }

    #[test]
    fn test_detailed_message_includes_source() {
        let err = AppError::InternalWithSource {
            message: "outer".to_string(),
            source: anyhow::anyhow!("inner cause"),
        };
        let details = err.detailed_message();
        assert!(details.contains("Caused by: inner cause"));
    }
}
