//! HTTP error response conversion.
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`; `AppError`
//! converts into `HttpAppError` so every error renders with the same status,
//! body shape, and logging.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use formgate_core::{AppError, ErrorMetadata, LogLevel};
use serde::Serialize;
use utoipa::ToSchema;

/// Public error body: `error` carries the machine-readable code.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// Wrapper so the external `IntoResponse` trait can be implemented for the
/// external `AppError` type.
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type, "Request failed");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type, "Request failed");
        }
        LogLevel::Error => {
            tracing::error!(
                error = %error.detailed_message(),
                error_type,
                "Request failed"
            );
        }
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        log_error(app_error);

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // client_message never carries internal detail for sensitive errors
        let body = ErrorBody {
            error: app_error.error_code().to_string(),
            message: app_error.client_message(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_shape() {
        let body = ErrorBody {
            error: "FORM_NOT_FOUND".to_string(),
            message: "Form not found".to_string(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"], "FORM_NOT_FOUND");
        assert_eq!(json["message"], "Form not found");
        assert_eq!(json.as_object().unwrap().len(), 2);
    }

    #[test]
    fn sensitive_errors_hide_detail() {
        let err = HttpAppError(AppError::Internal(
            "connection to 10.0.0.3 refused".to_string(),
        ));
        assert_eq!(err.0.client_message(), "Internal server error");
    }
}
