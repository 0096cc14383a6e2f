//! The submission pipeline: the staged evaluation of a public form POST
//! against routing, tenant isolation, spam signals, quotas, storage, and
//! persistence.
//!
//! Stage order is a contract: spam evaluation precedes quota, upload, and
//! persistence; CAPTCHA precedes quota and upload; persistence strictly
//! follows upload. Spam submissions receive a success response
//! indistinguishable from the real one.

use crate::alerts::Alert;
use crate::error::{ErrorBody, HttpAppError};
use crate::middleware::spam::SpamMarker;
use crate::services::notify::{self, NotificationJob};
use crate::state::AppState;
use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use formgate_core::models::{FormConfig, NewSubmission, TenantConnection, TenantMode};
use formgate_core::{AppError, ErrorMetadata};
use formgate_storage::{
    FileValidationConfig, IncomingFile, ObjectStoreClient, TenantStorageConfig,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use utoipa::ToSchema;
use uuid::Uuid;

const PIPELINE_TIMEOUT: Duration = Duration::from_secs(15);
const MULTIPART_MEMORY_LIMIT: usize = 32 * 1024 * 1024;

const MAX_FIELDS: usize = 100;
const MAX_FIELD_SIZE: usize = 64 * 1024;
const MAX_TOTAL_PAYLOAD: usize = 1024 * 1024;

const FREE_TRIAL_MAX_SUBMISSIONS: i64 = 50;

/// CAPTCHA token fields, in preference order.
const CAPTCHA_TOKEN_FIELDS: [&str; 4] = [
    "cf-turnstile-response",
    "g-recaptcha-response",
    "h-captcha-response",
    "captcha-token",
];

const DEFAULT_SUCCESS_MESSAGE: &str = "Thank you! Your submission has been received.";

#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
    pub submission_id: String,
}

/// Public form submission endpoint.
#[utoipa::path(
    post,
    path = "/forms/{form_id}",
    tag = "submissions",
    params(("form_id" = String, Path, description = "Public form identifier")),
    responses(
        (status = 200, description = "Submission accepted", body = SubmitResponse),
        (status = 302, description = "Redirect per form response policy"),
        (status = 400, description = "Invalid request, payload bounds, CAPTCHA required, or file upload failed", body = ErrorBody),
        (status = 403, description = "Inactive form, paused organization, CAPTCHA failed, or quota reached", body = ErrorBody),
        (status = 404, description = "Unknown form", body = ErrorBody),
        (status = 429, description = "Rate limit exceeded", body = ErrorBody),
        (status = 503, description = "Database or storage unavailable", body = ErrorBody)
    )
)]
pub async fn submit_form(
    State(state): State<Arc<AppState>>,
    Path(form_id): Path<String>,
    request: Request,
) -> Response {
    let started = Instant::now();
    let client_ip = crate::middleware::client_ip(&state, &request);
    let spam_marker = request.extensions().get::<SpamMarker>().cloned();

    let outcome = tokio::time::timeout(
        PIPELINE_TIMEOUT,
        run_pipeline(&state, &form_id, &client_ip, spam_marker, request, started),
    )
    .await;

    match outcome {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => fail(&state, &form_id, err),
        Err(_) => fail(
            &state,
            &form_id,
            AppError::Internal("submission pipeline timed out".to_string()),
        ),
    }
}

/// Render a pipeline error, emitting an alert for infrastructure failures.
fn fail(state: &AppState, form_id: &str, err: AppError) -> Response {
    if err.should_alert() {
        state.alerts.send(Alert::from_app_error(
            &err,
            vec![("Form ID".to_string(), form_id.to_string())],
        ));
    }
    HttpAppError(err).into_response()
}

async fn run_pipeline(
    state: &Arc<AppState>,
    form_id: &str,
    client_ip: &str,
    spam_marker: Option<SpamMarker>,
    request: Request,
    started: Instant,
) -> Result<Response, AppError> {
    // Stage 1: resolve the routing endpoint
    let endpoint = state
        .catalog
        .get_form_endpoint(form_id)
        .await?
        .ok_or(AppError::FormNotFound)?;
    if !endpoint.is_active {
        return Err(AppError::FormInactive);
    }

    // Stage 2: organization gate
    if state
        .catalog
        .is_organization_paused(&endpoint.organization_id)
        .await?
    {
        return Err(AppError::SpacePaused);
    }

    // Stage 3: tenant mode. A missing connection row means free trial.
    let connection = state
        .catalog
        .get_tenant_connection(&endpoint.tenant_id)
        .await?;
    let mode = connection
        .as_ref()
        .map(TenantConnection::mode)
        .unwrap_or(TenantMode::FreeTrial);

    // Stage 4: acquire the write pool
    let data_pool = match mode {
        TenantMode::FreeTrial => {
            tracing::debug!(tenant_id = %endpoint.tenant_id, "Using platform database (free trial)");
            state.platform_pool.clone()
        }
        TenantMode::Byoi => {
            let Some(conn) = connection.as_ref() else {
                return Err(AppError::Internal(
                    "BYOI mode without a connection row".to_string(),
                ));
            };
            let encrypted = conn.db_connection_string_encrypted.as_deref().ok_or_else(|| {
                AppError::Internal("tenant database connection string missing".to_string())
            })?;
            let conn_string = state.cipher.decrypt(encrypted)?;
            state
                .tenant_pools
                .get_pool(&endpoint.tenant_id, &conn_string)
                .await?
        }
    };

    // Stage 5: load the form configuration from the chosen pool
    let form = formgate_db::forms::get_form_config(&data_pool, form_id)
        .await?
        .ok_or(AppError::FormNotFound)?;
    if !form.is_active {
        return Err(AppError::FormInactive);
    }

    // Stage 6: parse the body (multipart or JSON object)
    let headers = request.headers().clone();
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let (mut form_data, files) = parse_body(request, &content_type).await?;

    // Stage 7: payload bounds
    validate_payload_bounds(&form_data)?;

    // Stage 8: spam evaluation. Recorded, not short-circuiting: spam rows are
    // persisted for review and get the normal success response.
    let mut is_spam = false;
    let mut spam_reason: Option<String> = None;

    if honeypot_triggered(&form, &form_data) {
        is_spam = true;
        spam_reason = Some("honeypot_filled".to_string());
        tracing::info!(form_id = %form_id, "Spam detected: honeypot filled");
    }

    if let Some(marker) = spam_marker {
        is_spam = true;
        spam_reason = Some(marker.reason);
        tracing::info!(form_id = %form_id, ip = %client_ip, "Spam detected: IP blocklist");
    }

    // Stage 9: CAPTCHA verification
    if !is_spam {
        if let Some(conn) = connection.as_ref() {
            if !conn.spam_provider.is_empty()
                && conn.spam_provider != "honeypot"
                && conn.spam_secret_key_encrypted.is_some()
            {
                let token = take_captcha_token(&mut form_data).ok_or(AppError::CaptchaRequired)?;
                let secret = state
                    .cipher
                    .decrypt(conn.spam_secret_key_encrypted.as_deref().unwrap_or_default())?;
                let outcome = state
                    .captcha
                    .verify(&conn.spam_provider, &secret, &token, client_ip)
                    .await;
                if !outcome.success {
                    return Err(AppError::CaptchaFailed(
                        outcome.error.unwrap_or_else(|| "verification failed".to_string()),
                    ));
                }
            }
        }
    }

    // Stage 10: free-trial quota. The count-then-insert window can overshoot
    // slightly under concurrency; quota is a soft ceiling. Count errors fail
    // open rather than blocking legitimate submissions.
    if !is_spam && mode == TenantMode::FreeTrial {
        match formgate_db::submissions::count_non_spam(&data_pool, form_id).await {
            Ok(count) if count >= FREE_TRIAL_MAX_SUBMISSIONS => {
                return Err(AppError::SubmissionLimitReached);
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, form_id = %form_id, "Quota check failed, allowing submission");
            }
        }
    }

    if is_spam {
        tracing::info!(
            form_id = %form_id,
            spam_reason = spam_reason.as_deref().unwrap_or(""),
            ip = %client_ip,
            "Spam detected - will save for review"
        );
    }

    // Stage 11: allocate the submission identity, fixed from here on
    let submission_id = Uuid::new_v4();
    let submitted_at = Utc::now();

    // Stage 12: file upload (skipped on the spam path)
    let mut uploaded_files = Vec::new();
    if !is_spam && form.allow_file_uploads && !files.is_empty() {
        let client = storage_client_for(state, mode, connection.as_ref()).await?;
        let validation = validation_config(&form);
        uploaded_files = client
            .upload_files(form_id, &submission_id.to_string(), &files, &validation)
            .await?;
    }

    // Stage 13: persist the submission
    let files_json = if uploaded_files.is_empty() {
        None
    } else {
        Some(serde_json::to_value(&uploaded_files)?)
    };

    let submission = NewSubmission {
        id: submission_id,
        form_id: form_id.to_string(),
        email: extract_string_field(&form_data, "email"),
        name: extract_string_field(&form_data, "name"),
        data: Value::Object(form_data.clone()),
        files: files_json,
        ip_address: client_ip.to_string(),
        user_agent: header_value(&headers, header::USER_AGENT),
        referer: header_value(&headers, header::REFERER),
        is_spam,
        spam_reason: spam_reason.clone(),
        submitted_at,
    };

    if let Err(err) = formgate_db::submissions::insert_submission(&data_pool, &submission).await {
        // Uploaded files now have no owning row; the orphan scanner reclaims
        // them.
        if !uploaded_files.is_empty() {
            tracing::warn!(
                submission_id = %submission_id,
                file_count = uploaded_files.len(),
                "Submission insert failed after upload; files left for orphan scan"
            );
        }
        return Err(err);
    }

    tracing::info!(
        form_id = %form_id,
        submission_id = %submission_id,
        file_count = uploaded_files.len(),
        is_spam,
        processing_time_ms = started.elapsed().as_millis() as u64,
        "Submission processed"
    );

    // Stage 15 (detached): notification. Never affects the client response.
    if !is_spam && form.send_email_notifications && form.notification_emails.is_some() {
        let job = NotificationJob {
            tenant_id: endpoint.tenant_id.clone(),
            connection: connection.clone(),
            form: form.clone(),
            submission_id: submission_id.to_string(),
            form_data: form_data.clone(),
            files: uploaded_files.clone(),
            submitted_at,
            data_pool: data_pool.clone(),
        };
        tokio::spawn(notify::dispatch_notification(state.clone(), job));
    }

    // Stage 14: respond. Spam responses are indistinguishable from success.
    Ok(success_response(&form, submission_id))
}

fn success_response(form: &FormConfig, submission_id: Uuid) -> Response {
    if form.response_type == "redirect" {
        if let Some(url) = form.redirect_url.as_deref() {
            return (StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response();
        }
    }

    let message = form
        .success_message
        .clone()
        .unwrap_or_else(|| DEFAULT_SUCCESS_MESSAGE.to_string());

    Json(SubmitResponse {
        success: true,
        message,
        submission_id: submission_id.to_string(),
    })
    .into_response()
}

fn header_value(headers: &axum::http::HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Parse the request body into form data plus any carried files. Multipart
/// fields repeated under one name aggregate into an array, matching how HTML
/// multi-selects submit.
async fn parse_body(
    request: Request,
    content_type: &str,
) -> Result<(serde_json::Map<String, Value>, Vec<IncomingFile>), AppError> {
    let mut data = serde_json::Map::new();
    let mut files = Vec::new();

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|_| AppError::InvalidRequest("Invalid form data".to_string()))?;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|_| AppError::InvalidRequest("Invalid form data".to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if let Some(file_name) = field.file_name() {
                let file_name = file_name.to_string();
                let file_content_type = field.content_type().unwrap_or_default().to_string();
                let bytes: Bytes = field
                    .bytes()
                    .await
                    .map_err(|_| AppError::InvalidRequest("Invalid form data".to_string()))?;
                files.push(IncomingFile {
                    name: file_name,
                    content_type: file_content_type,
                    bytes,
                });
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|_| AppError::InvalidRequest("Invalid form data".to_string()))?;
                append_field(&mut data, name, Value::String(value));
            }
        }
    } else {
        let bytes = axum::body::to_bytes(request.into_body(), MULTIPART_MEMORY_LIMIT)
            .await
            .map_err(|_| AppError::InvalidRequest("Invalid form data".to_string()))?;
        let parsed: Value = serde_json::from_slice(&bytes)
            .map_err(|_| AppError::InvalidRequest("Invalid form data".to_string()))?;
        match parsed {
            Value::Object(object) => data = object,
            _ => return Err(AppError::InvalidRequest("Invalid form data".to_string())),
        }
    }

    Ok((data, files))
}

fn append_field(data: &mut serde_json::Map<String, Value>, name: String, value: Value) {
    match data.get_mut(&name) {
        Some(Value::Array(existing)) => existing.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            data.insert(name, value);
        }
    }
}

/// Length of a field's display form, for the payload bounds.
fn stringified_len(value: &Value) -> usize {
    match value {
        Value::String(s) => s.len(),
        other => other.to_string().len(),
    }
}

fn validate_payload_bounds(data: &serde_json::Map<String, Value>) -> Result<(), AppError> {
    if data.len() > MAX_FIELDS {
        return Err(AppError::InvalidRequest(
            "Too many fields in submission".to_string(),
        ));
    }

    let mut total = 0usize;
    for (key, value) in data {
        let len = stringified_len(value);
        if len > MAX_FIELD_SIZE {
            return Err(AppError::InvalidRequest(
                "Field value exceeds maximum size".to_string(),
            ));
        }
        total += key.len() + len;
    }

    if total > MAX_TOTAL_PAYLOAD {
        return Err(AppError::InvalidRequest(
            "Form data exceeds maximum size".to_string(),
        ));
    }

    Ok(())
}

fn honeypot_triggered(form: &FormConfig, data: &serde_json::Map<String, Value>) -> bool {
    if !form.spam_check_enabled {
        return false;
    }
    let Some(field) = form.honeypot_field_name.as_deref() else {
        return false;
    };
    matches!(data.get(field), Some(Value::String(s)) if !s.is_empty())
}

/// Pull the CAPTCHA token out of the form data so it is never persisted.
fn take_captcha_token(data: &mut serde_json::Map<String, Value>) -> Option<String> {
    for field in CAPTCHA_TOKEN_FIELDS {
        if let Some(Value::String(token)) = data.get(field) {
            if !token.is_empty() {
                let token = token.clone();
                data.remove(field);
                return Some(token);
            }
        }
    }
    None
}

fn extract_string_field(data: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match data.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn validation_config(form: &FormConfig) -> FileValidationConfig {
    let mut config = FileValidationConfig::default();
    if let Some(max_size) = form.max_file_size {
        config.max_file_size = max_size as i64;
    }
    if let Some(max_count) = form.max_file_count {
        config.max_file_count = max_count.max(0) as usize;
    }
    config.allowed_mime_types = form.allowed_mime_types();
    config
}

/// Resolve the object-store client for the submission's data plane.
async fn storage_client_for(
    state: &AppState,
    mode: TenantMode,
    connection: Option<&TenantConnection>,
) -> Result<ObjectStoreClient, AppError> {
    match mode {
        TenantMode::FreeTrial => state
            .platform_storage
            .clone()
            .ok_or_else(|| AppError::Storage("File storage is not configured".to_string())),
        TenantMode::Byoi => {
            let conn = connection
                .ok_or_else(|| AppError::Storage("storage not configured".to_string()))?;
            if !conn.has_byo_storage() {
                return Err(AppError::Storage("storage not configured".to_string()));
            }
            let config_json = state
                .cipher
                .decrypt(conn.storage_config_encrypted.as_deref().unwrap_or_default())?;
            let config: TenantStorageConfig = serde_json::from_str(&config_json)
                .map_err(|e| AppError::Storage(format!("invalid storage config JSON: {}", e)))?;
            Ok(state
                .tenant_storage
                .get_client(&conn.tenant_id, &config)
                .await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form(spam_check: bool, honeypot: Option<&str>) -> FormConfig {
        FormConfig {
            id: "f1".to_string(),
            name: "Contact".to_string(),
            is_active: true,
            allow_file_uploads: false,
            max_file_count: None,
            max_file_size: None,
            allowed_file_types: None,
            spam_check_enabled: spam_check,
            honeypot_field_name: honeypot.map(String::from),
            webhook_url: None,
            send_email_notifications: false,
            notification_emails: None,
            response_type: "json".to_string(),
            redirect_url: None,
            success_message: None,
            organization_id: "o1".to_string(),
        }
    }

    fn object(pairs: &[(&str, Value)]) -> serde_json::Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn field_count_boundary() {
        let mut data = serde_json::Map::new();
        for i in 0..MAX_FIELDS {
            data.insert(format!("field_{}", i), json!("v"));
        }
        assert!(validate_payload_bounds(&data).is_ok());

        data.insert("one_more".to_string(), json!("v"));
        assert!(validate_payload_bounds(&data).is_err());
    }

    #[test]
    fn field_size_boundary() {
        let exactly = object(&[("f", json!("x".repeat(MAX_FIELD_SIZE)))]);
        assert!(validate_payload_bounds(&exactly).is_ok());

        let over = object(&[("f", json!("x".repeat(MAX_FIELD_SIZE + 1)))]);
        let err = validate_payload_bounds(&over).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_REQUEST");
    }

    #[test]
    fn total_payload_boundary() {
        // 16 fields of 64 KiB values: keys push the total past 1 MiB
        let mut data = serde_json::Map::new();
        let chunk = "x".repeat(MAX_FIELD_SIZE);
        for i in 0..16 {
            data.insert(format!("{:02}", i), json!(chunk.clone()));
        }
        // total = 16 * (2 + 65536) > 1 MiB
        assert!(validate_payload_bounds(&data).is_err());

        let mut data = serde_json::Map::new();
        for i in 0..15 {
            data.insert(format!("{:02}", i), json!(chunk.clone()));
        }
        // total = 15 * (2 + 65536) < 1 MiB
        assert!(validate_payload_bounds(&data).is_ok());
    }

    #[test]
    fn honeypot_only_fires_on_non_empty_string() {
        let f = form(true, Some("website"));
        assert!(honeypot_triggered(&f, &object(&[("website", json!("bad"))])));
        assert!(!honeypot_triggered(&f, &object(&[("website", json!(""))])));
        assert!(!honeypot_triggered(&f, &object(&[("website", json!(123))])));
        assert!(!honeypot_triggered(&f, &object(&[("other", json!("x"))])));
    }

    #[test]
    fn honeypot_requires_spam_check_enabled() {
        let f = form(false, Some("website"));
        assert!(!honeypot_triggered(&f, &object(&[("website", json!("bad"))])));
        let f = form(true, None);
        assert!(!honeypot_triggered(&f, &object(&[("website", json!("bad"))])));
    }

    #[test]
    fn captcha_token_preference_order_and_removal() {
        let mut data = object(&[
            ("g-recaptcha-response", json!("recaptcha-token")),
            ("cf-turnstile-response", json!("turnstile-token")),
            ("message", json!("hi")),
        ]);
        let token = take_captcha_token(&mut data).unwrap();
        assert_eq!(token, "turnstile-token");
        assert!(!data.contains_key("cf-turnstile-response"));
        // Lower-preference token is left in place for a second lookup
        assert!(data.contains_key("g-recaptcha-response"));
    }

    #[test]
    fn captcha_token_absent_when_empty_or_non_string() {
        let mut data = object(&[("captcha-token", json!("")), ("other", json!(1))]);
        assert!(take_captcha_token(&mut data).is_none());
    }

    #[test]
    fn repeated_multipart_fields_collapse_to_arrays() {
        let mut data = serde_json::Map::new();
        append_field(&mut data, "tag".to_string(), json!("a"));
        assert_eq!(data["tag"], json!("a"));
        append_field(&mut data, "tag".to_string(), json!("b"));
        assert_eq!(data["tag"], json!(["a", "b"]));
        append_field(&mut data, "tag".to_string(), json!("c"));
        assert_eq!(data["tag"], json!(["a", "b", "c"]));
    }

    #[test]
    fn email_and_name_extraction_is_stringy_only() {
        let data = object(&[
            ("email", json!("j@x.io")),
            ("name", json!(42)),
        ]);
        assert_eq!(extract_string_field(&data, "email").as_deref(), Some("j@x.io"));
        assert_eq!(extract_string_field(&data, "name"), None);
        assert_eq!(extract_string_field(&data, "missing"), None);
    }

    #[test]
    fn validation_config_defaults_and_overrides() {
        let mut f = form(false, None);
        let config = validation_config(&f);
        assert_eq!(config.max_file_size, 2 * 1024 * 1024);
        assert_eq!(config.max_file_count, 3);
        assert!(config.allowed_mime_types.is_empty());

        f.max_file_size = Some(512 * 1024);
        f.max_file_count = Some(1);
        f.allowed_file_types = Some(r#"["application/pdf"]"#.to_string());
        let config = validation_config(&f);
        assert_eq!(config.max_file_size, 512 * 1024);
        assert_eq!(config.max_file_count, 1);
        assert_eq!(config.allowed_mime_types, vec!["application/pdf"]);
    }

    #[test]
    fn free_trial_quota_constant() {
        assert_eq!(FREE_TRIAL_MAX_SUBMISSIONS, 50);
    }
}
