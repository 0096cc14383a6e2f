//! Notification dispatch: tenant mail provider first, platform fallback with
//! the monthly cap.
//!
//! Runs detached from the request; nothing here ever affects the client
//! response. The platform email counter is incremented only for platform
//! sends, and only after the send succeeded.

use crate::state::AppState;
use chrono::{DateTime, Utc};
use formgate_core::models::{FormConfig, TenantConnection, UploadedFile};
use formgate_mail::{parse_recipients, render, FileAttachment, SubmissionNotification};
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

const NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(30);
const PLATFORM_EMAIL_MONTHLY_CAP: i32 = 1000;

/// Everything dispatch needs, captured at the end of the pipeline.
pub struct NotificationJob {
    pub tenant_id: String,
    pub connection: Option<TenantConnection>,
    pub form: FormConfig,
    pub submission_id: String,
    pub form_data: serde_json::Map<String, Value>,
    pub files: Vec<UploadedFile>,
    pub submitted_at: DateTime<Utc>,
    /// Pool holding the submission row (tenant or platform).
    pub data_pool: PgPool,
}

pub async fn dispatch_notification(state: Arc<AppState>, job: NotificationJob) {
    if tokio::time::timeout(NOTIFICATION_TIMEOUT, dispatch_inner(&state, &job))
        .await
        .is_err()
    {
        tracing::error!(
            submission_id = %job.submission_id,
            form_id = %job.form.id,
            "Notification dispatch timed out"
        );
    }
}

async fn dispatch_inner(state: &AppState, job: &NotificationJob) {
    let recipients = job
        .form
        .notification_emails
        .as_deref()
        .map(parse_recipients)
        .unwrap_or_default();
    if recipients.is_empty() {
        return;
    }

    let rendered = render::render(
        state.config.app_url(),
        &SubmissionNotification {
            form_id: job.form.id.clone(),
            form_name: job.form.name.clone(),
            submission_id: job.submission_id.clone(),
            organization_id: job.form.organization_id.clone(),
            form_data: job.form_data.clone(),
            files: job
                .files
                .iter()
                .map(|f| FileAttachment {
                    name: f.name.clone(),
                    url: f.url.clone(),
                    size: f.size,
                })
                .collect(),
            submitted_at: job.submitted_at,
        },
    );

    let mut sent = false;

    // Tenant provider first: no monthly cap applies to their own sender.
    if let Some(conn) = job.connection.as_ref().filter(|c| c.has_byo_mail()) {
        match send_via_tenant_provider(state, conn, &recipients, &rendered).await {
            Ok(()) => {
                tracing::info!(
                    form_id = %job.form.id,
                    submission_id = %job.submission_id,
                    recipient_count = recipients.len(),
                    "Notification email sent via tenant provider"
                );
                sent = true;
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    form_id = %job.form.id,
                    submission_id = %job.submission_id,
                    "Tenant email send failed, falling back to platform"
                );
            }
        }
    }

    if !sent {
        if !send_via_platform(state, job, &recipients, &rendered).await {
            return;
        }
    }

    if let Err(err) =
        formgate_db::submissions::mark_email_sent(&job.data_pool, &job.submission_id).await
    {
        tracing::warn!(
            error = %err,
            submission_id = %job.submission_id,
            "Failed to update emailSent status"
        );
    }
}

async fn send_via_tenant_provider(
    state: &AppState,
    conn: &TenantConnection,
    recipients: &[String],
    rendered: &formgate_mail::RenderedNotification,
) -> Result<(), anyhow::Error> {
    let provider_type = conn
        .email_provider
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("no provider type"))?;
    let config_json = state
        .cipher
        .decrypt(conn.email_config_encrypted.as_deref().unwrap_or_default())?;

    let provider = state
        .mail_providers
        .get_provider(&conn.tenant_id, provider_type, &config_json)
        .await?;

    provider
        .send(
            recipients,
            &rendered.subject,
            &rendered.html_body,
            &rendered.text_body,
        )
        .await?;

    Ok(())
}

/// Platform path: capped at 1000 sends per tenant per 30-day window. Returns
/// whether the message went out.
async fn send_via_platform(
    state: &AppState,
    job: &NotificationJob,
    recipients: &[String],
    rendered: &formgate_mail::RenderedNotification,
) -> bool {
    let count = match state.catalog.get_platform_email_count(&job.tenant_id).await {
        Ok(count) => count,
        Err(err) => {
            tracing::error!(error = %err, tenant_id = %job.tenant_id, "Failed to check email cap");
            return false;
        }
    };
    if count >= PLATFORM_EMAIL_MONTHLY_CAP {
        tracing::info!(
            tenant_id = %job.tenant_id,
            count,
            "Email monthly cap reached, skipping notification"
        );
        return false;
    }

    let Some(provider) = state.platform_mail.as_ref() else {
        tracing::error!("Platform mail provider not configured");
        return false;
    };

    if let Err(err) = provider
        .send(
            recipients,
            &rendered.subject,
            &rendered.html_body,
            &rendered.text_body,
        )
        .await
    {
        tracing::error!(
            error = %err,
            form_id = %job.form.id,
            submission_id = %job.submission_id,
            "Failed to send notification email"
        );
        return false;
    }

    tracing::info!(
        form_id = %job.form.id,
        submission_id = %job.submission_id,
        recipient_count = recipients.len(),
        "Notification email sent via platform provider"
    );

    // Only platform sends consume the cap, and only after success.
    if let Err(err) = state
        .catalog
        .increment_platform_email_count(&job.tenant_id)
        .await
    {
        tracing::warn!(error = %err, tenant_id = %job.tenant_id, "Failed to increment email counter");
    }

    true
}
