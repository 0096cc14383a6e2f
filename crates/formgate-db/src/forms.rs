//! Form configuration lookup.
//!
//! Runs against whichever pool the pipeline selected: the tenant's own
//! database in BYOI mode, the platform database in free-trial mode.

use formgate_core::models::FormConfig;
use formgate_core::AppError;
use sqlx::PgPool;

pub async fn get_form_config(pool: &PgPool, form_id: &str) -> Result<Option<FormConfig>, AppError> {
    let config = sqlx::query_as::<_, FormConfig>(
        r#"
        SELECT id,
               name,
               "isActive" AS is_active,
               "allowFileUploads" AS allow_file_uploads,
               "maxFileCount" AS max_file_count,
               "maxFileSize" AS max_file_size,
               "allowedFileTypes" AS allowed_file_types,
               "spamCheckEnabled" AS spam_check_enabled,
               "honeypotFieldName" AS honeypot_field_name,
               "webhookUrl" AS webhook_url,
               "sendEmailNotifications" AS send_email_notifications,
               "notificationEmails" AS notification_emails,
               "responseType" AS response_type,
               "redirectUrl" AS redirect_url,
               "successMessage" AS success_message,
               "organizationId" AS organization_id
        FROM form
        WHERE id = $1
        "#,
    )
    .bind(form_id)
    .fetch_optional(pool)
    .await?;

    Ok(config)
}
