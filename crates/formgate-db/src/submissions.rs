//! Submission writes and the queries the quota gate and cleanup workers need.
//!
//! These run against whichever pool holds the form's data plane, so they are
//! free functions over a `PgPool` rather than a pool-owning repository.

use formgate_core::models::NewSubmission;
use formgate_core::AppError;
use sqlx::PgPool;

/// A submission selected for retention cleanup.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ExpiredSubmission {
    pub id: String,
    pub form_id: String,
    pub files: Option<serde_json::Value>,
}

/// Insert the submission row. Single statement; no transaction required.
pub async fn insert_submission(pool: &PgPool, submission: &NewSubmission) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO submission (
            id, "formId", email, name, status, "isRead", "isClosed",
            data, files, "ipAddress", "userAgent", referer, "isSpam", "spamReason",
            "createdAt", "updatedAt"
        ) VALUES (
            $1, $2, $3, $4, 'new', false, false, $5, $6, $7, $8, $9, $10, $11,
            $12, $12
        )
        "#,
    )
    .bind(submission.id.to_string())
    .bind(&submission.form_id)
    .bind(&submission.email)
    .bind(&submission.name)
    .bind(&submission.data)
    .bind(&submission.files)
    .bind(&submission.ip_address)
    .bind(&submission.user_agent)
    .bind(&submission.referer)
    .bind(submission.is_spam)
    .bind(&submission.spam_reason)
    .bind(submission.submitted_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Count non-spam submissions for a form. Drives the free-trial quota gate;
/// spam rows never advance this counter.
pub async fn count_non_spam(pool: &PgPool, form_id: &str) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM submission WHERE "formId" = $1 AND "isSpam" = false"#,
    )
    .bind(form_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Record that the notification email went out for a submission.
pub async fn mark_email_sent(pool: &PgPool, submission_id: &str) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE submission
        SET "emailSent" = true, "emailSentAt" = NOW(), "updatedAt" = NOW()
        WHERE id = $1
        "#,
    )
    .bind(submission_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Whether a submission row exists and is not soft-deleted. Used by the
/// orphan scanner to decide ownership of a storage key.
pub async fn exists_live(pool: &PgPool, submission_id: &str) -> Result<bool, AppError> {
    let exists: bool = sqlx::query_scalar(
        r#"SELECT EXISTS(SELECT 1 FROM submission WHERE id = $1 AND "deletedAt" IS NULL)"#,
    )
    .bind(submission_id)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Select up to `batch_size` non-deleted submissions older than
/// `retention_days` that belong to free-trial tenants (no active paid
/// subscription on the organization's owner).
pub async fn select_expired_free_trial(
    pool: &PgPool,
    retention_days: i32,
    batch_size: i32,
) -> Result<Vec<ExpiredSubmission>, AppError> {
    let rows = sqlx::query_as::<_, ExpiredSubmission>(
        r#"
        SELECT s.id, s."formId" AS form_id, s.files
        FROM submission s
        JOIN form f ON s."formId" = f.id
        JOIN organization o ON f."organizationId" = o.id
        LEFT JOIN subscription sub
            ON sub."tenantId" = o."createdBy" AND sub.status = 'active' AND sub.tier = 'pro'
        WHERE sub.id IS NULL
          AND s."createdAt" < NOW() - ($1 * INTERVAL '1 day')
          AND s."deletedAt" IS NULL
        LIMIT $2
        "#,
    )
    .bind(retention_days)
    .bind(batch_size)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Soft-delete a submission row.
pub async fn soft_delete(pool: &PgPool, submission_id: &str) -> Result<(), AppError> {
    sqlx::query(r#"UPDATE submission SET "deletedAt" = NOW() WHERE id = $1"#)
        .bind(submission_id)
        .execute(pool)
        .await?;

    Ok(())
}
