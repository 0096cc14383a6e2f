//! The four background workers: submission-file delete, form-file delete,
//! retention cleanup, orphan scan.
//!
//! Every worker writes a `job_metrics` row on completion. Partial success
//! (some items deleted, some failed) completes the job with a warning; total
//! failure returns an error so the queue retries.

use crate::context::WorkerContext;
use crate::queue::Job;
use anyhow::{anyhow, Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use formgate_core::models::{JobMetric, JobMetricStatus};
use formgate_db::{metrics, orphans, submissions};
use formgate_storage::{keys, DeleteResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

pub const KIND_DELETE_SUBMISSION_FILES: &str = "delete_submission_files";
pub const KIND_DELETE_FORM_FILES: &str = "delete_form_files";
pub const KIND_RETENTION_CLEANUP: &str = "retention_cleanup";
pub const KIND_ORPHAN_SCAN: &str = "orphan_scan";

pub const DEFAULT_ORPHAN_MIN_AGE_MINUTES: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteSubmissionFilesArgs {
    pub submission_id: String,
    pub form_id: String,
    /// `platform` or `user`.
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteFormFilesArgs {
    pub form_id: String,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionCleanupArgs {
    pub retention_days: i32,
    pub batch_size: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrphanScanArgs {
    /// Keys newer than this are skipped; they may be in-flight uploads.
    pub min_age_minutes: i64,
    /// When true, only record orphans without deleting.
    pub dry_run: bool,
}

/// Route a claimed job to its worker.
pub async fn dispatch(context: Arc<WorkerContext>, job: &Job) -> Result<()> {
    match job.kind.as_str() {
        KIND_DELETE_SUBMISSION_FILES => {
            let args: DeleteSubmissionFilesArgs =
                serde_json::from_value(job.args.clone()).context("invalid job args")?;
            delete_submission_files(&context, job.id, args).await
        }
        KIND_DELETE_FORM_FILES => {
            let args: DeleteFormFilesArgs =
                serde_json::from_value(job.args.clone()).context("invalid job args")?;
            delete_form_files(&context, job.id, args).await
        }
        KIND_RETENTION_CLEANUP => {
            let args: RetentionCleanupArgs =
                serde_json::from_value(job.args.clone()).context("invalid job args")?;
            retention_cleanup(&context, job.id, args).await
        }
        KIND_ORPHAN_SCAN => {
            let args: OrphanScanArgs =
                serde_json::from_value(job.args.clone()).context("invalid job args")?;
            orphan_scan(&context, job.id, args).await
        }
        other => Err(anyhow!("unknown job kind: {}", other)),
    }
}

fn delete_metric(
    job_id: Uuid,
    kind: &str,
    provider: &str,
    tenant_id: Option<&str>,
    result: &DeleteResult,
    duration_ms: i64,
) -> JobMetric {
    let status = match &result.error {
        None => JobMetricStatus::Success,
        Some(_) if result.items_deleted > 0 => JobMetricStatus::Partial,
        Some(_) => JobMetricStatus::Failed,
    };
    JobMetric {
        job_id,
        kind: kind.to_string(),
        provider: provider.to_string(),
        tenant_id: tenant_id.map(String::from),
        batch_size: None,
        items_processed: result.items_deleted,
        duration_ms,
        status,
        error_message: result.error.clone(),
    }
}

async fn delete_submission_files(
    context: &WorkerContext,
    job_id: Uuid,
    args: DeleteSubmissionFilesArgs,
) -> Result<()> {
    let start = Instant::now();
    tracing::info!(
        submission_id = %args.submission_id,
        form_id = %args.form_id,
        provider = %args.provider,
        "Processing submission file deletion"
    );

    let client = context
        .storage_for(&args.provider, args.tenant_id.as_deref())
        .await?;
    let result = client
        .delete_submission_files(&args.form_id, &args.submission_id)
        .await;

    let duration_ms = start.elapsed().as_millis() as i64;
    metrics::record_job_metric(
        &context.pool,
        &delete_metric(
            job_id,
            KIND_DELETE_SUBMISSION_FILES,
            &args.provider,
            args.tenant_id.as_deref(),
            &result,
            duration_ms,
        ),
    )
    .await;

    if let Some(error) = &result.error {
        if result.items_deleted > 0 {
            tracing::warn!(
                error = %error,
                deleted = result.items_deleted,
                failed = result.items_failed,
                "Partial file deletion success"
            );
            return Ok(());
        }
        return Err(anyhow!("submission file deletion failed: {}", error));
    }

    tracing::info!(
        submission_id = %args.submission_id,
        deleted = result.items_deleted,
        duration_ms,
        "Submission files deleted"
    );
    Ok(())
}

async fn delete_form_files(
    context: &WorkerContext,
    job_id: Uuid,
    args: DeleteFormFilesArgs,
) -> Result<()> {
    let start = Instant::now();
    tracing::info!(
        form_id = %args.form_id,
        provider = %args.provider,
        "Processing form file deletion"
    );

    let client = context
        .storage_for(&args.provider, args.tenant_id.as_deref())
        .await?;
    let result = client.delete_form_files(&args.form_id).await;

    let duration_ms = start.elapsed().as_millis() as i64;
    metrics::record_job_metric(
        &context.pool,
        &delete_metric(
            job_id,
            KIND_DELETE_FORM_FILES,
            &args.provider,
            args.tenant_id.as_deref(),
            &result,
            duration_ms,
        ),
    )
    .await;

    if let Some(error) = &result.error {
        if result.items_deleted > 0 {
            tracing::warn!(
                error = %error,
                deleted = result.items_deleted,
                failed = result.items_failed,
                "Partial form file deletion success"
            );
            return Ok(());
        }
        return Err(anyhow!("form file deletion failed: {}", error));
    }

    tracing::info!(
        form_id = %args.form_id,
        deleted = result.items_deleted,
        duration_ms,
        "Form files deleted"
    );
    Ok(())
}

/// Soft-delete free-trial submissions older than the retention window,
/// deleting their files first. Per-submission file failures do not block the
/// soft-delete; the orphan scanner picks up anything left behind.
async fn retention_cleanup(
    context: &WorkerContext,
    job_id: Uuid,
    args: RetentionCleanupArgs,
) -> Result<()> {
    let start = Instant::now();
    tracing::info!(
        retention_days = args.retention_days,
        batch_size = args.batch_size,
        "Starting retention cleanup"
    );

    let expired =
        submissions::select_expired_free_trial(&context.pool, args.retention_days, args.batch_size)
            .await?;

    if expired.is_empty() {
        tracing::info!("No expired submissions found for retention cleanup");
        metrics::record_job_metric(
            &context.pool,
            &JobMetric {
                job_id,
                kind: KIND_RETENTION_CLEANUP.to_string(),
                provider: "platform".to_string(),
                tenant_id: None,
                batch_size: Some(args.batch_size),
                items_processed: 0,
                duration_ms: start.elapsed().as_millis() as i64,
                status: JobMetricStatus::Success,
                error_message: None,
            },
        )
        .await;
        return Ok(());
    }

    tracing::info!(count = expired.len(), "Found expired submissions for cleanup");

    let storage = context.platform_storage()?;
    let mut deleted = 0;
    for submission in &expired {
        if submission.files.is_some() {
            let result = storage
                .delete_submission_files(&submission.form_id, &submission.id)
                .await;
            if let Some(error) = result.error {
                tracing::warn!(
                    error = %error,
                    submission_id = %submission.id,
                    "Failed to delete submission files, continuing with soft delete"
                );
            }
        }

        match submissions::soft_delete(&context.pool, &submission.id).await {
            Ok(()) => deleted += 1,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    submission_id = %submission.id,
                    "Failed to soft delete submission"
                );
            }
        }
    }

    let duration_ms = start.elapsed().as_millis() as i64;
    metrics::record_job_metric(
        &context.pool,
        &JobMetric {
            job_id,
            kind: KIND_RETENTION_CLEANUP.to_string(),
            provider: "platform".to_string(),
            tenant_id: None,
            batch_size: Some(args.batch_size),
            items_processed: deleted,
            duration_ms,
            status: JobMetricStatus::Success,
            error_message: None,
        },
    )
    .await;

    tracing::info!(deleted, duration_ms, "Retention cleanup completed");
    Ok(())
}

struct OrphanCandidate {
    key: String,
    size: i64,
    last_modified: chrono::DateTime<Utc>,
    form_id: String,
    submission_id: String,
}

/// Sweep the platform bucket for keys whose parsed submission id has no live
/// row, record them, and optionally delete them.
async fn orphan_scan(context: &WorkerContext, job_id: Uuid, args: OrphanScanArgs) -> Result<()> {
    let start = Instant::now();
    let min_age_minutes = if args.min_age_minutes <= 0 {
        DEFAULT_ORPHAN_MIN_AGE_MINUTES
    } else {
        args.min_age_minutes
    };
    let cutoff = Utc::now() - ChronoDuration::minutes(min_age_minutes);

    tracing::info!(
        min_age_minutes,
        dry_run = args.dry_run,
        cutoff = %cutoff,
        "Starting orphan scan"
    );

    let storage = context.platform_storage()?;

    let mut orphans: Vec<OrphanCandidate> = Vec::new();
    let mut scanned: i32 = 0;
    let mut continuation_token: Option<String> = None;

    loop {
        let page = storage
            .list(keys::SUBMISSIONS_PREFIX, 1000, continuation_token.clone())
            .await
            .map_err(|e| anyhow!("failed to list objects: {}", e))?;

        for object in &page.objects {
            scanned += 1;

            if object.last_modified > cutoff {
                continue;
            }

            let Some((form_id, submission_id)) = keys::parse_submission_key(&object.key) else {
                tracing::warn!(key = %object.key, "Could not parse storage key");
                continue;
            };

            match submissions::exists_live(&context.pool, submission_id).await {
                Ok(true) => {}
                Ok(false) => orphans.push(OrphanCandidate {
                    key: object.key.clone(),
                    size: object.size,
                    last_modified: object.last_modified,
                    form_id: form_id.to_string(),
                    submission_id: submission_id.to_string(),
                }),
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        submission_id = %submission_id,
                        "Failed to check submission existence"
                    );
                }
            }
        }

        if !page.truncated {
            break;
        }
        continuation_token = page.next_token;
    }

    let duration_ms = start.elapsed().as_millis() as i64;
    let total_size: i64 = orphans.iter().map(|o| o.size).sum();

    tracing::info!(
        scanned,
        orphans_found = orphans.len(),
        duration_ms,
        "Orphan scan completed"
    );

    orphans::insert_scan_result(
        &context.pool,
        job_id,
        scanned,
        orphans.len() as i32,
        total_size,
        args.dry_run,
        duration_ms,
        "completed",
    )
    .await?;

    for orphan in &orphans {
        if let Err(err) = orphans::insert_orphan_file(
            &context.pool,
            job_id,
            &orphan.key,
            orphan.size,
            orphan.last_modified,
            &orphan.form_id,
            &orphan.submission_id,
        )
        .await
        {
            tracing::warn!(error = %err, key = %orphan.key, "Failed to store orphan file record");
        }
    }

    if !args.dry_run && !orphans.is_empty() {
        tracing::info!(count = orphans.len(), "Deleting orphaned files");

        let mut deleted = 0;
        for orphan in &orphans {
            match storage.delete(&orphan.key).await {
                Ok(()) => deleted += 1,
                Err(err) => {
                    tracing::warn!(error = %err, key = %orphan.key, "Failed to delete orphan file");
                }
            }
        }

        orphans::mark_scan_deleted(&context.pool, job_id, deleted).await?;
        tracing::info!(deleted, "Orphan deletion completed");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn delete_args_wire_shape() {
        let args = DeleteSubmissionFilesArgs {
            submission_id: "s1".to_string(),
            form_id: "f1".to_string(),
            provider: "user".to_string(),
            tenant_id: Some("t1".to_string()),
        };
        let value = serde_json::to_value(&args).unwrap();
        assert_eq!(
            value,
            json!({"submission_id": "s1", "form_id": "f1", "provider": "user", "tenant_id": "t1"})
        );

        let platform: DeleteSubmissionFilesArgs = serde_json::from_value(
            json!({"submission_id": "s1", "form_id": "f1", "provider": "platform"}),
        )
        .unwrap();
        assert!(platform.tenant_id.is_none());
    }

    #[test]
    fn delete_metric_statuses() {
        let ok = DeleteResult {
            items_deleted: 3,
            items_failed: 0,
            error: None,
        };
        let partial = DeleteResult {
            items_deleted: 2,
            items_failed: 1,
            error: Some("one object stuck".to_string()),
        };
        let failed = DeleteResult {
            items_deleted: 0,
            items_failed: 0,
            error: Some("listing failed".to_string()),
        };

        let job_id = Uuid::new_v4();
        assert_eq!(
            delete_metric(job_id, "k", "platform", None, &ok, 1).status,
            JobMetricStatus::Success
        );
        assert_eq!(
            delete_metric(job_id, "k", "user", Some("t1"), &partial, 1).status,
            JobMetricStatus::Partial
        );
        assert_eq!(
            delete_metric(job_id, "k", "platform", None, &failed, 1).status,
            JobMetricStatus::Failed
        );
    }

    #[test]
    fn orphan_args_defaults_applied_at_run() {
        let args: OrphanScanArgs =
            serde_json::from_value(json!({"min_age_minutes": 0, "dry_run": true})).unwrap();
        assert_eq!(args.min_age_minutes, 0);
        // run path replaces non-positive values with the default
        assert_eq!(DEFAULT_ORPHAN_MIN_AGE_MINUTES, 60);
    }
}
