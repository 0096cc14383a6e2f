//! Orphan scan bookkeeping: per-run summaries and per-file records.

use chrono::{DateTime, Utc};
use formgate_core::models::{OrphanFile, OrphanScanResult};
use formgate_core::AppError;
use sqlx::PgPool;
use uuid::Uuid;

/// Write the summary row for a scan run.
#[allow(clippy::too_many_arguments)]
pub async fn insert_scan_result(
    pool: &PgPool,
    job_id: Uuid,
    scanned_count: i32,
    orphan_count: i32,
    total_orphan_size_bytes: i64,
    dry_run: bool,
    duration_ms: i64,
    status: &str,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO orphan_scan_result (
            job_id, scanned_count, orphan_count, total_orphan_size_bytes,
            dry_run, duration_ms, status
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(job_id)
    .bind(scanned_count)
    .bind(orphan_count)
    .bind(total_orphan_size_bytes)
    .bind(dry_run)
    .bind(duration_ms)
    .bind(status)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record one orphaned storage key for a scan run.
pub async fn insert_orphan_file(
    pool: &PgPool,
    scan_job_id: Uuid,
    file_key: &str,
    file_size: i64,
    last_modified: DateTime<Utc>,
    form_id: &str,
    submission_id: &str,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO orphan_file (
            scan_job_id, file_key, file_size, last_modified, form_id, submission_id
        ) VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(scan_job_id)
    .bind(file_key)
    .bind(file_size)
    .bind(last_modified)
    .bind(form_id)
    .bind(submission_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// After a destructive pass, update the run summary with the deletion count.
pub async fn mark_scan_deleted(
    pool: &PgPool,
    job_id: Uuid,
    deleted_count: i32,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE orphan_scan_result
        SET deleted_count = $1, status = 'deleted'
        WHERE job_id = $2
        "#,
    )
    .bind(deleted_count)
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Most recent scan runs, newest first.
pub async fn list_scan_results(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<OrphanScanResult>, AppError> {
    let results = sqlx::query_as::<_, OrphanScanResult>(
        r#"
        SELECT id, job_id, scanned_count, orphan_count, deleted_count,
               total_orphan_size_bytes, dry_run, duration_ms, status, created_at
        FROM orphan_scan_result
        ORDER BY created_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(results)
}

/// Orphan files recorded for a scan run, largest first.
pub async fn list_orphan_files(
    pool: &PgPool,
    scan_job_id: Uuid,
    limit: i64,
) -> Result<Vec<OrphanFile>, AppError> {
    let files = sqlx::query_as::<_, OrphanFile>(
        r#"
        SELECT id, file_key, file_size, last_modified, form_id, submission_id
        FROM orphan_file
        WHERE scan_job_id = $1
        ORDER BY file_size DESC
        LIMIT $2
        "#,
    )
    .bind(scan_job_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(files)
}
