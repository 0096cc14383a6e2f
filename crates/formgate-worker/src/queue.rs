//! Durable job queue: Postgres-backed, three priority bands, claim via
//! `FOR UPDATE SKIP LOCKED`, exponential retry backoff.
//!
//! Shutdown: [`JobQueue::shutdown`] signals the queue loops to stop claiming;
//! it does not wait for in-flight jobs. Give running jobs a bounded window
//! before process exit.

use crate::context::WorkerContext;
use crate::workers;
use formgate_core::AppError;
use serde::Serialize;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Semaphore};
use tokio::time::sleep;
use uuid::Uuid;

/// User-initiated deletions.
pub const QUEUE_CRITICAL: &str = "critical";
/// Standard cleanup.
pub const QUEUE_DEFAULT: &str = "default";
/// Scheduled retention and orphan scans.
pub const QUEUE_LOW: &str = "low";

/// Worker concurrency per queue band.
const QUEUE_CONCURRENCY: [(&str, usize); 3] =
    [(QUEUE_CRITICAL, 10), (QUEUE_DEFAULT, 5), (QUEUE_LOW, 2)];

/// Retention enqueues are deduplicated within this window.
pub const RETENTION_UNIQUE_WINDOW_SECS: i64 = 3600;

/// Maximum delay in seconds before retrying a failed job. Caps exponential
/// backoff so high attempt counts do not produce excessively long delays.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

/// Backoff in seconds for a given attempt count (exponential with cap).
#[inline]
pub(crate) fn compute_retry_backoff_seconds(attempt: i32) -> u64 {
    (2_u64.pow(attempt.max(0) as u32)).min(MAX_RETRY_BACKOFF_SECS)
}

#[derive(Clone)]
pub struct JobQueueConfig {
    pub poll_interval_ms: u64,
    pub max_attempts: i32,
    /// Per-job wall-clock budget before the run counts as failed.
    pub job_timeout_secs: u64,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            max_attempts: 3,
            job_timeout_secs: 600,
        }
    }
}

/// A claimed job handed to the dispatcher.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub kind: String,
    pub queue: String,
    pub args: serde_json::Value,
    pub attempt: i32,
    pub max_attempts: i32,
}

#[derive(Clone)]
pub struct JobQueue {
    pool: PgPool,
    config: JobQueueConfig,
    shutdown_tx: broadcast::Sender<()>,
}

impl JobQueue {
    /// Run the idempotent schema migration, then start one polling loop per
    /// queue band.
    pub async fn start(
        pool: PgPool,
        context: Arc<WorkerContext>,
        config: JobQueueConfig,
    ) -> Result<Self, AppError> {
        migrate(&pool).await?;

        let (shutdown_tx, _) = broadcast::channel(1);

        for (queue_name, concurrency) in QUEUE_CONCURRENCY {
            let pool = pool.clone();
            let config = config.clone();
            let context = context.clone();
            let shutdown_rx = shutdown_tx.subscribe();
            tokio::spawn(async move {
                queue_loop(pool, config, context, queue_name, concurrency, shutdown_rx).await;
            });
        }

        tracing::info!("Job queue started");
        Ok(Self {
            pool,
            config,
            shutdown_tx,
        })
    }

    /// Create a queue handle that does not run workers. Jobs enqueued through
    /// it are written to the database and picked up by the real runtime.
    pub fn handle_only(pool: PgPool, config: JobQueueConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            pool,
            config,
            shutdown_tx,
        }
    }

    /// Signal the queue loops to stop claiming new jobs.
    pub fn shutdown(&self) {
        tracing::info!("Initiating job queue shutdown");
        let _ = self.shutdown_tx.send(());
    }

    /// Queue deletion of one submission's files. Critical band.
    pub async fn enqueue_delete_submission_files(
        &self,
        args: workers::DeleteSubmissionFilesArgs,
    ) -> Result<Uuid, AppError> {
        let id = insert_job(
            &self.pool,
            workers::KIND_DELETE_SUBMISSION_FILES,
            QUEUE_CRITICAL,
            &args,
            self.config.max_attempts,
        )
        .await?;
        tracing::info!(
            submission_id = %args.submission_id,
            form_id = %args.form_id,
            "Queued submission file deletion"
        );
        Ok(id)
    }

    /// Same as [`Self::enqueue_delete_submission_files`], but inside the
    /// caller's transaction so the enqueue commits atomically with its state
    /// transition.
    pub async fn enqueue_delete_submission_files_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        args: workers::DeleteSubmissionFilesArgs,
    ) -> Result<Uuid, AppError> {
        insert_job(
            &mut **tx,
            workers::KIND_DELETE_SUBMISSION_FILES,
            QUEUE_CRITICAL,
            &args,
            self.config.max_attempts,
        )
        .await
    }

    /// Queue deletion of all files for a form. Critical band.
    pub async fn enqueue_delete_form_files(
        &self,
        args: workers::DeleteFormFilesArgs,
    ) -> Result<Uuid, AppError> {
        let id = insert_job(
            &self.pool,
            workers::KIND_DELETE_FORM_FILES,
            QUEUE_CRITICAL,
            &args,
            self.config.max_attempts,
        )
        .await?;
        tracing::info!(form_id = %args.form_id, "Queued form file deletion");
        Ok(id)
    }

    pub async fn enqueue_delete_form_files_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        args: workers::DeleteFormFilesArgs,
    ) -> Result<Uuid, AppError> {
        insert_job(
            &mut **tx,
            workers::KIND_DELETE_FORM_FILES,
            QUEUE_CRITICAL,
            &args,
            self.config.max_attempts,
        )
        .await
    }

    /// Queue a retention cleanup run. Low band; deduplicated within a 1-hour
    /// uniqueness window so scheduler double-fires are safe. Returns `None`
    /// when an equivalent job is already pending or running.
    pub async fn enqueue_retention_cleanup(
        &self,
        args: workers::RetentionCleanupArgs,
    ) -> Result<Option<Uuid>, AppError> {
        let id = insert_job_unique(
            &self.pool,
            workers::KIND_RETENTION_CLEANUP,
            QUEUE_LOW,
            &args,
            self.config.max_attempts,
            RETENTION_UNIQUE_WINDOW_SECS,
        )
        .await?;
        match id {
            Some(id) => tracing::info!(job_id = %id, "Queued retention cleanup job"),
            None => tracing::info!("Retention cleanup already queued within uniqueness window"),
        }
        Ok(id)
    }

    /// Queue an orphan scan. Low band.
    pub async fn enqueue_orphan_scan(
        &self,
        args: workers::OrphanScanArgs,
    ) -> Result<Uuid, AppError> {
        let min_age_minutes = args.min_age_minutes;
        let dry_run = args.dry_run;
        let id = insert_job(
            &self.pool,
            workers::KIND_ORPHAN_SCAN,
            QUEUE_LOW,
            &args,
            self.config.max_attempts,
        )
        .await?;
        tracing::info!(
            job_id = %id,
            min_age_minutes,
            dry_run,
            "Queued orphan scan job"
        );
        Ok(id)
    }
}

/// Idempotent schema migration for the queue's own tables and the core-owned
/// telemetry tables.
async fn migrate(pool: &PgPool) -> Result<(), AppError> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS job (
            id UUID PRIMARY KEY,
            kind TEXT NOT NULL,
            queue TEXT NOT NULL,
            args JSONB NOT NULL DEFAULT '{}'::jsonb,
            state TEXT NOT NULL DEFAULT 'pending',
            attempt INT NOT NULL DEFAULT 0,
            max_attempts INT NOT NULL DEFAULT 3,
            scheduled_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            attempted_at TIMESTAMPTZ,
            finalized_at TIMESTAMPTZ,
            last_error TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        r#"
        CREATE INDEX IF NOT EXISTS job_claim_idx
        ON job (queue, state, scheduled_at)
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS job_metrics (
            id BIGSERIAL PRIMARY KEY,
            job_id UUID NOT NULL,
            job_type TEXT NOT NULL,
            provider TEXT NOT NULL,
            tenant_id TEXT,
            batch_size INT,
            items_processed INT NOT NULL DEFAULT 0,
            duration_ms BIGINT NOT NULL DEFAULT 0,
            status TEXT NOT NULL,
            error_message TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS orphan_scan_result (
            id BIGSERIAL PRIMARY KEY,
            job_id UUID NOT NULL,
            scanned_count INT NOT NULL DEFAULT 0,
            orphan_count INT NOT NULL DEFAULT 0,
            deleted_count INT,
            total_orphan_size_bytes BIGINT NOT NULL DEFAULT 0,
            dry_run BOOLEAN NOT NULL DEFAULT true,
            duration_ms BIGINT NOT NULL DEFAULT 0,
            status TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS orphan_file (
            id BIGSERIAL PRIMARY KEY,
            scan_job_id UUID NOT NULL,
            file_key TEXT NOT NULL,
            file_size BIGINT NOT NULL DEFAULT 0,
            last_modified TIMESTAMPTZ NOT NULL,
            form_id TEXT,
            submission_id TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::info!("Job queue migrations applied");
    Ok(())
}

async fn insert_job<'e, E, A>(
    executor: E,
    kind: &str,
    queue: &str,
    args: &A,
    max_attempts: i32,
) -> Result<Uuid, AppError>
where
    E: PgExecutor<'e>,
    A: Serialize,
{
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO job (id, kind, queue, args, max_attempts)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(kind)
    .bind(queue)
    .bind(serde_json::to_value(args)?)
    .bind(max_attempts)
    .execute(executor)
    .await?;

    Ok(id)
}

/// Single-statement insert-unless-recent: the job is inserted only when no
/// job of the same kind is pending/running or was created within the window.
async fn insert_job_unique<'e, E, A>(
    executor: E,
    kind: &str,
    queue: &str,
    args: &A,
    max_attempts: i32,
    window_secs: i64,
) -> Result<Option<Uuid>, AppError>
where
    E: PgExecutor<'e>,
    A: Serialize,
{
    let id = Uuid::new_v4();
    let inserted: Option<Uuid> = sqlx::query_scalar(
        r#"
        INSERT INTO job (id, kind, queue, args, max_attempts)
        SELECT $1, $2, $3, $4, $5
        WHERE NOT EXISTS (
            SELECT 1 FROM job
            WHERE kind = $2
              AND (state IN ('pending', 'running')
                   OR created_at > now() - ($6 * INTERVAL '1 second'))
        )
        RETURNING id
        "#,
    )
    .bind(id)
    .bind(kind)
    .bind(queue)
    .bind(serde_json::to_value(args)?)
    .bind(max_attempts)
    .bind(window_secs)
    .fetch_optional(executor)
    .await?;

    Ok(inserted)
}

async fn queue_loop(
    pool: PgPool,
    config: JobQueueConfig,
    context: Arc<WorkerContext>,
    queue_name: &'static str,
    concurrency: usize,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    tracing::info!(
        queue = queue_name,
        concurrency,
        poll_interval_ms = config.poll_interval_ms,
        "Queue loop started"
    );

    let semaphore = Arc::new(Semaphore::new(concurrency));
    let poll_interval = Duration::from_millis(config.poll_interval_ms);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::info!(queue = queue_name, "Queue loop shutting down");
                break;
            }
            _ = sleep(poll_interval) => {
                claim_available(&pool, &config, &context, queue_name, &semaphore).await;
            }
        }
    }
}

/// Claim jobs while both work and worker slots are available.
async fn claim_available(
    pool: &PgPool,
    config: &JobQueueConfig,
    context: &Arc<WorkerContext>,
    queue_name: &str,
    semaphore: &Arc<Semaphore>,
) {
    loop {
        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => return,
        };

        match claim_next(pool, queue_name).await {
            Ok(Some(job)) => {
                let pool = pool.clone();
                let config = config.clone();
                let context = context.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    run_job(&pool, &config, context, job).await;
                });
            }
            Ok(None) => return,
            Err(err) => {
                tracing::error!(error = %err, queue = queue_name, "Failed to claim job");
                return;
            }
        }
    }
}

async fn claim_next(pool: &PgPool, queue_name: &str) -> Result<Option<Job>, AppError> {
    let job = sqlx::query_as::<_, Job>(
        r#"
        UPDATE job
        SET state = 'running', attempt = attempt + 1, attempted_at = now()
        WHERE id = (
            SELECT id FROM job
            WHERE queue = $1 AND state = 'pending' AND scheduled_at <= now()
            ORDER BY scheduled_at
            FOR UPDATE SKIP LOCKED
            LIMIT 1
        )
        RETURNING id, kind, queue, args, attempt, max_attempts
        "#,
    )
    .bind(queue_name)
    .fetch_optional(pool)
    .await?;

    Ok(job)
}

async fn run_job(pool: &PgPool, config: &JobQueueConfig, context: Arc<WorkerContext>, job: Job) {
    let timeout = Duration::from_secs(config.job_timeout_secs);
    let outcome = tokio::time::timeout(timeout, workers::dispatch(context, &job)).await;

    match outcome {
        Ok(Ok(())) => {
            if let Err(err) = mark_succeeded(pool, job.id).await {
                tracing::error!(error = %err, job_id = %job.id, "Failed to mark job succeeded");
            }
            tracing::info!(job_id = %job.id, kind = %job.kind, "Job completed");
        }
        Ok(Err(err)) => {
            tracing::error!(
                job_id = %job.id,
                kind = %job.kind,
                error = %err,
                attempt = job.attempt,
                max_attempts = job.max_attempts,
                "Job execution failed"
            );
            fail_and_reschedule(pool, &job, &err.to_string()).await;
        }
        Err(_) => {
            tracing::error!(
                job_id = %job.id,
                kind = %job.kind,
                timeout_secs = config.job_timeout_secs,
                "Job execution timed out"
            );
            fail_and_reschedule(pool, &job, "job execution timed out").await;
        }
    }
}

async fn mark_succeeded(pool: &PgPool, job_id: Uuid) -> Result<(), AppError> {
    sqlx::query(
        r#"UPDATE job SET state = 'succeeded', finalized_at = now() WHERE id = $1"#,
    )
    .bind(job_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Record the failure, then either re-schedule with backoff or discard once
/// the attempt cap is reached: `failed -> pending` until the cap, then
/// `discarded`.
async fn fail_and_reschedule(pool: &PgPool, job: &Job, error: &str) {
    if let Err(err) = sqlx::query(
        r#"UPDATE job SET state = 'failed', last_error = $2 WHERE id = $1"#,
    )
    .bind(job.id)
    .bind(error)
    .execute(pool)
    .await
    {
        tracing::error!(error = %err, job_id = %job.id, "Failed to mark job failed");
        return;
    }

    if job.attempt < job.max_attempts {
        let backoff = compute_retry_backoff_seconds(job.attempt) as i64;
        tracing::info!(
            job_id = %job.id,
            attempt = job.attempt,
            backoff_seconds = backoff,
            "Scheduling job retry"
        );
        if let Err(err) = sqlx::query(
            r#"
            UPDATE job
            SET state = 'pending', scheduled_at = now() + ($2 * INTERVAL '1 second')
            WHERE id = $1 AND state = 'failed'
            "#,
        )
        .bind(job.id)
        .bind(backoff)
        .execute(pool)
        .await
        {
            tracing::error!(error = %err, job_id = %job.id, "Failed to reschedule job");
        }
    } else {
        tracing::error!(job_id = %job.id, "Job failed after max attempts, discarding");
        if let Err(err) = sqlx::query(
            r#"
            UPDATE job
            SET state = 'discarded', finalized_at = now()
            WHERE id = $1 AND state = 'failed'
            "#,
        )
        .bind(job.id)
        .execute(pool)
        .await
        {
            tracing::error!(error = %err, job_id = %job.id, "Failed to discard job");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_backoff_exponential_then_capped() {
        assert_eq!(compute_retry_backoff_seconds(0), 1);
        assert_eq!(compute_retry_backoff_seconds(1), 2);
        assert_eq!(compute_retry_backoff_seconds(2), 4);
        assert_eq!(compute_retry_backoff_seconds(8), 256);
        assert_eq!(compute_retry_backoff_seconds(9), MAX_RETRY_BACKOFF_SECS);
        assert_eq!(compute_retry_backoff_seconds(10), MAX_RETRY_BACKOFF_SECS);
    }

    #[test]
    fn queue_bands_and_concurrency() {
        let map: std::collections::HashMap<_, _> = QUEUE_CONCURRENCY.into_iter().collect();
        assert_eq!(map[QUEUE_CRITICAL], 10);
        assert_eq!(map[QUEUE_DEFAULT], 5);
        assert_eq!(map[QUEUE_LOW], 2);
    }
}
