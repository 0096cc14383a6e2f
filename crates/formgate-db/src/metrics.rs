//! Job telemetry rows. Append-only; failures to record never fail the job.

use formgate_core::models::JobMetric;
use sqlx::PgPool;

/// Insert a `job_metrics` row. Errors are logged and swallowed so metrics
/// never interfere with job completion.
pub async fn record_job_metric(pool: &PgPool, metric: &JobMetric) {
    let result = sqlx::query(
        r#"
        INSERT INTO job_metrics (
            job_id, job_type, provider, tenant_id, batch_size,
            items_processed, duration_ms, status, error_message
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(metric.job_id)
    .bind(&metric.kind)
    .bind(&metric.provider)
    .bind(&metric.tenant_id)
    .bind(metric.batch_size)
    .bind(metric.items_processed)
    .bind(metric.duration_ms)
    .bind(metric.status.to_string())
    .bind(&metric.error_message)
    .execute(pool)
    .await;

    if let Err(err) = result {
        tracing::warn!(error = %err, job_id = %metric.job_id, "Failed to record job metrics");
    }
}
