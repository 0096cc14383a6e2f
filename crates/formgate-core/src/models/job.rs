//! Background-job telemetry and orphan-scan records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Outcome recorded in a `job_metrics` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobMetricStatus {
    Success,
    Partial,
    Failed,
}

impl fmt::Display for JobMetricStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobMetricStatus::Success => write!(f, "success"),
            JobMetricStatus::Partial => write!(f, "partial"),
            JobMetricStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Append-only telemetry row written by every worker on completion.
#[derive(Debug, Clone)]
pub struct JobMetric {
    pub job_id: Uuid,
    pub kind: String,
    pub provider: String,
    pub tenant_id: Option<String>,
    pub batch_size: Option<i32>,
    pub items_processed: i32,
    pub duration_ms: i64,
    pub status: JobMetricStatus,
    pub error_message: Option<String>,
}

/// Summary row for one orphan scan run.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrphanScanResult {
    pub id: i64,
    pub job_id: Uuid,
    pub scanned_count: i32,
    pub orphan_count: i32,
    pub deleted_count: Option<i32>,
    pub total_orphan_size_bytes: i64,
    pub dry_run: bool,
    pub duration_ms: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// A storage key with no live owning submission row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrphanFile {
    pub id: i64,
    pub file_key: String,
    pub file_size: i64,
    pub last_modified: DateTime<Utc>,
    pub form_id: Option<String>,
    pub submission_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_status_labels() {
        assert_eq!(JobMetricStatus::Success.to_string(), "success");
        assert_eq!(JobMetricStatus::Partial.to_string(), "partial");
        assert_eq!(JobMetricStatus::Failed.to_string(), "failed");
    }
}
