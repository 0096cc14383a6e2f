//! Admin job endpoints: trigger orphan scans and inspect their results.

use crate::error::{ErrorBody, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use formgate_worker::OrphanScanArgs;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

const RESULTS_LIMIT: i64 = 20;
const FILES_LIMIT: i64 = 100;

#[derive(Debug, Deserialize, ToSchema)]
pub struct TriggerOrphanScanRequest {
    #[serde(default = "default_min_age_minutes")]
    pub min_age_minutes: i64,
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
}

fn default_min_age_minutes() -> i64 {
    60
}

fn default_dry_run() -> bool {
    true
}

impl Default for TriggerOrphanScanRequest {
    fn default() -> Self {
        Self {
            min_age_minutes: default_min_age_minutes(),
            dry_run: default_dry_run(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TriggerOrphanScanResponse {
    pub message: String,
    pub job_id: Uuid,
    pub dry_run: bool,
}

/// POST /admin/jobs/orphan-scan
#[utoipa::path(
    post,
    path = "/admin/jobs/orphan-scan",
    tag = "admin",
    request_body = TriggerOrphanScanRequest,
    responses(
        (status = 202, description = "Scan queued", body = TriggerOrphanScanResponse),
        (status = 401, description = "Missing or invalid admin key", body = ErrorBody)
    ),
)]
pub async fn trigger_orphan_scan(
    State(state): State<Arc<AppState>>,
    body: Option<Json<TriggerOrphanScanRequest>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();

    let job_id = state
        .job_queue
        .enqueue_orphan_scan(OrphanScanArgs {
            min_age_minutes: request.min_age_minutes,
            dry_run: request.dry_run,
        })
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerOrphanScanResponse {
            message: "Orphan scan job queued".to_string(),
            job_id,
            dry_run: request.dry_run,
        }),
    ))
}

/// GET /admin/jobs/orphan-scan
#[utoipa::path(
    get,
    path = "/admin/jobs/orphan-scan",
    tag = "admin",
    responses(
        (status = 200, description = "Recent scan results"),
        (status = 401, description = "Missing or invalid admin key", body = ErrorBody)
    ),
)]
pub async fn get_orphan_scan_results(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let results =
        formgate_db::orphans::list_scan_results(&state.platform_pool, RESULTS_LIMIT).await?;
    Ok(Json(serde_json::json!({ "results": results })))
}

/// GET /admin/jobs/orphan-scan/{job_id}/files
#[utoipa::path(
    get,
    path = "/admin/jobs/orphan-scan/{job_id}/files",
    tag = "admin",
    params(("job_id" = Uuid, Path, description = "Scan job id")),
    responses(
        (status = 200, description = "Orphan files recorded for the scan"),
        (status = 401, description = "Missing or invalid admin key", body = ErrorBody)
    ),
)]
pub async fn get_orphan_files(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let files =
        formgate_db::orphans::list_orphan_files(&state.platform_pool, job_id, FILES_LIMIT).await?;
    Ok(Json(serde_json::json!({ "files": files })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_request_defaults() {
        let request: TriggerOrphanScanRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.min_age_minutes, 60);
        assert!(request.dry_run);

        let request: TriggerOrphanScanRequest =
            serde_json::from_str(r#"{"min_age_minutes": 10, "dry_run": false}"#).unwrap();
        assert_eq!(request.min_age_minutes, 10);
        assert!(!request.dry_run);
    }
}
