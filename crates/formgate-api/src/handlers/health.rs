//! Health check: platform pool reachability plus pool stats.

use crate::state::AppState;
use axum::extract::State;
use axum::{http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use std::time::Duration;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Database reachable"),
        (status = 503, description = "Database unreachable")
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let pool = &state.platform_pool;
    let check = tokio::time::timeout(
        HEALTH_CHECK_TIMEOUT,
        sqlx::query("SELECT 1").execute(pool),
    )
    .await;

    let pool_stats = serde_json::json!({
        "size": pool.size(),
        "idle": pool.num_idle(),
    });

    match check {
        Ok(Ok(_)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "up",
                "message": "It's healthy",
                "pool": pool_stats,
            })),
        ),
        Ok(Err(err)) => {
            tracing::error!(error = %err, "Health check query failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "down",
                    "message": "Database query failed",
                    "pool": pool_stats,
                })),
            )
        }
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "down",
                "message": "Database health check timed out",
                "pool": pool_stats,
            })),
        ),
    }
}
