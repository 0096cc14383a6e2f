//! Route table assembly.

use crate::api_doc::ApiDoc;
use crate::handlers;
use crate::middleware::{admin_auth, rate_limit, spam};
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;

const MULTIPART_BODY_LIMIT: usize = 32 * 1024 * 1024;

pub fn build_router(state: Arc<AppState>) -> Router {
    // Public submission intake. Rate limit runs first, then the blocklist
    // check, then the pipeline.
    let submission_routes = Router::new()
        .route("/forms/:form_id", post(handlers::submit::submit_form))
        .layer(DefaultBodyLimit::max(MULTIPART_BODY_LIMIT))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            spam::spam_check_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_middleware,
        ));

    let admin_routes = Router::new()
        .route(
            "/admin/jobs/orphan-scan",
            post(handlers::jobs::trigger_orphan_scan).get(handlers::jobs::get_orphan_scan_results),
        )
        .route(
            "/admin/jobs/orphan-scan/:job_id/files",
            get(handlers::jobs::get_orphan_files),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            admin_auth::admin_auth_middleware,
        ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(submission_routes)
        .merge(admin_routes)
        .route("/health", get(handlers::health::health))
        .route("/api-docs/openapi.json", get(serve_openapi))
        .layer(cors)
        .with_state(state)
}

async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
