//! IP blocklist check.
//!
//! Membership in the shared `spam_ips` set does not reject the request; it
//! plants a marker that makes the pipeline take the spam path, so bots keep
//! seeing success responses.

use crate::middleware::client_ip;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use redis::AsyncCommands;
use std::sync::Arc;

const SPAM_IP_SET: &str = "spam_ips";

/// Request extension planted when the client IP is blocklisted.
#[derive(Debug, Clone)]
pub struct SpamMarker {
    pub reason: String,
}

pub async fn spam_check_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(redis) = state.redis.clone() {
        let mut conn = redis;
        let ip = client_ip(&state, &request);

        match conn.sismember::<_, _, bool>(SPAM_IP_SET, &ip).await {
            Ok(true) => {
                tracing::info!(ip = %ip, "Client IP is on the spam blocklist");
                request.extensions_mut().insert(SpamMarker {
                    reason: "ip_blocklist".to_string(),
                });
            }
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(error = %err, "Spam blocklist check failed, continuing");
            }
        }
    }

    next.run(request).await
}
