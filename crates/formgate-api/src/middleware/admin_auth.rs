//! Admin endpoint authentication.
//!
//! Accepts `Authorization: Bearer <key>` or an `api_key` query parameter
//! matching the configured admin key.

use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use formgate_core::AppError;
use std::sync::Arc;

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn query_api_key(request: &Request) -> Option<&str> {
    request
        .uri()
        .query()?
        .split('&')
        .find_map(|pair| pair.strip_prefix("api_key="))
}

pub async fn admin_auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(admin_key) = state.config.admin_api_key() else {
        return HttpAppError(AppError::Internal(
            "admin API key not configured".to_string(),
        ))
        .into_response();
    };

    let authorized = bearer_token(&request) == Some(admin_key)
        || query_api_key(&request) == Some(admin_key);

    if !authorized {
        return HttpAppError(AppError::Unauthorized(
            "Invalid or missing admin API key".to_string(),
        ))
        .into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    fn request(uri: &str, auth: Option<&str>) -> Request {
        let mut builder = HttpRequest::builder().uri(uri);
        if let Some(auth) = auth {
            builder = builder.header("authorization", auth);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn bearer_token_parsing() {
        let req = request("/admin/jobs/orphan-scan", Some("Bearer sekrit"));
        assert_eq!(bearer_token(&req), Some("sekrit"));

        let req = request("/admin/jobs/orphan-scan", Some("Basic abc"));
        assert_eq!(bearer_token(&req), None);

        let req = request("/admin/jobs/orphan-scan", None);
        assert_eq!(bearer_token(&req), None);
    }

    #[test]
    fn query_api_key_parsing() {
        let req = request("/admin/jobs/orphan-scan?api_key=sekrit&x=1", None);
        assert_eq!(query_api_key(&req), Some("sekrit"));

        let req = request("/admin/jobs/orphan-scan?x=1", None);
        assert_eq!(query_api_key(&req), None);

        let req = request("/admin/jobs/orphan-scan", None);
        assert_eq!(query_api_key(&req), None);
    }
}
