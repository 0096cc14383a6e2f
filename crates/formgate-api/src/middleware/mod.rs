pub mod admin_auth;
pub mod rate_limit;
pub mod spam;

use crate::state::AppState;
use axum::extract::{ConnectInfo, Request};
use std::net::SocketAddr;

/// Client IP for the current request, honoring the trusted-proxy setting.
pub(crate) fn client_ip(state: &AppState, request: &Request) -> String {
    let socket_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0);
    crate::utils::ip_extraction::extract_client_ip(
        request.headers(),
        socket_addr.as_ref(),
        state.config.trusted_proxy_count(),
    )
}
