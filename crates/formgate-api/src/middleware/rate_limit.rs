//! Per-IP submission rate limiting over the shared key-value store.
//!
//! Counters: `ip:{ip}:hour` (limit 10) and `ip:{ip}:minute` (limit 3). Each
//! request increments both; the first increment in a window sets the expiry.
//! A key-value store outage fails open.

use crate::error::HttpAppError;
use crate::middleware::client_ip;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use formgate_core::AppError;
use redis::AsyncCommands;
use std::sync::Arc;

const HOURLY_LIMIT: i64 = 10;
const MINUTE_LIMIT: i64 = 3;

pub fn hour_key(ip: &str) -> String {
    format!("ip:{}:hour", ip)
}

pub fn minute_key(ip: &str) -> String {
    format!("ip:{}:minute", ip)
}

/// Increment a windowed counter, setting the expiry on first increment.
/// Returns `None` (fail open) when the store is unreachable.
async fn bump_counter(
    conn: &mut redis::aio::ConnectionManager,
    key: &str,
    window_secs: i64,
) -> Option<i64> {
    let count: i64 = match conn.incr(key, 1).await {
        Ok(count) => count,
        Err(err) => {
            tracing::warn!(error = %err, key = %key, "Rate limit store unavailable, failing open");
            return None;
        }
    };

    if count == 1 {
        if let Err(err) = conn.expire::<_, ()>(key, window_secs).await {
            tracing::warn!(error = %err, key = %key, "Failed to set rate limit expiry");
        }
    }

    Some(count)
}

pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(redis) = state.redis.clone() else {
        return next.run(request).await;
    };
    let mut conn = redis;

    let ip = client_ip(&state, &request);

    if let Some(hour_count) = bump_counter(&mut conn, &hour_key(&ip), 3600).await {
        if hour_count > HOURLY_LIMIT {
            tracing::info!(ip = %ip, count = hour_count, "Hourly rate limit exceeded");
            return HttpAppError(AppError::RateLimitExceeded).into_response();
        }
    }

    if let Some(minute_count) = bump_counter(&mut conn, &minute_key(&ip), 60).await {
        if minute_count > MINUTE_LIMIT {
            tracing::info!(ip = %ip, count = minute_count, "Per-minute rate limit exceeded");
            return HttpAppError(AppError::RateLimitExceeded).into_response();
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_key_shapes() {
        assert_eq!(hour_key("203.0.113.7"), "ip:203.0.113.7:hour");
        assert_eq!(minute_key("203.0.113.7"), "ip:203.0.113.7:minute");
        assert_eq!(hour_key("2001:db8::1"), "ip:2001:db8::1:hour");
    }

    #[test]
    fn limits_match_contract() {
        // third per-minute request accepted, fourth rejected; tenth hourly
        // accepted, eleventh rejected
        assert!(3 <= MINUTE_LIMIT && 4 > MINUTE_LIMIT);
        assert!(10 <= HOURLY_LIMIT && 11 > HOURLY_LIMIT);
    }
}
