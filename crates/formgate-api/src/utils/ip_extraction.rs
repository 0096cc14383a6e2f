//! Client IP extraction with X-Forwarded-For validation.
//!
//! Behind a load balancer the X-Forwarded-For header carries a chain of
//! addresses; trusting it blindly lets clients spoof their IP and dodge the
//! rate limiter and blocklist. With N trusted proxies, the client is the
//! address just before the last N entries.

use axum::http::HeaderMap;
use std::net::IpAddr;

/// Extract and validate the client IP from request headers, falling back to
/// the socket address. Returns "unknown" when nothing validates.
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: Option<&std::net::SocketAddr>,
    trusted_proxy_count: usize,
) -> String {
    if let Some(forwarded_for) = headers.get("x-forwarded-for") {
        if let Ok(header_value) = forwarded_for.to_str() {
            let ip = extract_from_forwarded_for(header_value, trusted_proxy_count);
            if ip != "unknown" {
                return ip;
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(header_value) = real_ip.to_str() {
            let trimmed = header_value.trim();
            if is_valid_ip(trimmed) {
                return trimmed.to_string();
            }
        }
    }

    if let Some(addr) = socket_addr {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

fn extract_from_forwarded_for(header_value: &str, trusted_proxy_count: usize) -> String {
    let ips: Vec<&str> = header_value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if ips.is_empty() {
        return "unknown".to_string();
    }

    // With no trusted proxies the whole chain is client-controlled; the last
    // entry (closest to us) is the only one worth validating.
    if trusted_proxy_count == 0 || ips.len() <= trusted_proxy_count {
        let last_ip = ips.last().unwrap_or(&"");
        if is_valid_ip(last_ip) {
            return last_ip.to_string();
        }
        return "unknown".to_string();
    }

    let client_ip_pos = ips.len().saturating_sub(trusted_proxy_count + 1);
    let client_ip = ips.get(client_ip_pos).unwrap_or(&"");

    if is_valid_ip(client_ip) {
        return client_ip.to_string();
    }

    "unknown".to_string()
}

fn is_valid_ip(ip_str: &str) -> bool {
    ip_str.parse::<IpAddr>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(forwarded: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_str(forwarded).unwrap());
        headers
    }

    #[test]
    fn single_trusted_proxy_takes_preceding_entry() {
        let headers = headers_with("203.0.113.7, 10.0.0.1");
        assert_eq!(extract_client_ip(&headers, None, 1), "203.0.113.7");
    }

    #[test]
    fn spoofed_prefix_is_ignored_behind_trusted_chain() {
        // Client appended a fake entry before reaching the two trusted hops
        let headers = headers_with("1.1.1.1, 203.0.113.7, 10.0.0.1, 10.0.0.2");
        assert_eq!(extract_client_ip(&headers, None, 2), "203.0.113.7");
    }

    #[test]
    fn invalid_entries_fall_through_to_socket() {
        let headers = headers_with("not-an-ip");
        let socket = "192.0.2.9:443".parse().unwrap();
        assert_eq!(extract_client_ip(&headers, Some(&socket), 1), "192.0.2.9");
    }

    #[test]
    fn x_real_ip_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));
        assert_eq!(extract_client_ip(&headers, None, 1), "198.51.100.4");
    }

    #[test]
    fn no_headers_no_socket_is_unknown() {
        assert_eq!(extract_client_ip(&HeaderMap::new(), None, 1), "unknown");
    }

    #[test]
    fn ipv6_is_accepted() {
        let headers = headers_with("2001:db8::1, 10.0.0.1");
        assert_eq!(extract_client_ip(&headers, None, 1), "2001:db8::1");
    }
}
