//! Header handling on both sides of a request.
//!
//! # Responsibilities
//! - Derive the rate-limit client key from forwarded headers or the peer address
//! - Add security response headers (CSP, HSTS, framing, sniffing)
//!
//! # Design Decisions
//! - Forwarded headers are trusted only when configured; otherwise the socket peer wins
//! - Response headers never overwrite a value a handler already set

use std::net::SocketAddr;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::security::rate_limit::UNKNOWN_CLIENT;

/// Gateway domains the payment lightbox loads from.
const GATEWAY_DOMAINS: &str = "https://api.convergepay.com https://demo.convergepay.com";

/// Resolve the client identifier for rate limiting.
///
/// With `trust_forwarded` the first `X-Forwarded-For` entry wins, then
/// `X-Real-IP`. The peer address is the fallback, then the shared unknown key.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = real_ip {
            return ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// The Content-Security-Policy served with every response.
pub fn content_security_policy() -> String {
    [
        "default-src 'self'".to_string(),
        format!(
            "script-src 'self' 'unsafe-inline' https://code.jquery.com {}",
            GATEWAY_DOMAINS
        ),
        "style-src 'self' 'unsafe-inline'".to_string(),
        "img-src 'self' data: blob:".to_string(),
        "font-src 'self'".to_string(),
        format!("connect-src 'self' {}", GATEWAY_DOMAINS),
        format!("frame-src {}", GATEWAY_DOMAINS),
        "frame-ancestors 'none'".to_string(),
        "base-uri 'self'".to_string(),
        "form-action 'self'".to_string(),
        "object-src 'none'".to_string(),
    ]
    .join("; ")
}

/// Header name/value pairs added to every response.
pub fn security_headers() -> Vec<(HeaderName, HeaderValue)> {
    let mut headers = vec![
        (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
        (header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
        (header::X_XSS_PROTECTION, HeaderValue::from_static("0")),
        (
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains; preload"),
        ),
    ];
    if let Ok(csp) = HeaderValue::from_str(&content_security_policy()) {
        headers.push((header::CONTENT_SECURITY_POLICY, csp));
    }
    headers
}

/// Wrap `router` so every response carries the security headers.
pub fn with_security_headers<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    security_headers()
        .into_iter()
        .fold(router, |router, (name, value)| {
            router.layer(SetResponseHeaderLayer::if_not_present(name, value))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> Option<SocketAddr> {
        Some("192.0.2.7:51000".parse().unwrap())
    }

    #[test]
    fn test_forwarded_for_first_entry() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" 203.0.113.9 , 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.1"));
        assert_eq!(client_key(&headers, peer(), true), "203.0.113.9");
    }

    #[test]
    fn test_real_ip_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.1"));
        assert_eq!(client_key(&headers, peer(), true), "198.51.100.1");
    }

    #[test]
    fn test_untrusted_uses_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        assert_eq!(client_key(&headers, peer(), false), "192.0.2.7");
    }

    #[test]
    fn test_unknown_placeholder() {
        assert_eq!(client_key(&HeaderMap::new(), None, true), UNKNOWN_CLIENT);
        assert_eq!(client_key(&HeaderMap::new(), None, false), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_csp_allows_gateway_frames() {
        let csp = content_security_policy();
        assert!(csp.contains("frame-src https://api.convergepay.com https://demo.convergepay.com"));
        assert!(csp.contains("frame-ancestors 'none'"));
        assert_eq!(security_headers().len(), 5);
    }
}
