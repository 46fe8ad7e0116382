//! Same-origin check for mutating requests.
//!
//! The host of the `Origin` header must equal the `Host` header. Loopback names
//! (`localhost`, `127.0.0.1`, `[::1]`) are treated as one host so local
//! development works whichever name the browser used.

use axum::http::header::{HOST, ORIGIN};
use axum::http::HeaderMap;
use url::Url;

const LOOPBACK_NAMES: [&str; 4] = ["localhost", "127.0.0.1", "[::1]", "::1"];

/// Canonical `name[:port]` with loopback aliases collapsed to `localhost`.
pub fn normalize_host(raw: &str) -> String {
    let raw = raw.trim().to_ascii_lowercase();

    let (name, port) = if raw.starts_with('[') {
        match raw.find(']') {
            Some(end) => {
                let rest = &raw[end + 1..];
                (raw[..=end].to_string(), rest.strip_prefix(':').unwrap_or("").to_string())
            }
            None => (raw.clone(), String::new()),
        }
    } else if raw.matches(':').count() > 1 {
        // Bare IPv6 without port.
        (raw.clone(), String::new())
    } else {
        match raw.split_once(':') {
            Some((name, port)) => (name.to_string(), port.to_string()),
            None => (raw.clone(), String::new()),
        }
    };

    let name = if LOOPBACK_NAMES.contains(&name.as_str()) {
        "localhost".to_string()
    } else {
        name
    };

    if port.is_empty() {
        name
    } else {
        format!("{}:{}", name, port)
    }
}

/// Host portion (`name[:port]`) of an origin URL, if it parses.
fn origin_host(origin: &str) -> Option<String> {
    let url = Url::parse(origin).ok()?;
    let host = match url.host()? {
        url::Host::Domain(d) => d.to_string(),
        url::Host::Ipv4(ip) => ip.to_string(),
        url::Host::Ipv6(ip) => format!("[{}]", ip),
    };
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

/// Whether `origin` and `host` name the same site.
pub fn same_origin(origin: &str, host: &str) -> bool {
    match origin_host(origin) {
        Some(origin_host) => normalize_host(&origin_host) == normalize_host(host),
        None => false,
    }
}

/// Check a request's headers. `authority` is the request URI's authority, used
/// when `Host` is absent (HTTP/2 carries it in `:authority`). Missing `Origin`
/// or host fails.
pub fn check_headers(headers: &HeaderMap, authority: Option<&str>) -> bool {
    let origin = headers.get(ORIGIN).and_then(|v| v.to_str().ok());
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty())
        .or(authority);
    match (origin, host) {
        (Some(origin), Some(host)) if !origin.is_empty() && !host.is_empty() => {
            same_origin(origin, host)
        }
        _ => false,
    }
}
