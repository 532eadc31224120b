//! Request inspection.
//!
//! # Responsibilities
//! - Work out the origin the client used to reach the proxy
//! - Read the request ID set by the request-id layer
//!
//! # Design Decisions
//! - A configured public origin always wins over request headers
//! - `X-Forwarded-Proto` is honoured so TLS terminated in front of the proxy
//!   still yields `https` links

use axum::http::header::HOST;
use axum::http::{HeaderMap, HeaderName, Uri};

use crate::rewrite::ProxyOrigin;
use crate::security::headers::X_FORWARDED_PROTO;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Request ID assigned by `SetRequestIdLayer`, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Scheme and authority the client addressed.
pub fn proxy_origin(headers: &HeaderMap, uri: &Uri, public_origin: Option<&ProxyOrigin>) -> ProxyOrigin {
    if let Some(origin) = public_origin {
        return origin.clone();
    }

    let scheme = headers
        .get(&X_FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|proto| matches!(proto.to_ascii_lowercase().as_str(), "http" | "https"))
        .or_else(|| uri.scheme_str())
        .unwrap_or("http");

    let authority = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|host| !host.is_empty())
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .unwrap_or("localhost");

    ProxyOrigin::new(scheme, authority)
}
