//! Outbound request construction.
//!
//! # Responsibilities
//! - Build the upstream URL from the resolved route and inbound query
//! - Copy method, headers and body; override `Host` and `Referer`
//! - Issue the call on the shared client
//!
//! # Data Flow
//! ```text
//! Inbound request + ResolvedRoute
//!     → outbound_headers (hop-by-hop stripped, Host/Referer overridden)
//!     → reqwest::Client (no redirects, decoded bodies)
//!     → reqwest::Response, or ProxyError::UpstreamFetch
//! ```
//!
//! # Design Decisions
//! - One client for the whole process so connections are pooled per origin
//! - Redirects are never followed; `Location` goes back to the client rewritten
//! - Bodies stream in both directions

use std::net::IpAddr;
use std::time::Duration;

use axum::body::{Body, HttpBody};
use axum::http::header::{ACCEPT_ENCODING, HOST, REFERER};
use axum::http::{HeaderMap, HeaderValue, Request};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::rewrite::ProxyOrigin;
use crate::routing::ResolvedRoute;
use crate::security::headers::{append_forwarded, strip_hop_by_hop};

/// Sends proxied HTTP requests to resolved origins.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    forwarded_headers: bool,
}

impl Forwarder {
    pub fn new(config: &ProxyConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()?;
        Ok(Self {
            client,
            forwarded_headers: config.proxy.forwarded_headers,
        })
    }

    /// Forward `request` to the route's origin and return its response
    /// untouched.
    pub async fn forward(
        &self,
        request: Request<Body>,
        route: &ResolvedRoute,
        peer: IpAddr,
        proxy: &ProxyOrigin,
    ) -> Result<reqwest::Response, ProxyError> {
        let (parts, body) = request.into_parts();
        let url = route.target_url(parts.uri.query());
        let headers = outbound_headers(&parts.headers, route, self.forwarded_headers.then_some((peer, proxy)));

        tracing::debug!(method = %parts.method, url = %url, "Forwarding upstream");

        let mut outbound = self.client.request(parts.method, url).headers(headers);
        // An empty inbound body must not turn into a chunked upstream body.
        if body.size_hint().exact() != Some(0) {
            outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        outbound.send().await.map_err(ProxyError::UpstreamFetch)
    }
}

/// Inbound headers as the origin should see them.
pub fn outbound_headers(
    inbound: &HeaderMap,
    route: &ResolvedRoute,
    forwarded: Option<(IpAddr, &ProxyOrigin)>,
) -> HeaderMap {
    let mut headers = inbound.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(ACCEPT_ENCODING);

    if let Ok(host) = HeaderValue::from_str(&route.target().authority()) {
        headers.insert(HOST, host);
    }
    if let Ok(referer) = HeaderValue::from_str(&route.target_origin()) {
        headers.insert(REFERER, referer);
    }
    if let Some((peer, proxy)) = forwarded {
        append_forwarded(&mut headers, peer, proxy);
    }
    headers
}
