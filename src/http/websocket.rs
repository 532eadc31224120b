//! WebSocket proxy handling.
//!
//! # Responsibilities
//! - Detect WebSocket upgrade requests
//! - Perform the upgrade handshake with the origin first
//! - Complete the upgrade with the client only after the origin answered 101
//! - Bidirectional byte forwarding between the two upgraded connections
//!
//! # Data Flow
//! ```text
//! Client ←──── raw bytes ────→ Proxy ←──── raw bytes ────→ Origin
//! ```
//!
//! # Design Decisions
//! - WebSocket handled separately from HTTP request/response
//! - After the handshake the proxy never parses frames: no message size
//!   limit, and negotiated extensions work end to end
//! - Either direction ending shuts down both connections
//! - Open tunnels are capped by a semaphore; the permit lives as long as the relay

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{
    ACCEPT_ENCODING, CONNECTION, HOST, SEC_WEBSOCKET_KEY, SEC_WEBSOCKET_VERSION, UPGRADE,
};
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
use axum::response::Response;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::Semaphore;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::observability::metrics;
use crate::rewrite::ProxyOrigin;
use crate::routing::ResolvedRoute;
use crate::security::headers::{append_forwarded, strip_hop_by_hop};

/// True when `Upgrade` case-insensitively names `websocket`.
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    headers
        .get(UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("websocket"))
}

/// Opens and relays WebSocket tunnels.
#[derive(Debug, Clone)]
pub struct Tunneler {
    client: reqwest::Client,
    tunnels: Arc<Semaphore>,
    connect_timeout: Duration,
    forwarded_headers: bool,
}

impl Tunneler {
    pub fn new(config: &ProxyConfig) -> Result<Self, reqwest::Error> {
        let connect_timeout = Duration::from_secs(config.timeouts.connect_secs);
        // Upgrades only exist in HTTP/1.1.
        let client = reqwest::Client::builder()
            .http1_only()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            client,
            tunnels: Arc::new(Semaphore::new(config.limits.max_tunnels)),
            connect_timeout,
            forwarded_headers: config.proxy.forwarded_headers,
        })
    }

    /// Tunnels that can still be opened.
    pub fn available(&self) -> usize {
        self.tunnels.available_permits()
    }

    /// Handshake with the origin, then answer the client with the origin's
    /// 101 and relay bytes in a background task.
    pub async fn open(
        &self,
        mut request: Request<Body>,
        route: &ResolvedRoute,
        peer: IpAddr,
        proxy: &ProxyOrigin,
    ) -> Result<Response, ProxyError> {
        let permit = Arc::clone(&self.tunnels)
            .try_acquire_owned()
            .map_err(|_| ProxyError::TunnelLimit)?;

        let key = request
            .headers()
            .get(SEC_WEBSOCKET_KEY)
            .cloned()
            .ok_or(ProxyError::MalformedUpgrade("missing Sec-WebSocket-Key"))?;
        let query = request.uri().query();
        let url = route.target_url(query);
        let display_url = route
            .websocket_url(query)
            .ok_or_else(|| ProxyError::InvalidTarget(route.target().to_string()))?;
        let headers = handshake_headers(
            request.headers(),
            route,
            &key,
            self.forwarded_headers.then_some((peer, proxy)),
        );

        tracing::debug!(url = %display_url, "Opening WebSocket to origin");
        let handshake = self
            .client
            .request(request.method().clone(), url)
            .headers(headers)
            .send();
        let origin_response = match tokio::time::timeout(self.connect_timeout, handshake).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(ProxyError::TunnelEstablish(e.to_string())),
            Err(_) => {
                return Err(ProxyError::TunnelEstablish(format!(
                    "handshake timed out after {:?}",
                    self.connect_timeout
                )))
            }
        };
        if origin_response.status() != StatusCode::SWITCHING_PROTOCOLS {
            return Err(ProxyError::HandshakeRejected {
                status: origin_response.status(),
            });
        }

        let response_headers = switching_headers(origin_response.headers());
        let origin = origin_response
            .upgrade()
            .await
            .map_err(|e| ProxyError::TunnelEstablish(e.to_string()))?;

        let on_upgrade = hyper::upgrade::on(&mut request);
        let label = route.label().to_string();
        tokio::spawn(async move {
            let _permit = permit;
            let upgraded = match on_upgrade.await {
                Ok(upgraded) => upgraded,
                Err(e) => {
                    tracing::warn!(route = %label, error = %e, "Client upgrade failed");
                    return;
                }
            };

            metrics::tunnel_opened();
            tracing::info!(route = %label, "WebSocket tunnel established");
            relay(TokioIo::new(upgraded), origin).await;
            metrics::tunnel_closed();
            tracing::info!(route = %label, "WebSocket tunnel closed");
        });

        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
        *response.headers_mut() = response_headers;
        Ok(response)
    }
}

/// Headers for the origin handshake: everything the client sent except
/// hop-by-hop headers, with exactly one copy of each handshake header.
/// Subprotocol and extension offers go through untouched.
pub fn handshake_headers(
    inbound: &HeaderMap,
    route: &ResolvedRoute,
    key: &HeaderValue,
    forwarded: Option<(IpAddr, &ProxyOrigin)>,
) -> HeaderMap {
    let mut headers = inbound.clone();
    strip_hop_by_hop(&mut headers);
    for name in [HOST, SEC_WEBSOCKET_KEY, SEC_WEBSOCKET_VERSION, ACCEPT_ENCODING] {
        headers.remove(name);
    }

    if let Ok(host) = HeaderValue::from_str(&route.target().authority()) {
        headers.insert(HOST, host);
    }
    headers.insert(CONNECTION, HeaderValue::from_static("Upgrade"));
    headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
    headers.insert(SEC_WEBSOCKET_VERSION, HeaderValue::from_static("13"));
    headers.insert(SEC_WEBSOCKET_KEY, key.clone());
    if let Some((peer, proxy)) = forwarded {
        append_forwarded(&mut headers, peer, proxy);
    }
    headers
}

/// Headers for the client's 101, taken from the origin's. The key was passed
/// through unchanged, so the origin's `Sec-WebSocket-Accept` is valid as is.
pub fn switching_headers(origin: &HeaderMap) -> HeaderMap {
    let mut headers = origin.clone();
    strip_hop_by_hop(&mut headers);
    headers.insert(CONNECTION, HeaderValue::from_static("Upgrade"));
    headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
    headers
}

async fn relay<C, U>(client: C, origin: U)
where
    C: AsyncRead + AsyncWrite + Unpin,
    U: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_rx, mut client_tx) = tokio::io::split(client);
    let (mut origin_rx, mut origin_tx) = tokio::io::split(origin);

    let (closed_by, copied) = tokio::select! {
        copied = tokio::io::copy(&mut client_rx, &mut origin_tx) => ("client", copied),
        copied = tokio::io::copy(&mut origin_rx, &mut client_tx) => ("origin", copied),
    };
    match copied {
        Ok(bytes) => tracing::debug!(closed_by, bytes, "Tearing down tunnel"),
        Err(e) => tracing::debug!(closed_by, error = %e, "Tunnel read failed, tearing down"),
    }

    let _ = client_tx.shutdown().await;
    let _ = origin_tx.shutdown().await;
}
