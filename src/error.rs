//! Error types.
//!
//! Request errors are local to one request and map to a status code with a
//! short plain-text diagnostic. Startup errors are fatal.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::config::ConfigError;
use crate::routing::TargetError;

/// Failure while proxying a single request.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Network failure talking to the resolved origin.
    #[error("upstream request failed: {0}")]
    UpstreamFetch(#[source] reqwest::Error),

    /// The origin answered the WebSocket upgrade with something other than 101.
    #[error("websocket handshake rejected by origin with status {status}")]
    HandshakeRejected { status: StatusCode },

    /// The WebSocket connection to the origin could not be opened.
    #[error("failed to open websocket to origin: {0}")]
    TunnelEstablish(String),

    #[error("websocket tunnel limit reached")]
    TunnelLimit,

    /// Upgrade request missing what the handshake needs.
    #[error("malformed websocket upgrade request: {0}")]
    MalformedUpgrade(&'static str),

    #[error("cannot build upstream url for {0}")]
    InvalidTarget(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::UpstreamFetch(_)
            | ProxyError::HandshakeRejected { .. }
            | ProxyError::InvalidTarget(_) => StatusCode::BAD_GATEWAY,
            ProxyError::TunnelEstablish(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::TunnelLimit => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::MalformedUpgrade(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::UpstreamFetch(_) => "upstream_fetch",
            ProxyError::HandshakeRejected { .. } => "handshake_rejected",
            ProxyError::TunnelEstablish(_) => "tunnel_establish",
            ProxyError::TunnelLimit => "tunnel_limit",
            ProxyError::MalformedUpgrade(_) => "malformed_upgrade",
            ProxyError::InvalidTarget(_) => "invalid_target",
        }
    }

    fn client_message(&self) -> &'static str {
        match self {
            ProxyError::UpstreamFetch(_) => "Upstream request failed",
            ProxyError::HandshakeRejected { .. } => "WebSocket handshake with origin server failed",
            ProxyError::TunnelEstablish(_) => "Failed to connect to WebSocket backend",
            ProxyError::TunnelLimit => "Too many open WebSocket connections",
            ProxyError::MalformedUpgrade(_) => "Malformed WebSocket upgrade request",
            ProxyError::InvalidTarget(_) => "Invalid upstream target",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.client_message()).into_response()
    }
}

/// Failure before the server starts accepting traffic.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid route target: {0}")]
    Route(#[from] TargetError),
    #[error("invalid public origin: {0}")]
    PublicOrigin(String),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
