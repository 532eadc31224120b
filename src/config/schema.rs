//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.
//!
//! ```toml
//! [listener]
//! bind_address = "0.0.0.0:8080"
//!
//! [proxy]
//! default_target = "https://www.example.com"
//!
//! [routes]
//! google = "https://www.google.com"
//! epg = "https://tv.example.org/epgphp/index.php"
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Routing mode and proxy-wide rewrite settings.
    pub proxy: RoutingConfig,

    /// Route prefix (first path segment) to absolute target URL.
    pub routes: BTreeMap<String, String>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Resource caps.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// How the first path segment of a request is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// First segment is looked up in the `[routes]` table.
    #[default]
    Table,
    /// First segment is itself the upstream host name.
    Passthrough,
}

/// Routing and rewriting settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Table or passthrough routing.
    pub mode: RoutingMode,

    /// Target used when no prefix matches. `None` serves the landing page.
    pub default_target: Option<String>,

    /// Fixed public origin of the proxy (e.g. "https://proxy.example.com").
    /// When unset, it is derived from each request's Host and
    /// X-Forwarded-Proto headers.
    pub public_origin: Option<String>,

    /// Scheme used to reach hosts in passthrough mode.
    pub passthrough_scheme: String,

    /// Add X-Forwarded-For/Proto/Host to upstream requests.
    pub forwarded_headers: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            mode: RoutingMode::Table,
            default_target: None,
            public_origin: None,
            passthrough_scheme: "https".to_string(),
            forwarded_headers: true,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection (and WebSocket handshake) timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed until response headers are available, in seconds.
    /// Streamed bodies and established tunnels are not bounded by it.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Resource limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum concurrently open WebSocket tunnels.
    pub max_tunnels: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { max_tunnels: 1024 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
