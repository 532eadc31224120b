//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check every route target is an absolute http(s) URL
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::{ProxyConfig, RoutingMode};
use crate::routing::{Target, TargetError};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("route prefix {0:?} must be a single non-empty path segment")]
    InvalidPrefix(String),
    #[error("route {prefix:?}: {source}")]
    InvalidTarget {
        prefix: String,
        #[source]
        source: TargetError,
    },
    #[error("proxy.default_target: {0}")]
    InvalidDefaultTarget(#[source] TargetError),
    #[error("proxy.public_origin {0:?} must be an origin like https://proxy.example.com")]
    InvalidPublicOrigin(String),
    #[error("proxy.passthrough_scheme must be http or https, got {0:?}")]
    InvalidPassthroughScheme(String),
    #[error("routes are ignored in passthrough mode; remove the [routes] table")]
    RoutesInPassthroughMode,
    #[error("{field} is not a socket address: {value:?}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (prefix, raw) in &config.routes {
        if prefix.is_empty() || prefix.contains('/') {
            errors.push(ValidationError::InvalidPrefix(prefix.clone()));
        }
        if let Err(source) = Target::parse(raw) {
            errors.push(ValidationError::InvalidTarget {
                prefix: prefix.clone(),
                source,
            });
        }
    }

    if let Some(raw) = &config.proxy.default_target {
        if let Err(e) = Target::parse(raw) {
            errors.push(ValidationError::InvalidDefaultTarget(e));
        }
    }

    if let Some(raw) = &config.proxy.public_origin {
        let is_origin = Target::parse(raw).is_ok_and(|t| t.base_path() == "/" && !raw.contains(['?', '#']));
        if !is_origin {
            errors.push(ValidationError::InvalidPublicOrigin(raw.clone()));
        }
    }

    if config.proxy.mode == RoutingMode::Passthrough {
        if !matches!(config.proxy.passthrough_scheme.as_str(), "http" | "https") {
            errors.push(ValidationError::InvalidPassthroughScheme(
                config.proxy.passthrough_scheme.clone(),
            ));
        }
        if !config.routes.is_empty() {
            errors.push(ValidationError::RoutesInPassthroughMode);
        }
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.connect_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }
    if config.limits.max_tunnels == 0 {
        errors.push(ValidationError::Zero("limits.max_tunnels"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
