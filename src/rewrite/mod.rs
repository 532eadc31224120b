//! Response rewriting subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream response
//!     → RewriteContext::new (target origin, proxy origin, route prefix)
//!     → headers.rs (Set-Cookie domain, Location origin)
//!     → html.rs (href/src/action attributes, only for text/html)
//!     → Client
//! ```
//!
//! # Design Decisions
//! - One immutable context per response, shared by header and body rewriters
//! - Purely textual substitutions; unrelated values are never touched
//! - Body rewriting streams; nothing is buffered beyond the tokenizer's needs

pub mod headers;
pub mod html;

use crate::routing::ResolvedRoute;

/// Scheme and authority the client used to reach the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyOrigin {
    scheme: String,
    authority: String,
}

impl ProxyOrigin {
    pub fn new(scheme: impl Into<String>, authority: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into().to_ascii_lowercase(),
            authority: authority.into(),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host with optional port, as sent in the Host header.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Host without port.
    pub fn host(&self) -> &str {
        let authority = self.authority.as_str();
        if authority.starts_with('[') {
            // IPv6 literal: keep the brackets, drop the port.
            return authority
                .find(']')
                .map_or(authority, |end| &authority[..=end]);
        }
        authority
            .rsplit_once(':')
            .map_or(authority, |(host, _port)| host)
    }

    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme, self.authority)
    }
}

/// Per-response substitution parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteContext {
    target_origin: String,
    target_scheme: String,
    target_host: String,
    proxy_origin: String,
    proxy_host: String,
    route_prefix: Option<String>,
}

impl RewriteContext {
    pub fn new(route: &ResolvedRoute, proxy: &ProxyOrigin) -> Self {
        Self {
            target_origin: route.target_origin(),
            target_scheme: route.target().scheme().to_string(),
            target_host: route.target().host().to_string(),
            proxy_origin: proxy.origin(),
            proxy_host: proxy.host().to_string(),
            route_prefix: route.matched_prefix().map(str::to_string),
        }
    }

    pub fn target_origin(&self) -> &str {
        &self.target_origin
    }

    pub fn target_host(&self) -> &str {
        &self.target_host
    }

    pub fn proxy_origin(&self) -> &str {
        &self.proxy_origin
    }

    pub fn proxy_host(&self) -> &str {
        &self.proxy_host
    }

    pub fn route_prefix(&self) -> Option<&str> {
        self.route_prefix.as_deref()
    }

    /// `<proxyOrigin>/<routePrefix>`, or the bare proxy origin for the
    /// default route.
    pub fn proxied_base(&self) -> String {
        match &self.route_prefix {
            Some(prefix) => format!("{}/{}", self.proxy_origin, prefix),
            None => self.proxy_origin.clone(),
        }
    }

    /// Replace a leading target origin in `value`, if present at a URL
    /// boundary.
    pub(crate) fn replace_target_origin(&self, value: &str) -> Option<String> {
        let rest = strip_prefix_ignore_case(value, &self.target_origin)?;
        if !(rest.is_empty() || rest.starts_with(['/', '?', '#'])) {
            return None;
        }
        Some(format!("{}{}", self.proxied_base(), rest))
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &value[prefix.len()..])
}
