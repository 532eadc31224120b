//! Route lookup.
//!
//! # Responsibilities
//! - Store the compiled route table
//! - Resolve a request path to a target and sub-path
//! - Return an explicit no-match so the caller can serve the landing page
//!
//! # Design Decisions
//! - Immutable after construction (shared via `Arc`, no locks)
//! - O(log n) prefix lookup on the first path segment only
//! - A matching first segment is always consumed; no backtracking

use std::collections::BTreeMap;

use url::Url;

use crate::config::{ProxyConfig, RoutingMode};
use crate::routing::target::{merge_path, Target, TargetError};

/// Immutable routing table built once at startup.
#[derive(Debug, Clone)]
pub struct RouteTable {
    mode: RoutingMode,
    routes: BTreeMap<String, Target>,
    default_target: Option<Target>,
    passthrough_scheme: String,
}

impl RouteTable {
    /// Table-mode routing over `routes` with an optional fallback.
    pub fn new(routes: BTreeMap<String, Target>, default_target: Option<Target>) -> Self {
        Self {
            mode: RoutingMode::Table,
            routes,
            default_target,
            passthrough_scheme: "https".to_string(),
        }
    }

    /// Passthrough routing: the first path segment names the upstream host.
    pub fn passthrough(scheme: impl Into<String>, default_target: Option<Target>) -> Self {
        Self {
            mode: RoutingMode::Passthrough,
            routes: BTreeMap::new(),
            default_target,
            passthrough_scheme: scheme.into(),
        }
    }

    /// Compile the table from (already validated) configuration.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, TargetError> {
        let default_target = config
            .proxy
            .default_target
            .as_deref()
            .map(Target::parse)
            .transpose()?;

        match config.proxy.mode {
            RoutingMode::Passthrough => Ok(Self::passthrough(
                config.proxy.passthrough_scheme.clone(),
                default_target,
            )),
            RoutingMode::Table => {
                let routes = config
                    .routes
                    .iter()
                    .map(|(prefix, raw)| Ok((prefix.clone(), Target::parse(raw)?)))
                    .collect::<Result<BTreeMap<_, _>, TargetError>>()?;
                Ok(Self::new(routes, default_target))
            }
        }
    }

    pub fn mode(&self) -> RoutingMode {
        self.mode
    }

    /// Configured prefixes and their targets, ordered by prefix.
    pub fn routes(&self) -> impl Iterator<Item = (&str, &Target)> {
        self.routes.iter().map(|(prefix, target)| (prefix.as_str(), target))
    }

    pub fn default_target(&self) -> Option<&Target> {
        self.default_target.as_ref()
    }

    /// Resolve a request path. `None` means "serve the landing page".
    pub fn resolve(&self, path: &str) -> Option<ResolvedRoute> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());

        if let Some(candidate) = segments.next() {
            let matched = match self.mode {
                RoutingMode::Table => self.routes.get(candidate).cloned(),
                RoutingMode::Passthrough => Target::for_host(&self.passthrough_scheme, candidate),
            };
            if let Some(target) = matched {
                let rest: Vec<&str> = segments.collect();
                return Some(ResolvedRoute {
                    target,
                    sub_path: format!("/{}", rest.join("/")),
                    matched_prefix: Some(candidate.to_string()),
                    passthrough: self.mode == RoutingMode::Passthrough,
                });
            }
        }

        self.default_target.as_ref().map(|target| ResolvedRoute {
            target: target.clone(),
            sub_path: if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{path}")
            },
            matched_prefix: None,
            passthrough: false,
        })
    }
}

/// Per-request routing decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    target: Target,
    sub_path: String,
    matched_prefix: Option<String>,
    passthrough: bool,
}

impl ResolvedRoute {
    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn target_origin(&self) -> String {
        self.target.origin()
    }

    pub fn target_base_path(&self) -> &str {
        self.target.base_path()
    }

    /// Always starts with `/`.
    pub fn sub_path(&self) -> &str {
        &self.sub_path
    }

    /// The consumed first segment; `None` for the default route.
    pub fn matched_prefix(&self) -> Option<&str> {
        self.matched_prefix.as_deref()
    }

    /// Low-cardinality label for logs and metrics.
    pub fn label(&self) -> &str {
        match (&self.matched_prefix, self.passthrough) {
            (Some(_), true) => "passthrough",
            (Some(prefix), false) => prefix,
            (None, _) => "default",
        }
    }

    /// Upstream path after merging the sub-path into the base path.
    pub fn target_path(&self) -> String {
        merge_path(self.target.base_path(), &self.sub_path)
    }

    /// Upstream HTTP URL. The inbound query string replaces any query on the
    /// configured target.
    pub fn target_url(&self, query: Option<&str>) -> Url {
        let mut url = self.target.as_url().clone();
        url.set_path(&self.target_path());
        url.set_query(query.filter(|q| !q.is_empty()));
        url.set_fragment(None);
        url
    }

    /// Same as [`target_url`](Self::target_url) with `http` → `ws` and
    /// `https` → `wss`.
    pub fn websocket_url(&self, query: Option<&str>) -> Option<Url> {
        let mut url = self.target_url(query);
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme).ok()?;
        Some(url)
    }
}
