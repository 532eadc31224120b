//! Path-prefix rewriting reverse proxy.
//!
//! One public endpoint fronts several origins. The first path segment picks
//! the origin; responses are rewritten so links, cookies and redirects keep
//! pointing back through the proxy.
//!
//! ```text
//!     Client ──▶ http::server ──▶ routing (prefix → target)
//!                     │
//!                     ├── no match ──▶ http::landing
//!                     ├── Upgrade  ──▶ http::websocket ◀══ bytes ══▶ Origin
//!                     └── forward  ──▶ http::forward ──▶ Origin
//!                                          │
//!     Client ◀── rewrite::html ◀── rewrite::headers ◀──┘
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod rewrite;
pub mod routing;
pub mod security;

pub use config::schema::ProxyConfig;
pub use error::{ProxyError, StartupError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::RouteTable;
