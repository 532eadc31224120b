//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (first-segment lookup, default fallback)
//!     → target.rs (base path + sub-path merge)
//!     → Return: ResolvedRoute or NoMatch (landing page)
//!
//! Route Compilation (at startup):
//!     [routes] table from config
//!     → Parse every target URL
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Only the first path segment is a routing key (no wildcards, no regex)
//! - Deterministic: same path always resolves to the same route

pub mod router;
pub mod target;

pub use router::{ResolvedRoute, RouteTable};
pub use target::{merge_path, Target, TargetError};
