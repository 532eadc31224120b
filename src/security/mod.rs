//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request:
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-*)
//!     → Request forwarder
//!
//! Upstream response:
//!     → headers.rs (strip hop-by-hop)
//!     → Response rewriter
//! ```
//!
//! # Design Decisions
//! - Connection-scoped headers never cross the proxy
//! - No trust in client input: X-Forwarded-For is extended, not replaced

pub mod headers;
