//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, dispatch)
//!     → [routing layer resolves target] (no match → landing.rs)
//!     → websocket.rs (Upgrade: websocket → tunnel)
//!     → forward.rs (outbound request to origin)
//!     → response.rs (header and HTML rewriting)
//!     → Send to client
//! ```

pub mod forward;
pub mod landing;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use forward::Forwarder;
pub use request::X_REQUEST_ID;
pub use server::HttpServer;
pub use websocket::Tunneler;
