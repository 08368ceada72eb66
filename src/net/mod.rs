//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → tls.rs (optional TLS handshake, rustls via axum-server)
//!     → Hand off to the HTTP layer
//! ```

pub mod tls;

pub use tls::{load_tls_config, TlsError};
