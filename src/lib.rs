//! MCP HTTP transport library.
//!
//! Bridges a stateful JSON-RPC engine onto HTTP: POST for requests,
//! server-sent events for notifications, one session per client.

pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod protocol;
pub mod security;
pub mod session;

pub use config::schema::BridgeConfig;
pub use engine::{BasicEngine, ProcessingEngine};
pub use error::TransportError;
pub use http::TransportServer;
pub use lifecycle::Shutdown;
