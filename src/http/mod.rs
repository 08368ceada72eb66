//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, tracing, body limit)
//!     → security::host_guard (every route)
//!     → security::admission (MCP routes only)
//!     → message.rs  POST   /mcp        decode → session → engine → reply | 204
//!                   DELETE /mcp        terminate session
//!     → stream.rs   GET    /mcp[/sse]  outbound queue → SSE frames
//!     → discovery.rs       /mcp/health, /.well-known/oauth-protected-resource
//!     → response.rs (session header/cookie, JSON-RPC error bodies)
//! ```

pub mod discovery;
pub mod message;
pub mod request;
pub mod response;
pub mod server;
pub mod stream;

pub use request::{MCP_SESSION_ID, SESSION_COOKIE, X_REQUEST_ID};
pub use server::{AppState, TransportServer, HEALTH_PATH, MCP_PATH, SSE_PATH};
