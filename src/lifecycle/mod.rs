//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → stop accepting, end event streams
//!             → drain in-flight requests (bounded)
//!             → cancel the engine scope → close every session
//! ```
//!
//! # Design Decisions
//! - One root token; every long-running task holds a child
//! - Shutdown has a deadline strictly longer than the reply timeout

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
