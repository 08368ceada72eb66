//! Session subsystem.
//!
//! # Data Flow
//! ```text
//! POST /mcp (initialize, no session)
//!     → registry.rs create() → id.rs fresh SessionId → connection.rs new Connection
//!
//! Any later request
//!     → registry.rs lookup() → Session.touch()
//!     → worker.rs start-once guard → engine attached to the Connection
//!
//! Reaper tick (every reap_interval)
//!     → registry.rs reap() → Connection.close() + worker marker cleared
//! ```

pub mod connection;
pub mod id;
pub mod registry;
pub mod worker;

pub use connection::{Connection, PendingReply};
pub use id::SessionId;
pub use registry::{Session, SessionRegistry};
pub use worker::StartGuard;
