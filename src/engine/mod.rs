//! Processing engine seam.
//!
//! # Data Flow
//! ```text
//! TransportServer (once per session, via the start-once guard)
//!     → ProcessingEngine::serve(connection, scope)
//!         → Connection::read   (client requests, notifications, responses)
//!         → Connection::write  (replies correlate to waiting POSTs,
//!                               everything else goes to the event stream)
//! ```
//!
//! The engine owns method dispatch; the transport never inspects methods
//! beyond recognising `initialize`.

pub mod basic;

use futures_util::future::BoxFuture;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::session::Connection;

pub use basic::BasicEngine;

/// Consumes one session's [`Connection`] until it closes or `scope` is cancelled.
pub trait ProcessingEngine: Send + Sync + 'static {
    fn serve(&self, connection: Arc<Connection>, scope: CancellationToken) -> BoxFuture<'static, ()>;
}
