//! The duplex channel one session presents to the processing engine.
//!
//! # Responsibilities
//! - Inbound FIFO: HTTP handlers enqueue, the engine reads
//! - Outbound FIFO: the engine writes notifications, the SSE stream drains
//! - Pending-reply table: request id → single-slot queue for the waiting POST
//! - Close: release every queue and every waiter exactly once
//!
//! # Invariants
//! - Once closed, nothing enqueues and every blocked wait returns `Closed`
//! - A pending entry lives exactly as long as its [`PendingReply`] guard
//! - A written message goes to a pending slot iff its id is registered;
//!   everything else is outbound traffic
//!
//! No lock is held across an await: the pending table mutex only guards
//! map mutation, all waiting happens on channels and the close token.

use flume::TrySendError;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::ConnectionError;
use crate::protocol::{Message, RequestId};
use crate::session::SessionId;

pub struct Connection {
    session_id: SessionId,
    inbound_tx: flume::Sender<Message>,
    inbound_rx: flume::Receiver<Message>,
    outbound_tx: flume::Sender<Message>,
    outbound_rx: flume::Receiver<Message>,
    pending: Mutex<HashMap<RequestId, flume::Sender<Message>>>,
    closed: CancellationToken,
    close_once: AtomicBool,
    ready: watch::Sender<bool>,
}

impl Connection {
    pub fn new(session_id: SessionId, inbound_capacity: usize, outbound_capacity: usize) -> Self {
        let (inbound_tx, inbound_rx) = flume::bounded(inbound_capacity);
        let (outbound_tx, outbound_rx) = flume::bounded(outbound_capacity);
        let (ready, _) = watch::channel(false);
        Self {
            session_id,
            inbound_tx,
            inbound_rx,
            outbound_tx,
            outbound_rx,
            pending: Mutex::new(HashMap::new()),
            closed: CancellationToken::new(),
            close_once: AtomicBool::new(false),
            ready,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Queue a client message for the engine.
    ///
    /// Waits for queue space; gives up when the connection closes or `cancel` fires.
    pub async fn enqueue_inbound(
        &self,
        message: Message,
        cancel: &CancellationToken,
    ) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(ConnectionError::Closed),
            _ = cancel.cancelled() => Err(ConnectionError::Cancelled),
            sent = self.inbound_tx.send_async(message) => sent.map_err(|_| ConnectionError::Closed),
        }
    }

    /// Emit a reply or notification from the engine.
    ///
    /// A message whose id matches a pending request fills that request's
    /// slot; a second reply for the same id is rejected. Anything else is
    /// queued for the event stream.
    pub async fn write(&self, message: Message) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }

        let message = match message.id().cloned() {
            Some(id) => match self.route_reply(id, message)? {
                Some(message) => message,
                None => return Ok(()),
            },
            None => message,
        };

        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(ConnectionError::Closed),
            sent = self.outbound_tx.send_async(message) => sent.map_err(|_| ConnectionError::Closed),
        }
    }

    /// Fill the pending slot for `id` if one is registered.
    ///
    /// The send happens under the table lock, so a caller timing out
    /// concurrently either sees its reply or has already deregistered.
    /// Hands the message back when no live slot takes it.
    fn route_reply(&self, id: RequestId, message: Message) -> Result<Option<Message>, ConnectionError> {
        let pending = self.pending_table();
        let Some(slot) = pending.get(&id) else {
            return Ok(Some(message));
        };
        match slot.try_send(message) {
            Ok(()) => {
                tracing::trace!(session_id = %self.session_id, request_id = %id, "Reply routed");
                Ok(None)
            }
            Err(TrySendError::Full(_)) => Err(ConnectionError::DuplicateReply(id)),
            Err(TrySendError::Disconnected(message)) => {
                tracing::debug!(session_id = %self.session_id, request_id = %id, "Caller left, reply goes outbound");
                Ok(Some(message))
            }
        }
    }

    /// Pull the next client message. Called by the engine.
    ///
    /// The first call signals readiness.
    pub async fn read(&self, cancel: &CancellationToken) -> Result<Message, ConnectionError> {
        self.mark_ready();
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(ConnectionError::Closed),
            _ = cancel.cancelled() => Err(ConnectionError::Cancelled),
            message = self.inbound_rx.recv_async() => message.map_err(|_| ConnectionError::Closed),
        }
    }

    /// Pull the next outbound notification. Called by the event stream.
    pub async fn next_outbound(&self, cancel: &CancellationToken) -> Result<Message, ConnectionError> {
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(ConnectionError::Closed),
            _ = cancel.cancelled() => Err(ConnectionError::Cancelled),
            message = self.outbound_rx.recv_async() => message.map_err(|_| ConnectionError::Closed),
        }
    }

    /// Register a call awaiting its reply. The entry is removed when the guard drops.
    pub fn register_pending(&self, id: RequestId) -> Result<PendingReply<'_>, ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }
        let (tx, rx) = flume::bounded(1);
        match self.pending_table().entry(id.clone()) {
            Entry::Occupied(_) => return Err(ConnectionError::DuplicatePending(id)),
            Entry::Vacant(slot) => {
                slot.insert(tx);
            }
        }
        Ok(PendingReply {
            connection: self,
            id,
            rx,
        })
    }

    pub fn pending_count(&self) -> usize {
        self.pending_table().len()
    }

    /// Wait up to `timeout` for the engine's first `read`.
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        let mut rx = self.ready.subscribe();
        let ready = matches!(
            tokio::time::timeout(timeout, rx.wait_for(|ready| *ready)).await,
            Ok(Ok(_))
        );
        ready
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Close the connection. Idempotent.
    pub fn close(&self) {
        if self.close_once.swap(true, Ordering::AcqRel) {
            return;
        }
        self.closed.cancel();

        let released = {
            let mut pending = self.pending_table();
            let count = pending.len();
            pending.clear();
            count
        };
        let dropped_inbound = self.inbound_rx.drain().count();
        let dropped_outbound = self.outbound_rx.drain().count();

        tracing::debug!(
            session_id = %self.session_id,
            released,
            dropped_inbound,
            dropped_outbound,
            "Connection closed"
        );
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the connection is closed.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    fn mark_ready(&self) {
        let first = self.ready.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        });
        if first {
            tracing::debug!(session_id = %self.session_id, "Engine attached");
        }
    }

    fn pending_table(&self) -> MutexGuard<'_, HashMap<RequestId, flume::Sender<Message>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

/// A registered call waiting for its reply.
///
/// Dropping the guard deregisters the id, whether the reply arrived, the
/// caller timed out, or the waiting future was cancelled.
pub struct PendingReply<'a> {
    connection: &'a Connection,
    id: RequestId,
    rx: flume::Receiver<Message>,
}

impl PendingReply<'_> {
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Wait for the reply. Returns `Closed` if the connection closes first.
    pub async fn recv(&self) -> Result<Message, ConnectionError> {
        tokio::select! {
            biased;
            reply = self.rx.recv_async() => reply.map_err(|_| ConnectionError::Closed),
            _ = self.connection.closed() => Err(ConnectionError::Closed),
        }
    }
}

impl Drop for PendingReply<'_> {
    fn drop(&mut self) {
        self.connection.pending_table().remove(&self.id);
    }
}
