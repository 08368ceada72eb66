//! Session registry and idle reaper.
//!
//! # Responsibilities
//! - Map session ids to live sessions (read/write lock, lookups dominate)
//! - Create sessions with a fresh Connection
//! - Evict sessions idle past the TTL, closing their Connection and
//!   clearing their worker marker
//!
//! # Design Decisions
//! - A session is inserted fully built, so lookups never see partial state
//! - The map is the only source of truth for session existence
//! - Closing a Connection never blocks, so it is safe under the write lock

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::SessionConfig;
use crate::observability::metrics;
use crate::session::{Connection, SessionId, StartGuard};

/// One logical client spanning many HTTP requests.
pub struct Session {
    id: SessionId,
    connection: Arc<Connection>,
    last_activity: Mutex<Instant>,
}

impl Session {
    fn new(id: SessionId, connection: Arc<Connection>) -> Self {
        Self {
            id,
            connection,
            last_activity: Mutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn last_activity(&self) -> Instant {
        *self.last_activity.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refresh the activity timestamp.
    pub fn touch(&self) {
        *self.last_activity.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_activity()) > ttl
    }
}

/// Concurrency-safe session map.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    workers: StartGuard,
    inbound_capacity: usize,
    outbound_capacity: usize,
}

impl SessionRegistry {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            workers: StartGuard::new(),
            inbound_capacity: config.inbound_capacity,
            outbound_capacity: config.outbound_capacity,
        }
    }

    /// Create and register a new session.
    pub fn create(&self) -> Arc<Session> {
        let id = SessionId::generate();
        let connection = Arc::new(Connection::new(
            id.clone(),
            self.inbound_capacity,
            self.outbound_capacity,
        ));
        let session = Arc::new(Session::new(id.clone(), connection));

        let active = {
            let mut sessions = self.write();
            sessions.insert(id.clone(), session.clone());
            sessions.len()
        };

        metrics::record_session_created(active);
        tracing::info!(session_id = %id, active, "Session created");
        session
    }

    pub fn lookup(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.read().get(id).cloned()
    }

    /// Remove a session explicitly, closing its Connection.
    pub fn remove(&self, id: &SessionId) -> Option<Arc<Session>> {
        let (removed, active) = {
            let mut sessions = self.write();
            let removed = sessions.remove(id);
            if let Some(session) = &removed {
                session.connection.close();
                self.workers.forget(id);
            }
            (removed, sessions.len())
        };
        if removed.is_some() {
            metrics::set_active_sessions(active);
            tracing::info!(session_id = %id, active, "Session terminated");
        }
        removed
    }

    /// Evict every session idle for longer than `ttl` as of `now`.
    ///
    /// Returns the number of sessions removed.
    pub fn reap(&self, now: Instant, ttl: Duration) -> usize {
        let (reaped, active) = {
            let mut sessions = self.write();
            let mut reaped = Vec::new();
            sessions.retain(|id, session| {
                if session.is_expired(now, ttl) {
                    session.connection.close();
                    self.workers.forget(id);
                    reaped.push(id.clone());
                    false
                } else {
                    true
                }
            });
            (reaped, sessions.len())
        };

        for id in &reaped {
            tracing::info!(session_id = %id, "Session expired");
        }
        if !reaped.is_empty() {
            metrics::record_sessions_reaped(reaped.len(), active);
        }
        reaped.len()
    }

    /// Close and drop every session. Used at shutdown.
    pub fn close_all(&self) -> usize {
        let drained: Vec<_> = self.write().drain().collect();
        for (id, session) in &drained {
            session.connection.close();
            self.workers.forget(id);
        }
        metrics::set_active_sessions(0);
        drained.len()
    }

    /// Claim the processing-worker slot for a session.
    ///
    /// Returns true for exactly one caller per live session.
    pub fn try_start_worker(&self, session: &Session) -> bool {
        if !self.workers.try_start(&session.id) {
            return false;
        }
        // Reaped between lookup and claim: do not leave a marker behind.
        if session.connection.is_closed() {
            self.workers.forget(&session.id);
            return false;
        }
        true
    }

    pub fn has_worker(&self, id: &SessionId) -> bool {
        self.workers.is_started(id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Run the periodic reaper until `shutdown` fires.
    pub fn spawn_reaper(
        self: Arc<Self>,
        interval: Duration,
        ttl: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                interval_secs = interval.as_secs(),
                ttl_secs = ttl.as_secs(),
                "Session reaper starting"
            );
            let mut ticker = time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let reaped = self.reap(Instant::now(), ttl);
                        tracing::debug!(reaped, active = self.len(), "Reaper sweep complete");
                    }
                    _ = shutdown.cancelled() => {
                        tracing::info!("Session reaper stopping");
                        break;
                    }
                }
            }
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<SessionId, Arc<Session>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SessionId, Arc<Session>>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(&SessionConfig::default())
    }

    #[test]
    fn create_then_lookup() {
        let registry = registry();
        let session = registry.create();
        let found = registry.lookup(session.id()).unwrap();
        assert!(Arc::ptr_eq(&session, &found));
        assert!(registry.lookup(&SessionId::from("nope")).is_none());
    }

    #[test]
    fn reap_evicts_only_idle_sessions() {
        let registry = registry();
        let stale = registry.create();
        let fresh = registry.create();
        assert!(registry.try_start_worker(&stale));

        let ttl = Duration::from_millis(20);
        assert_eq!(registry.reap(Instant::now(), ttl), 0);

        std::thread::sleep(Duration::from_millis(50));
        fresh.touch();
        let reaped = registry.reap(Instant::now(), ttl);

        assert_eq!(reaped, 1);
        assert!(registry.lookup(stale.id()).is_none());
        assert!(stale.connection().is_closed());
        assert!(!registry.has_worker(stale.id()));
        assert!(registry.lookup(fresh.id()).is_some());
        assert!(!fresh.connection().is_closed());
    }

    #[test]
    fn worker_starts_once_per_session() {
        let registry = registry();
        let session = registry.create();
        assert!(registry.try_start_worker(&session));
        assert!(!registry.try_start_worker(&session));
    }

    #[test]
    fn closed_session_never_gets_a_worker() {
        let registry = registry();
        let session = registry.create();
        registry.remove(session.id());
        assert!(!registry.try_start_worker(&session));
        assert!(!registry.has_worker(session.id()));
    }

    #[test]
    fn close_all_closes_connections() {
        let registry = registry();
        let a = registry.create();
        let b = registry.create();
        assert_eq!(registry.close_all(), 2);
        assert!(registry.is_empty());
        assert!(a.connection().is_closed());
        assert!(b.connection().is_closed());
    }

    #[tokio::test]
    async fn reaper_task_evicts_idle_sessions() {
        let registry = Arc::new(registry());
        let idle = registry.create();
        let shutdown = CancellationToken::new();
        let handle = registry.clone().spawn_reaper(
            Duration::from_millis(20),
            Duration::from_millis(50),
            shutdown.clone(),
        );

        let deadline = Instant::now() + Duration::from_secs(2);
        while registry.lookup(idle.id()).is_some() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(registry.lookup(idle.id()).is_none());
        assert!(idle.connection().is_closed());
        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn reaper_task_stops_on_shutdown() {
        let registry = Arc::new(registry());
        let shutdown = CancellationToken::new();
        let handle = registry.clone().spawn_reaper(
            Duration::from_millis(10),
            Duration::from_secs(3600),
            shutdown.clone(),
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.cancel();
        handle.await.unwrap();
    }
}
