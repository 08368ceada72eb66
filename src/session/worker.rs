//! Start-once guard for per-session processing workers.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Instant;

use crate::session::SessionId;

/// Records which sessions already have a processing worker.
///
/// The first `try_start` for a key wins; later calls observe the marker
/// until the session is torn down and the marker forgotten.
#[derive(Debug, Default)]
pub struct StartGuard {
    started: DashMap<SessionId, Instant>,
}

impl StartGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true exactly once per key until [`forget`](Self::forget).
    pub fn try_start(&self, id: &SessionId) -> bool {
        match self.started.entry(id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
                true
            }
        }
    }

    pub fn forget(&self, id: &SessionId) {
        self.started.remove(id);
    }

    pub fn is_started(&self, id: &SessionId) -> bool {
        self.started.contains_key(id)
    }
}
