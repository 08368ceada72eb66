//! Session identifier generation.

use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Monotonic suffix appended to every identifier.
/// Keeps ids unique for the process lifetime even if the random part repeats.
static SESSION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque session identifier: 128 random bits followed by a 64-bit counter, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh identifier.
    ///
    /// Falls back to a clock-and-counter seed when the OS entropy source fails.
    pub fn generate() -> Self {
        let counter = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut random = [0u8; 16];
        if let Err(e) = OsRng.try_fill_bytes(&mut random) {
            tracing::warn!(error = %e, "OS entropy unavailable, seeding session id from clock");
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos();
            random = (nanos ^ ((counter as u128) << 64)).to_le_bytes();
        }

        let mut id = String::with_capacity(48);
        for byte in random {
            id.push_str(&format!("{:02x}", byte));
        }
        id.push_str(&format!("{:016x}", counter));
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique_and_hex() {
        let ids: HashSet<SessionId> = (0..1000).map(|_| SessionId::generate()).collect();
        assert_eq!(ids.len(), 1000);
        for id in &ids {
            assert_eq!(id.as_str().len(), 48);
            assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        }
    }
}
