//! Per-identity mutual exclusion for conversation turns.
//!
//! Two webhook deliveries for the same identity must not interleave their
//! load → step → save sequence. Each identity gets its own async mutex;
//! different identities never contend.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry size above which dead entries are swept on acquisition.
const SWEEP_THRESHOLD: usize = 1024;

/// Guard held for the duration of one identity's turn.
pub type TurnGuard = OwnedMutexGuard<()>;

/// Lock table keyed by identity.
#[derive(Default)]
pub struct IdentityLocks {
    locks: Mutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `identity`.
    pub async fn acquire(&self, identity: &str) -> TurnGuard {
        let lock = {
            let mut locks = self.locks.lock().await;
            if locks.len() >= SWEEP_THRESHOLD {
                locks.retain(|_, weak| weak.strong_count() > 0);
            }
            match locks.get(identity).and_then(Weak::upgrade) {
                Some(existing) => existing,
                None => {
                    let fresh = Arc::new(Mutex::new(()));
                    locks.insert(identity.to_string(), Arc::downgrade(&fresh));
                    fresh
                }
            }
        };
        lock.lock_owned().await
    }

    /// Number of identities with a live lock (held or awaited).
    pub async fn active(&self) -> usize {
        self.locks
            .lock()
            .await
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}
