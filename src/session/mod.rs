//! Session store: durable per-identity conversation state.

pub mod locks;
pub mod model;

pub use locks::{IdentityLocks, TurnGuard};
pub use model::{Session, Step};

use std::sync::Arc;

use tracing::debug;

use crate::error::DatabaseError;
use crate::store::Database;

/// Get-or-create / save access to sessions, plus the per-identity turn lock.
pub struct SessionStore {
    db: Arc<dyn Database>,
    locks: IdentityLocks,
}

impl SessionStore {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            db,
            locks: IdentityLocks::new(),
        }
    }

    /// Serialize turns for one identity. Hold the guard across
    /// `get_or_create` → step → `save`.
    pub async fn lock(&self, identity: &str) -> TurnGuard {
        self.locks.acquire(identity).await
    }

    /// Load the session for `identity`, creating it on first contact.
    pub async fn get_or_create(&self, identity: &str) -> Result<Session, DatabaseError> {
        let session = self.db.get_or_create_session(identity).await?;
        debug!(identity, step = %session.current_step, language = %session.language, "Session loaded");
        Ok(session)
    }

    /// Persist step, language and scratch data.
    pub async fn save(&self, session: &Session) -> Result<(), DatabaseError> {
        self.db.save_session(session).await
    }
}
