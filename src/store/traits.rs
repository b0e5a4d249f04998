//! Unified `Database` trait: single async interface for all persistence.

use async_trait::async_trait;

use crate::directory::Program;
use crate::error::DatabaseError;
use crate::session::Session;

/// Backend-agnostic database trait covering sessions and the program directory.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Sessions ────────────────────────────────────────────────────

    /// Fetch the session for `phone_number`, inserting a default row first if
    /// none exists. Concurrent callers for the same identity observe the same
    /// row.
    async fn get_or_create_session(&self, phone_number: &str) -> Result<Session, DatabaseError>;

    /// Fetch a session without creating it.
    async fn get_session(&self, phone_number: &str) -> Result<Option<Session>, DatabaseError>;

    /// Upsert step, language and scratch data; bumps `updated_at`.
    async fn save_session(&self, session: &Session) -> Result<(), DatabaseError>;

    /// Total number of sessions.
    async fn count_sessions(&self) -> Result<usize, DatabaseError>;

    // ── Programs ────────────────────────────────────────────────────

    /// Insert a single program.
    async fn insert_program(&self, program: &Program) -> Result<(), DatabaseError>;

    /// Replace the whole directory atomically. Returns the number inserted.
    async fn replace_programs(&self, programs: &[Program]) -> Result<usize, DatabaseError>;

    /// Programs whose name contains `fragment` (case-insensitive), by name.
    async fn search_programs(
        &self,
        fragment: &str,
        limit: usize,
    ) -> Result<Vec<Program>, DatabaseError>;

    /// Every program, by name.
    async fn list_programs(&self) -> Result<Vec<Program>, DatabaseError>;

    /// Total number of programs.
    async fn count_programs(&self) -> Result<usize, DatabaseError>;
}
