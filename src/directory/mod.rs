//! Program directory: read-only lookup of known official programs.

pub mod model;

pub use model::Program;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::classifier::allowlist::covers;
use crate::classifier::{host_of, normalize_url};
use crate::error::{ConfigError, DatabaseError, Result};
use crate::store::Database;

/// Cap on results rendered for a "multiple matches" reply.
pub const MAX_MATCHES: usize = 5;

/// Names suggested when a lookup finds nothing.
pub const EXAMPLE_PROGRAMS: [&str; 3] = ["N-Power", "Anchor Borrowers", "Conditional Cash Transfer"];

/// Outcome of a name lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgramLookup {
    Found(Program),
    Multiple(Vec<Program>),
    NotFound,
}

/// Name and domain lookups over the stored program table.
#[derive(Clone)]
pub struct ProgramDirectory {
    db: Arc<dyn Database>,
}

impl ProgramDirectory {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Case-insensitive substring lookup by program name.
    ///
    /// An exact (case-insensitive) name match among several candidates wins
    /// outright.
    pub async fn lookup(&self, query: &str) -> std::result::Result<ProgramLookup, DatabaseError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(ProgramLookup::NotFound);
        }

        let mut matches = self.db.search_programs(query, MAX_MATCHES).await?;
        debug!(query, matches = matches.len(), "Program lookup");

        Ok(match matches.len() {
            0 => ProgramLookup::NotFound,
            1 => ProgramLookup::Found(matches.remove(0)),
            _ => match matches.iter().position(|p| p.name.eq_ignore_ascii_case(query)) {
                Some(idx) => ProgramLookup::Found(matches.remove(idx)),
                None => ProgramLookup::Multiple(matches),
            },
        })
    }

    /// Program whose official link is on `host` or a parent domain of it.
    ///
    /// Hosts compare label by label after dropping a leading `www.`; the
    /// most specific official domain wins.
    pub async fn match_host(&self, host: &str) -> std::result::Result<Option<Program>, DatabaseError> {
        let host = bare_host(host.trim());
        if host.is_empty() {
            return Ok(None);
        }

        let mut best: Option<(usize, Program)> = None;
        for program in self.db.list_programs().await? {
            let Some(official) = host_of(&normalize_url(&program.link)) else {
                continue;
            };
            let official = bare_host(&official);
            if official.is_empty() || !covers(&official, &host) {
                continue;
            }
            if best.as_ref().is_none_or(|(len, _)| official.len() > *len) {
                best = Some((official.len(), program));
            }
        }
        Ok(best.map(|(_, program)| program))
    }

    /// Replace the directory with `programs`.
    pub async fn import(&self, programs: &[Program]) -> std::result::Result<usize, DatabaseError> {
        self.db.replace_programs(programs).await
    }

    /// Replace the directory from a JSON array of programs.
    pub async fn import_file(&self, path: &Path) -> Result<usize> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(ConfigError::Io)?;
        let programs: Vec<Program> = serde_json::from_str(&raw).map_err(|e| {
            ConfigError::ParseError(format!("{}: {e}", path.display()))
        })?;
        let count = self.import(&programs).await?;
        info!(path = %path.display(), count, "Imported programs");
        Ok(count)
    }

    pub async fn count(&self) -> std::result::Result<usize, DatabaseError> {
        self.db.count_programs().await
    }
}

fn bare_host(host: &str) -> String {
    let host = host.to_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    }
}
