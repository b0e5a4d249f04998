//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::directory::Program;
use crate::error::DatabaseError;
use crate::localization::Language;
use crate::session::{Session, Step};
use crate::store::migrations;
use crate::store::traits::Database;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<String>` to libsql Value.
fn opt_text_owned(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

/// Map a libsql Row to a Session.
///
/// Column order matches SESSION_COLUMNS:
/// 0:phone_number, 1:current_step, 2:language, 3:temp_data, 4:created_at, 5:updated_at
fn row_to_session(row: &libsql::Row) -> Result<Session, libsql::Error> {
    let phone_number: String = row.get(0)?;
    let step_str: String = row.get(1)?;
    let language_str: String = row.get(2)?;
    let temp_data_str: String = row.get::<String>(3).unwrap_or_else(|_| "{}".into());
    let created_str: String = row.get(4)?;
    let updated_str: String = row.get(5)?;

    let temp_data = match serde_json::from_str::<serde_json::Value>(&temp_data_str) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };

    Ok(Session {
        phone_number,
        current_step: Step::from_stored(&step_str),
        language: Language::from_code(&language_str).unwrap_or_default(),
        temp_data,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

/// Map a libsql Row to a Program.
///
/// Column order matches PROGRAM_COLUMNS:
/// 0:id, 1:name, 2:sector, 3:level, 4:agency, 5:link, 6:description
fn row_to_program(row: &libsql::Row) -> Result<Program, libsql::Error> {
    let id_str: String = row.get(0)?;
    Ok(Program {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        name: row.get(1)?,
        sector: row.get(2)?,
        level: row.get::<String>(3).unwrap_or_default(),
        agency: row.get(4)?,
        link: row.get(5)?,
        description: row.get::<Option<String>>(6).unwrap_or(None),
    })
}

async fn collect_programs(
    mut rows: libsql::Rows,
    op: &str,
) -> Result<Vec<Program>, DatabaseError> {
    let mut programs = Vec::new();
    loop {
        match rows.next().await {
            Ok(Some(row)) => programs.push(
                row_to_program(&row)
                    .map_err(|e| DatabaseError::Query(format!("{op} row parse: {e}")))?,
            ),
            Ok(None) => break,
            Err(e) => return Err(DatabaseError::Query(format!("{op}: {e}"))),
        }
    }
    Ok(programs)
}

async fn count_rows(conn: &Connection, table: &str) -> Result<usize, DatabaseError> {
    let mut rows = conn
        .query(&format!("SELECT COUNT(*) FROM {table}"), ())
        .await
        .map_err(|e| DatabaseError::Query(format!("count {table}: {e}")))?;
    match rows.next().await {
        Ok(Some(row)) => Ok(row.get::<i64>(0).unwrap_or(0).max(0) as usize),
        Ok(None) => Ok(0),
        Err(e) => Err(DatabaseError::Query(format!("count {table}: {e}"))),
    }
}

// ── Trait implementation ────────────────────────────────────────────

const SESSION_COLUMNS: &str = "phone_number, current_step, language, temp_data, created_at, updated_at";

const PROGRAM_COLUMNS: &str = "id, name, sector, level, agency, link, description";

const INSERT_PROGRAM_SQL: &str = "INSERT INTO federal_programs (id, name, sector, level, agency, link, description) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Sessions ────────────────────────────────────────────────────

    async fn get_or_create_session(&self, phone_number: &str) -> Result<Session, DatabaseError> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();

        let inserted = conn
            .execute(
                "INSERT INTO whatsapp_sessions (phone_number, current_step, language, temp_data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, '{}', ?4, ?4)
                 ON CONFLICT (phone_number) DO NOTHING",
                params![
                    phone_number,
                    Step::MainMenu.as_str(),
                    Language::En.code(),
                    now
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_or_create_session insert: {e}")))?;

        if inserted > 0 {
            info!(identity = phone_number, "New session created");
        }

        self.get_session(phone_number)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "session".into(),
                id: phone_number.to_string(),
            })
    }

    async fn get_session(&self, phone_number: &str) -> Result<Option<Session>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {SESSION_COLUMNS} FROM whatsapp_sessions WHERE phone_number = ?1"),
                params![phone_number],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_session: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let session = row_to_session(&row)
                    .map_err(|e| DatabaseError::Query(format!("get_session row parse: {e}")))?;
                Ok(Some(session))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_session: {e}"))),
        }
    }

    async fn save_session(&self, session: &Session) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        let temp_data = serde_json::to_string(&session.temp_data)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        conn.execute(
            "INSERT INTO whatsapp_sessions (phone_number, current_step, language, temp_data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (phone_number) DO UPDATE SET
                current_step = ?2, language = ?3, temp_data = ?4, updated_at = ?6",
            params![
                session.phone_number.as_str(),
                session.current_step.as_str(),
                session.language.code(),
                temp_data,
                session.created_at.to_rfc3339(),
                now
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("save_session: {e}")))?;

        debug!(
            identity = %session.phone_number,
            step = %session.current_step,
            language = %session.language,
            "Session saved"
        );
        Ok(())
    }

    async fn count_sessions(&self) -> Result<usize, DatabaseError> {
        count_rows(self.conn(), "whatsapp_sessions").await
    }

    // ── Programs ────────────────────────────────────────────────────

    async fn insert_program(&self, program: &Program) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                INSERT_PROGRAM_SQL,
                params![
                    program.id.to_string(),
                    program.name.as_str(),
                    program.sector.as_str(),
                    program.level.as_str(),
                    program.agency.as_str(),
                    program.link.as_str(),
                    opt_text_owned(program.description.clone())
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_program: {e}")))?;
        Ok(())
    }

    async fn replace_programs(&self, programs: &[Program]) -> Result<usize, DatabaseError> {
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("replace_programs begin: {e}")))?;

        tx.execute("DELETE FROM federal_programs", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("replace_programs clear: {e}")))?;

        for program in programs {
            tx.execute(
                INSERT_PROGRAM_SQL,
                params![
                    program.id.to_string(),
                    program.name.as_str(),
                    program.sector.as_str(),
                    program.level.as_str(),
                    program.agency.as_str(),
                    program.link.as_str(),
                    opt_text_owned(program.description.clone())
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("replace_programs insert {}: {e}", program.name)))?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("replace_programs commit: {e}")))?;

        info!(count = programs.len(), "Program directory replaced");
        Ok(programs.len())
    }

    async fn search_programs(
        &self,
        fragment: &str,
        limit: usize,
    ) -> Result<Vec<Program>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {PROGRAM_COLUMNS} FROM federal_programs
                     WHERE instr(lower(name), lower(?1)) > 0
                     ORDER BY name LIMIT ?2"
                ),
                params![fragment, limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("search_programs: {e}")))?;
        collect_programs(rows, "search_programs").await
    }

    async fn list_programs(&self) -> Result<Vec<Program>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!("SELECT {PROGRAM_COLUMNS} FROM federal_programs ORDER BY name"),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_programs: {e}")))?;
        collect_programs(rows, "list_programs").await
    }

    async fn count_programs(&self) -> Result<usize, DatabaseError> {
        count_rows(self.conn(), "federal_programs").await
    }
}
