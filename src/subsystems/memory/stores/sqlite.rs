//! `sqlite` store — durable session records in one table.
//!
//! ## Storage layout
//! ```text
//! {work_dir}/{project_id}.sqlite3
//! └── table {session_entity}
//!     ├── session_id        TEXT PRIMARY KEY
//!     ├── conversation      TEXT  -- JSON array of turns
//!     └── last_message_utc  TEXT  -- RFC 3339
//! ```

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::AppError;

use super::super::store::SessionStore;
use super::super::types::{SessionRecord, Turn};

pub struct SqliteStore {
    conn: Mutex<Connection>,
    /// `[A-Za-z0-9_]+`; always spliced as a quoted identifier so keywords
    /// and leading digits are valid table names.
    table: String,
}

impl SqliteStore {
    /// Open (or create) the database and ensure the session table exists.
    pub fn open(db_path: &Path, table: &str) -> Result<Self, AppError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Memory(format!("sqlite: create {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(db_path).map_err(|e| {
            AppError::Memory(format!("sqlite: open {}: {e}", db_path.display()))
        })?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| AppError::Memory(format!("sqlite: set journal_mode WAL: {e}")))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|e| AppError::Memory(format!("sqlite: set busy_timeout: {e}")))?;
        Self::init(conn, table)
    }

    /// In-memory database, for tests.
    pub fn open_in_memory(table: &str) -> Result<Self, AppError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Memory(format!("sqlite: open in-memory: {e}")))?;
        Self::init(conn, table)
    }

    fn init(conn: Connection, table: &str) -> Result<Self, AppError> {
        if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(AppError::Memory(format!("sqlite: invalid table name '{table}'")));
        }
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (
                session_id TEXT PRIMARY KEY,
                conversation TEXT NOT NULL,
                last_message_utc TEXT NOT NULL
            );"
        ))
        .map_err(|e| AppError::Memory(format!("sqlite: initialize schema: {e}")))?;
        Ok(Self { conn: Mutex::new(conn), table: table.to_string() })
    }
}

impl SessionStore for SqliteStore {
    fn backend(&self) -> &str {
        "sqlite"
    }

    fn get(&self, session_id: &str) -> Result<Option<SessionRecord>, AppError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Memory("sqlite store lock poisoned".into()))?;
        let row: Option<(String, String)> = conn
            .query_row(
                &format!(
                    "SELECT conversation, last_message_utc FROM \"{}\" WHERE session_id = ?1",
                    self.table
                ),
                params![session_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| AppError::Memory(format!("sqlite: read session {session_id}: {e}")))?;

        let Some((conversation, last_message_utc)) = row else {
            return Ok(None);
        };
        let conversation: Vec<Turn> = serde_json::from_str(&conversation).map_err(|e| {
            AppError::Memory(format!("sqlite: decode conversation for {session_id}: {e}"))
        })?;
        let last_message_utc = DateTime::parse_from_rfc3339(&last_message_utc)
            .map_err(|e| AppError::Memory(format!("sqlite: decode timestamp for {session_id}: {e}")))?
            .with_timezone(&Utc);
        Ok(Some(SessionRecord { conversation, last_message_utc }))
    }

    fn put(&self, session_id: &str, record: &SessionRecord) -> Result<(), AppError> {
        let conversation = serde_json::to_string(&record.conversation)
            .map_err(|e| AppError::Memory(format!("sqlite: encode conversation: {e}")))?;
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Memory("sqlite store lock poisoned".into()))?;
        conn.execute(
            &format!(
                "INSERT INTO \"{}\" (session_id, conversation, last_message_utc)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(session_id) DO UPDATE SET
                    conversation = excluded.conversation,
                    last_message_utc = excluded.last_message_utc",
                self.table
            ),
            params![session_id, conversation, record.last_message_utc.to_rfc3339()],
        )
        .map_err(|e| AppError::Memory(format!("sqlite: write session {session_id}: {e}")))?;
        Ok(())
    }
}
