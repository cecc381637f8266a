//! SQLite handle shared by the message feed and the preference store.
//!
//! One connection behind a Mutex. Every append is followed by a full
//! snapshot query for the touched conversation, so file databases run in
//! WAL mode to keep those reads off the writer's lock.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

use healthmate_core::error::HealthmateError;

use crate::migrations;

const FILE_PRAGMAS: &str = "PRAGMA journal_mode = WAL;
     PRAGMA synchronous = NORMAL;
     PRAGMA foreign_keys = ON;";

/// An in-memory database keeps no journal file, so WAL does not apply.
const MEMORY_PRAGMAS: &str = "PRAGMA foreign_keys = ON;";

/// Thread-safe SQLite database wrapper.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the chat history database at `path`, creating
    /// parent directories as needed, and bring its schema up to date.
    pub fn new(path: &Path) -> Result<Self, HealthmateError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| HealthmateError::Storage(format!("Failed to open database: {}", e)))?;
        let db = Self::prepare(conn, FILE_PRAGMAS)?;
        info!(path = %path.display(), "Chat history database opened");
        Ok(db)
    }

    /// Open a throwaway database. History and preferences are lost when it
    /// is dropped.
    pub fn in_memory() -> Result<Self, HealthmateError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            HealthmateError::Storage(format!("Failed to open in-memory db: {}", e))
        })?;
        Self::prepare(conn, MEMORY_PRAGMAS)
    }

    fn prepare(conn: Connection, pragmas: &str) -> Result<Self, HealthmateError> {
        conn.execute_batch(pragmas)
            .map_err(|e| HealthmateError::Storage(format!("Failed to set pragmas: {}", e)))?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Run `f` against the connection. The lock is held until `f` returns,
    /// so `f` must not call back into the database.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, HealthmateError>
    where
        F: FnOnce(&Connection) -> Result<T, HealthmateError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| HealthmateError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}
