//! Database schema migrations.
//!
//! Applies the initial schema: the messages, preferences and
//! schema_migrations tables.

use rusqlite::Connection;
use tracing::info;

use healthmate_core::error::HealthmateError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), HealthmateError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| HealthmateError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| {
            HealthmateError::Storage(format!("Failed to query migration version: {}", e))
        })?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<(), HealthmateError> {
    conn.execute_batch(
        "
        -- Chat history, one row per message. Rows are stored as received;
        -- the repository validates shape when reading them back.
        CREATE TABLE IF NOT EXISTS messages (
            seq             INTEGER PRIMARY KEY AUTOINCREMENT,
            id              TEXT NOT NULL,
            conversation_id TEXT NOT NULL,
            sender          TEXT NOT NULL,
            content         TEXT NOT NULL DEFAULT '',
            timestamp       TEXT NOT NULL,
            UNIQUE (conversation_id, id)
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation_ts
            ON messages (conversation_id, timestamp);

        -- Client-local settings (selected locale, cached daily tip).
        CREATE TABLE IF NOT EXISTS preferences (
            key         TEXT PRIMARY KEY NOT NULL,
            value       TEXT NOT NULL,
            updated_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        INSERT INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| HealthmateError::Storage(format!("Failed to apply migration v1: {}", e)))?;
    Ok(())
}
