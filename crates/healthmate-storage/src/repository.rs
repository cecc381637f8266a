//! Repository implementations for SQLite-backed persistence.
//!
//! Provides MessageRepository for chat history and PreferenceRepository for
//! client-local settings, both operating on the Database struct using raw SQL.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use tracing::warn;

use healthmate_core::error::HealthmateError;
use healthmate_core::services::PreferenceStore;
use healthmate_core::types::{Message, Sender};

use crate::db::Database;

/// Repository for chat messages, partitioned by conversation.
pub struct MessageRepository {
    db: Arc<Database>,
}

impl MessageRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store one message in a conversation.
    ///
    /// Fails if the conversation already holds a message with the same id.
    pub fn insert(&self, conversation_id: &str, message: &Message) -> Result<(), HealthmateError> {
        if message.id.trim().is_empty() {
            return Err(HealthmateError::Storage(
                "message id must not be empty".to_string(),
            ));
        }
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, conversation_id, sender, content, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    message.id,
                    conversation_id,
                    message.sender.as_str(),
                    message.content,
                    message.timestamp_rfc3339(),
                ],
            )
            .map_err(|e| HealthmateError::Storage(format!("Failed to save message: {}", e)))?;
            Ok(())
        })
    }

    /// All well-formed messages of a conversation, oldest first.
    ///
    /// Rows that do not decode into a valid message are logged and skipped.
    pub fn list(&self, conversation_id: &str) -> Result<Vec<Message>, HealthmateError> {
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, sender, content, timestamp
                     FROM messages
                     WHERE conversation_id = ?1
                     ORDER BY timestamp ASC, seq ASC",
                )
                .map_err(|e| HealthmateError::Storage(e.to_string()))?;

            let mapped = stmt
                .query_map(rusqlite::params![conversation_id], |row| {
                    Ok(RawMessageRow {
                        id: row.get(0)?,
                        sender: row.get(1)?,
                        content: row.get(2)?,
                        timestamp: row.get(3)?,
                    })
                })
                .map_err(|e| HealthmateError::Storage(e.to_string()))?;

            let mut rows = Vec::new();
            for row in mapped {
                rows.push(row.map_err(|e| HealthmateError::Storage(e.to_string()))?);
            }
            Ok(rows)
        })?;

        let mut messages = Vec::with_capacity(rows.len());
        for raw in rows {
            match raw.decode() {
                Ok(message) => messages.push(message),
                Err(reason) => warn!(
                    conversation_id,
                    row_id = %raw.id,
                    reason = %reason,
                    "Skipping malformed message row"
                ),
            }
        }
        Ok(messages)
    }

    /// Stored rows for a conversation, malformed ones included.
    #[cfg(test)]
    fn count(&self, conversation_id: &str) -> Result<u64, HealthmateError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
                rusqlite::params![conversation_id],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n as u64)
            .map_err(|e| HealthmateError::Storage(e.to_string()))
        })
    }
}

/// A message row exactly as stored, before validation.
#[derive(Debug)]
struct RawMessageRow {
    id: String,
    sender: String,
    content: String,
    timestamp: String,
}

impl RawMessageRow {
    fn decode(&self) -> Result<Message, String> {
        if self.id.trim().is_empty() {
            return Err("empty id".to_string());
        }
        let sender: Sender = self.sender.parse().map_err(|e| format!("{}", e))?;
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| format!("bad timestamp '{}': {}", self.timestamp, e))?
            .with_timezone(&Utc);
        Ok(Message {
            id: self.id.clone(),
            content: self.content.clone(),
            sender,
            timestamp,
        })
    }
}

// =============================================================================
// PreferenceRepository
// =============================================================================

/// Key/value settings table.
pub struct PreferenceRepository {
    db: Arc<Database>,
}

impl PreferenceRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl PreferenceStore for PreferenceRepository {
    fn get(&self, key: &str) -> Result<Option<String>, HealthmateError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| HealthmateError::Storage(e.to_string()))
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), HealthmateError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO preferences (key, value, updated_at)
                 VALUES (?1, ?2, strftime('%s', 'now'))
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
                rusqlite::params![key, value],
            )
            .map_err(|e| HealthmateError::Storage(format!("Failed to save preference: {}", e)))?;
            Ok(())
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn setup() -> (Arc<Database>, MessageRepository) {
        let db = Arc::new(Database::in_memory().unwrap());
        let repo = MessageRepository::new(Arc::clone(&db));
        (db, repo)
    }

    fn message_at(id: &str, sender: Sender, content: &str, secs: i64) -> Message {
        Message {
            id: id.to_string(),
            content: content.to_string(),
            sender,
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    fn insert_raw(db: &Database, id: &str, sender: &str, ts: &str) {
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, conversation_id, sender, content, timestamp)
                 VALUES (?1, 'u-1', ?2, 'raw', ?3)",
                rusqlite::params![id, sender, ts],
            )
            .map_err(|e| HealthmateError::Storage(e.to_string()))?;
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_insert_and_list() {
        let (_db, repo) = setup();
        let msg = message_at("m-1", Sender::User, "pain in knee", 1_700_000_000);
        repo.insert("u-1", &msg).unwrap();

        let listed = repo.list("u-1").unwrap();
        assert_eq!(listed, vec![msg]);
    }

    #[test]
    fn test_list_orders_by_timestamp() {
        let (_db, repo) = setup();
        repo.insert("u-1", &message_at("late", Sender::Assistant, "b", 1_700_000_100))
            .unwrap();
        repo.insert("u-1", &message_at("early", Sender::User, "a", 1_700_000_000))
            .unwrap();

        let ids: Vec<String> = repo.list("u-1").unwrap().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn test_list_equal_timestamps_keep_insertion_order() {
        let (_db, repo) = setup();
        repo.insert("u-1", &message_at("first", Sender::User, "q", 1_700_000_000))
            .unwrap();
        repo.insert("u-1", &message_at("second", Sender::Assistant, "a", 1_700_000_000))
            .unwrap();

        let ids: Vec<String> = repo.list("u-1").unwrap().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn test_conversations_are_isolated() {
        let (_db, repo) = setup();
        repo.insert("u-1", &Message::user("mine")).unwrap();
        repo.insert("u-2", &Message::user("theirs")).unwrap();

        let mine = repo.list("u-1").unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].content, "mine");
        assert!(repo.list("u-3").unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let (_db, repo) = setup();
        let msg = Message::user("hello");
        repo.insert("u-1", &msg).unwrap();
        let err = repo.insert("u-1", &msg).unwrap_err();
        assert!(matches!(err, HealthmateError::Storage(_)));
    }

    #[test]
    fn test_empty_id_rejected() {
        let (_db, repo) = setup();
        let mut msg = Message::user("hello");
        msg.id = "  ".to_string();
        assert!(repo.insert("u-1", &msg).is_err());
        assert_eq!(repo.count("u-1").unwrap(), 0);
    }

    #[test]
    fn test_legacy_ai_sender_decodes_as_assistant() {
        let (db, repo) = setup();
        insert_raw(&db, "legacy", "ai", "2024-01-01T00:00:00.000Z");

        let listed = repo.list("u-1").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].sender, Sender::Assistant);
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let (db, repo) = setup();
        insert_raw(&db, "ok", "user", "2024-01-01T00:00:00.000Z");
        insert_raw(&db, "bad-sender", "robot", "2024-01-01T00:00:01.000Z");
        insert_raw(&db, "bad-ts", "user", "yesterday");

        let listed = repo.list("u-1").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "ok");
        assert_eq!(repo.count("u-1").unwrap(), 3);
    }

    #[test]
    fn test_preferences_get_missing() {
        let (db, _) = setup();
        let prefs = PreferenceRepository::new(db);
        assert_eq!(prefs.get("preferred_language").unwrap(), None);
    }

    #[test]
    fn test_preferences_upsert() {
        let (db, _) = setup();
        let prefs = PreferenceRepository::new(db);
        prefs.set("preferred_language", "hi").unwrap();
        prefs.set("preferred_language", "fr").unwrap();
        assert_eq!(
            prefs.get("preferred_language").unwrap().as_deref(),
            Some("fr")
        );
    }
}
