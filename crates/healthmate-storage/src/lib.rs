//! Healthmate Storage crate - SQLite persistence for chat history and
//! client-local preferences, plus the live snapshot feed.
//!
//! Provides a WAL-mode SQLite database with migrations, repository
//! implementations for messages and preferences, and `SqliteMessageStore`,
//! which pushes ordered conversation snapshots to subscribers on every append.

pub mod db;
pub mod feed;
pub mod migrations;
pub mod repository;

pub use db::Database;
pub use feed::SqliteMessageStore;
pub use repository::{MessageRepository, PreferenceRepository};
