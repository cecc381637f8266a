use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::HealthmateError;
use crate::locale::Locale;

// =============================================================================
// Enums
// =============================================================================

/// Who produced a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    /// Older persisted documents tag assistant turns as `ai`.
    #[serde(alias = "ai")]
    Assistant,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sender {
    type Err = HealthmateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Sender::User),
            "assistant" | "ai" => Ok(Sender::Assistant),
            other => Err(HealthmateError::Serialization(format!(
                "unknown message sender: {other}"
            ))),
        }
    }
}

/// Lifecycle phase of a conversation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationMode {
    /// Not yet mounted.
    #[default]
    Uninitialized,
    /// Anonymous session: messages live only in memory.
    LocalOnly,
    /// Authenticated session: the store's live feed is authoritative.
    RemoteBacked,
}

impl fmt::Display for ConversationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationMode::Uninitialized => write!(f, "Uninitialized"),
            ConversationMode::LocalOnly => write!(f, "LocalOnly"),
            ConversationMode::RemoteBacked => write!(f, "RemoteBacked"),
        }
    }
}

/// Role attached to an authenticated identity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Member,
    Admin,
}

/// An action that requires an explicit grant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Create, edit and delete blog content.
    ManageContent,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::ManageContent => write!(f, "manage_content"),
        }
    }
}

impl Role {
    /// Returns whether this role carries the given capability.
    pub fn grants(&self, capability: Capability) -> bool {
        match (self, capability) {
            (Role::Admin, Capability::ManageContent) => true,
            (Role::Member, Capability::ManageContent) => false,
        }
    }
}

// =============================================================================
// Structs
// =============================================================================

/// A single chat message. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Opaque identifier, assigned locally or by the store.
    pub id: String,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Fixed id of the synthetic greeting seeded into anonymous sessions.
    pub const WELCOME_ID: &'static str = "welcome";

    /// Create a message with a fresh local id stamped with the current instant.
    pub fn new(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            sender,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Sender::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, content)
    }

    /// The greeting shown when an anonymous conversation is mounted.
    pub fn welcome(locale: Locale) -> Self {
        Self {
            id: Self::WELCOME_ID.to_string(),
            content: locale.welcome_text().to_string(),
            sender: Sender::Assistant,
            timestamp: Utc::now(),
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.sender == Sender::Assistant
    }

    /// RFC 3339 rendering with millisecond precision, as persisted.
    pub fn timestamp_rfc3339(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// An authenticated user as reported by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque user id; also the id of the user's conversation in the store.
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
}

impl Identity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            role: Role::Member,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// The store-side conversation this identity's chat history lives in.
    pub fn conversation_id(&self) -> &str {
        &self.uid
    }
}

// =============================================================================
// Tests
// =============================================================================
