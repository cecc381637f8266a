use serde::{Deserialize, Serialize};

use crate::locale::Locale;
use crate::types::{ConversationMode, Message};

/// Events emitted by a conversation after its rendered state changes.
///
/// Consumed by renderers (the terminal front end, tests) through a
/// broadcast channel. Every event describes a change that has already been
/// applied.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ChatEvent {
    /// A message was appended to the rendered sequence.
    MessageAppended { message: Message },

    /// A remote snapshot was reconciled into the rendered sequence.
    SnapshotApplied { count: usize, usage: u32 },

    /// The conversation was (re)mounted, discarding prior rendered state.
    ConversationReset { mode: ConversationMode },

    /// The active locale changed. Already rendered messages are untouched.
    LocaleChanged { locale: Locale },

    /// Persisting a message to the store failed. The rendered sequence is
    /// unaffected.
    PersistFailed { message_id: String, reason: String },
}

impl ChatEvent {
    /// Short machine name, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatEvent::MessageAppended { .. } => "message_appended",
            ChatEvent::SnapshotApplied { .. } => "snapshot_applied",
            ChatEvent::ConversationReset { .. } => "conversation_reset",
            ChatEvent::LocaleChanged { .. } => "locale_changed",
            ChatEvent::PersistFailed { .. } => "persist_failed",
        }
    }
}
