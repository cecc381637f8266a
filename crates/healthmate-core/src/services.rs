//! Collaborator contracts consumed by the chat layer.
//!
//! Storage, preferences and identity are external services from the
//! conversation's point of view; these traits are the narrow seams it talks
//! through. `healthmate-storage` provides the SQLite-backed implementations.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::Result;
use crate::types::{Identity, Message};

/// Callback invoked with the full ordered message list of a conversation.
pub type SnapshotFn = Arc<dyn Fn(Vec<Message>) + Send + Sync>;

/// Scoped handle to a live snapshot subscription.
///
/// Dropping the handle (or calling [`Subscription::unsubscribe`]) stops
/// further deliveries.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A subscription with nothing to release.
    pub fn detached() -> Self {
        Self { release: None }
    }

    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// Document store holding per-conversation message history with a live feed.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append one message to a conversation. Each call is independent; there
    /// is no grouping of several appends.
    async fn append(&self, conversation_id: &str, message: &Message) -> Result<()>;

    /// Register for snapshots of a conversation, ordered by ascending
    /// timestamp. The current snapshot is delivered before this returns, and
    /// a new one after every append to the conversation.
    fn subscribe(&self, conversation_id: &str, on_snapshot: SnapshotFn) -> Result<Subscription>;
}

/// Persistent key/value settings surviving restarts.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Source of the current authenticated identity.
pub trait IdentityProvider: Send + Sync {
    fn current_identity(&self) -> Option<Identity>;

    /// Change notifications; the receiver always holds the latest identity.
    fn watch(&self) -> watch::Receiver<Option<Identity>>;
}

/// In-process identity holder with explicit sign-in and sign-out.
#[derive(Debug)]
pub struct SessionIdentity {
    tx: watch::Sender<Option<Identity>>,
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SessionIdentity {
    pub fn new(initial: Option<Identity>) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn sign_in(&self, identity: Identity) {
        tracing::info!(uid = %identity.uid, "Signed in");
        self.tx.send_replace(Some(identity));
    }

    pub fn sign_out(&self) {
        if let Some(previous) = self.tx.send_replace(None) {
            tracing::info!(uid = %previous.uid, "Signed out");
        }
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_identity(&self) -> Option<Identity> {
        self.tx.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.tx.subscribe()
    }
}

// =============================================================================
// Tests
// =============================================================================
