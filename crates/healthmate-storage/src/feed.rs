//! Live message feed over the SQLite message table.
//!
//! `SqliteMessageStore` implements the `MessageStore` contract: appends are
//! persisted through `MessageRepository` and every subscriber of the touched
//! conversation then receives a fresh, fully ordered snapshot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use tracing::{debug, warn};

use healthmate_core::error::HealthmateError;
use healthmate_core::services::{MessageStore, SnapshotFn, Subscription};
use healthmate_core::types::Message;

use crate::db::Database;
use crate::repository::MessageRepository;

type SubscriberMap = HashMap<String, Vec<(u64, SnapshotFn)>>;

/// SQLite-backed message store with per-conversation snapshot subscriptions.
pub struct SqliteMessageStore {
    repo: MessageRepository,
    subscribers: Arc<Mutex<SubscriberMap>>,
    next_subscription: AtomicU64,
}

impl SqliteMessageStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            repo: MessageRepository::new(db),
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            next_subscription: AtomicU64::new(1),
        }
    }

    #[cfg(test)]
    fn snapshot(&self, conversation_id: &str) -> Result<Vec<Message>, HealthmateError> {
        self.repo.list(conversation_id)
    }

    #[cfg(test)]
    fn subscriber_count(&self, conversation_id: &str) -> usize {
        self.subscribers
            .lock()
            .map(|subs| subs.get(conversation_id).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    fn callbacks_for(&self, conversation_id: &str) -> Vec<SnapshotFn> {
        match self.subscribers.lock() {
            Ok(subs) => subs
                .get(conversation_id)
                .map(|list| list.iter().map(|(_, f)| Arc::clone(f)).collect())
                .unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Subscriber registry lock poisoned");
                Vec::new()
            }
        }
    }

    /// Deliver the current snapshot to every subscriber of a conversation.
    ///
    /// Callbacks run after the registry lock is released, so a callback may
    /// itself subscribe or unsubscribe.
    fn publish(&self, conversation_id: &str) {
        let callbacks = self.callbacks_for(conversation_id);
        if callbacks.is_empty() {
            return;
        }
        match self.repo.list(conversation_id) {
            Ok(snapshot) => {
                debug!(
                    conversation_id,
                    messages = snapshot.len(),
                    subscribers = callbacks.len(),
                    "Publishing snapshot"
                );
                for callback in callbacks {
                    callback(snapshot.clone());
                }
            }
            Err(e) => warn!(conversation_id, error = %e, "Snapshot query failed"),
        }
    }
}

fn release(registry: &Weak<Mutex<SubscriberMap>>, conversation_id: &str, subscription_id: u64) {
    let Some(registry) = registry.upgrade() else {
        return;
    };
    let Ok(mut subs) = registry.lock() else {
        return;
    };
    if let Some(list) = subs.get_mut(conversation_id) {
        list.retain(|(id, _)| *id != subscription_id);
        if list.is_empty() {
            subs.remove(conversation_id);
        }
    }
    debug!(conversation_id, subscription_id, "Snapshot subscription released");
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn append(&self, conversation_id: &str, message: &Message) -> Result<(), HealthmateError> {
        self.repo.insert(conversation_id, message)?;
        debug!(conversation_id, message_id = %message.id, "Message appended");
        self.publish(conversation_id);
        Ok(())
    }

    fn subscribe(
        &self,
        conversation_id: &str,
        on_snapshot: SnapshotFn,
    ) -> Result<Subscription, HealthmateError> {
        let initial = self.repo.list(conversation_id)?;

        let subscription_id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        {
            let mut subs = self.subscribers.lock().map_err(|e| {
                HealthmateError::Storage(format!("Subscriber registry lock poisoned: {}", e))
            })?;
            subs.entry(conversation_id.to_string())
                .or_default()
                .push((subscription_id, Arc::clone(&on_snapshot)));
        }
        debug!(conversation_id, subscription_id, "Snapshot subscription added");

        on_snapshot(initial);

        let registry = Arc::downgrade(&self.subscribers);
        let conversation = conversation_id.to_string();
        Ok(Subscription::new(move || {
            release(&registry, &conversation, subscription_id)
        }))
    }
}

// =============================================================================
// Tests
// =============================================================================
