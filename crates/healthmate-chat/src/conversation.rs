//! Conversation manager: optimistic local appends reconciled against the
//! remote message feed.
//!
//! Lifecycle:
//! - Uninitialized -> LocalOnly (mounted without identity, welcome seeded)
//! - Uninitialized -> RemoteBacked (mounted with identity, feed subscribed)
//! - any -> remount on identity change, torn down by `close()`
//!
//! Every mount bumps a generation counter. Snapshot callbacks and in-flight
//! submissions carry the generation they started under; results arriving
//! for an older generation, or after `close()`, are dropped silently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use healthmate_core::config::{ChatConfig, ReconcilePolicy};
use healthmate_core::events::ChatEvent;
use healthmate_core::locale::Locale;
use healthmate_core::services::{IdentityProvider, MessageStore, SnapshotFn, Subscription};
use healthmate_core::types::{ConversationMode, Identity, Message};

use crate::error::ChatError;
use crate::prompt::PromptTranslator;

/// Capacity of the event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How a `submit` call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The backend answered; the reply was appended and charged.
    Replied(Message),
    /// The quota was already used up; the localized limit text was appended.
    QuotaExceeded(Message),
    /// The backend failed; the fallback text was appended, nothing charged.
    Failed(Message),
    /// The conversation was remounted or closed before the turn finished.
    Discarded,
}

impl SubmitOutcome {
    /// The assistant-side message appended for this turn, if any.
    pub fn reply(&self) -> Option<&Message> {
        match self {
            SubmitOutcome::Replied(m) | SubmitOutcome::QuotaExceeded(m) | SubmitOutcome::Failed(m) => {
                Some(m)
            }
            SubmitOutcome::Discarded => None,
        }
    }
}

struct ConversationState {
    mode: ConversationMode,
    messages: Vec<Message>,
    usage: u32,
    locale: Locale,
    identity: Option<Identity>,
    subscription: Option<Subscription>,
    generation: u64,
    closed: bool,
}

impl ConversationState {
    fn is_current(&self, generation: u64) -> bool {
        !self.closed && self.generation == generation
    }
}

struct Shared {
    config: ChatConfig,
    translator: PromptTranslator,
    store: Arc<dyn MessageStore>,
    state: Mutex<ConversationState>,
    in_flight: AtomicBool,
    events: broadcast::Sender<ChatEvent>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, ConversationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ChatEvent) {
        debug!(kind = event.kind(), "Conversation event");
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    /// Append under the given generation. Returns false when the target is
    /// stale and the message was dropped.
    fn append_if_current(&self, generation: u64, message: &Message, charge: bool) -> bool {
        {
            let mut state = self.state();
            if !state.is_current(generation) {
                return false;
            }
            state.messages.push(message.clone());
            if charge {
                state.usage += 1;
            }
        }
        self.emit(ChatEvent::MessageAppended {
            message: message.clone(),
        });
        true
    }

    fn apply_snapshot(&self, generation: u64, snapshot: Vec<Message>) {
        let (count, usage) = {
            let mut state = self.state();
            if !state.is_current(generation) || state.mode != ConversationMode::RemoteBacked {
                debug!(generation, "Ignoring snapshot for stale conversation");
                return;
            }
            // Remote history is authoritative: every stored message counts.
            let usage = snapshot.len() as u32;
            state.messages = match self.config.reconcile {
                ReconcilePolicy::Replace => snapshot,
                ReconcilePolicy::MergeById => merge_by_id(snapshot, &state.messages),
            };
            state.usage = usage;
            (state.messages.len(), usage)
        };
        debug!(count, usage, "Snapshot applied");
        self.emit(ChatEvent::SnapshotApplied { count, usage });
    }
}

/// Snapshot entries in snapshot order, then local entries the snapshot does
/// not contain yet, in local order.
fn merge_by_id(snapshot: Vec<Message>, local: &[Message]) -> Vec<Message> {
    let pending: Vec<Message> = local
        .iter()
        .filter(|m| !snapshot.iter().any(|s| s.id == m.id))
        .cloned()
        .collect();
    let mut merged = snapshot;
    merged.extend(pending);
    merged
}

/// Releases the single in-flight submission slot when dropped, including
/// when the owning `submit` future is cancelled.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Owns the rendered message sequence of one chat conversation.
///
/// Cheap to clone; clones share the same conversation.
#[derive(Clone)]
pub struct ConversationManager {
    inner: Arc<Shared>,
}

impl std::fmt::Debug for ConversationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state();
        f.debug_struct("ConversationManager")
            .field("mode", &state.mode)
            .field("messages", &state.messages.len())
            .field("usage", &state.usage)
            .field("locale", &state.locale)
            .field("closed", &state.closed)
            .finish()
    }
}

impl ConversationManager {
    pub fn new(
        config: ChatConfig,
        translator: PromptTranslator,
        store: Arc<dyn MessageStore>,
        locale: Locale,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Shared {
                config,
                translator,
                store,
                state: Mutex::new(ConversationState {
                    mode: ConversationMode::Uninitialized,
                    messages: Vec::new(),
                    usage: 0,
                    locale,
                    identity: None,
                    subscription: None,
                    generation: 0,
                    closed: false,
                }),
                in_flight: AtomicBool::new(false),
                events,
            }),
        }
    }

    /// Run the Uninitialized transition for `identity`.
    ///
    /// Discards prior rendered state and any previous feed subscription.
    /// With an identity the conversation subscribes to that identity's feed
    /// and becomes RemoteBacked; without one it seeds the localized welcome
    /// and becomes LocalOnly. A failed subscription is logged and leaves an
    /// empty RemoteBacked conversation.
    pub fn mount(&self, identity: Option<Identity>) {
        let mode = if identity.is_some() {
            ConversationMode::RemoteBacked
        } else {
            ConversationMode::LocalOnly
        };

        let (generation, previous, welcome) = {
            let mut state = self.inner.state();
            if state.closed {
                debug!("Mount ignored on closed conversation");
                return;
            }
            state.generation += 1;
            state.mode = mode;
            state.usage = 0;
            state.identity = identity.clone();
            state.messages.clear();
            let welcome = match mode {
                ConversationMode::LocalOnly => {
                    let welcome = Message::welcome(state.locale);
                    state.messages.push(welcome.clone());
                    Some(welcome)
                }
                _ => None,
            };
            (state.generation, state.subscription.take(), welcome)
        };
        drop(previous);

        info!(mode = %mode, generation, "Conversation mounted");
        self.inner.emit(ChatEvent::ConversationReset { mode });
        if let Some(message) = welcome {
            self.inner.emit(ChatEvent::MessageAppended { message });
        }

        let Some(identity) = identity else {
            return;
        };

        let weak: Weak<Shared> = Arc::downgrade(&self.inner);
        let on_snapshot: SnapshotFn = Arc::new(move |snapshot: Vec<Message>| {
            if let Some(shared) = weak.upgrade() {
                shared.apply_snapshot(generation, snapshot);
            }
        });

        match self
            .inner
            .store
            .subscribe(identity.conversation_id(), on_snapshot)
        {
            Ok(subscription) => {
                let mut state = self.inner.state();
                if state.is_current(generation) {
                    state.subscription = Some(subscription);
                }
                // Otherwise the subscription drops here, after the lock
                // guard, and releases itself.
            }
            Err(e) => warn!(
                conversation_id = identity.conversation_id(),
                error = %e,
                "Failed to subscribe to conversation feed"
            ),
        }
    }

    /// React to an identity change notification.
    ///
    /// A different uid (or sign-in/out) remounts. The same uid only refreshes
    /// the stored identity, so a role change keeps the conversation.
    pub fn on_identity_change(&self, identity: Option<Identity>) {
        {
            let mut state = self.inner.state();
            let same_uid = match (&state.identity, &identity) {
                (Some(current), Some(next)) => current.uid == next.uid,
                _ => false,
            };
            if same_uid && state.mode == ConversationMode::RemoteBacked {
                state.identity = identity;
                return;
            }
        }
        self.mount(identity);
    }

    /// Mount with the provider's current identity and remount on every
    /// change. The watch task ends when the provider goes away or the
    /// conversation is closed or dropped.
    pub fn follow_identity(&self, provider: &dyn IdentityProvider) -> JoinHandle<()> {
        let mut rx = provider.watch();
        let initial = rx.borrow_and_update().clone();
        self.mount(initial);

        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let identity = rx.borrow_and_update().clone();
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let manager = ConversationManager { inner };
                if manager.is_closed() {
                    break;
                }
                debug!(signed_in = identity.is_some(), "Identity changed");
                manager.on_identity_change(identity);
            }
            debug!("Identity watch ended");
        })
    }

    /// Submit one user turn.
    ///
    /// The user message is appended before any await point. The reply (or
    /// limit/fallback text) follows it. Successful exchanges are then
    /// persisted when an identity is present; persistence failures are
    /// reported as `PersistFailed` events and never alter the rendered
    /// sequence.
    ///
    /// Errors only for rejected input: blank text (`EmptyMessage`) or a
    /// submission already in flight (`Busy`). Nothing is appended then.
    pub async fn submit(&self, text: &str) -> Result<SubmitOutcome, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let _guard = InFlightGuard::acquire(&self.inner.in_flight).ok_or(ChatError::Busy)?;

        let user_message = Message::user(text);
        let turn = {
            let mut state = self.inner.state();
            if state.closed {
                None
            } else {
                state.messages.push(user_message.clone());
                Some((
                    state.generation,
                    state.usage,
                    state.locale,
                    state.identity.clone(),
                ))
            }
        };
        let Some((generation, usage, locale, identity)) = turn else {
            debug!("Submit on closed conversation discarded");
            return Ok(SubmitOutcome::Discarded);
        };
        self.inner.emit(ChatEvent::MessageAppended {
            message: user_message.clone(),
        });

        if usage >= self.inner.config.quota {
            info!(usage, quota = self.inner.config.quota, "Message quota reached");
            let limit = Message::assistant(locale.quota_exceeded_text());
            if !self.inner.append_if_current(generation, &limit, false) {
                return Ok(SubmitOutcome::Discarded);
            }
            return Ok(SubmitOutcome::QuotaExceeded(limit));
        }

        let outcome = match self.inner.translator.translate(text, locale).await {
            Ok(reply) => SubmitOutcome::Replied(Message::assistant(reply)),
            Err(e) => {
                warn!(error = %e, "Assistant request failed");
                let fallback = if self.inner.config.demo_fallback {
                    locale.demo_reply_text()
                } else {
                    locale.error_text()
                };
                SubmitOutcome::Failed(Message::assistant(fallback))
            }
        };

        let charge = matches!(outcome, SubmitOutcome::Replied(_));
        let appended = outcome
            .reply()
            .is_some_and(|reply| self.inner.append_if_current(generation, reply, charge));
        if !appended {
            debug!(generation, "Conversation changed mid-request, reply discarded");
            return Ok(SubmitOutcome::Discarded);
        }

        if let (SubmitOutcome::Replied(reply), Some(identity)) = (&outcome, identity) {
            self.persist(identity.conversation_id(), &user_message).await;
            self.persist(identity.conversation_id(), reply).await;
        }

        Ok(outcome)
    }

    async fn persist(&self, conversation_id: &str, message: &Message) {
        if let Err(e) = self.inner.store.append(conversation_id, message).await {
            warn!(
                conversation_id,
                message_id = %message.id,
                error = %e,
                "Failed to persist message"
            );
            self.inner.emit(ChatEvent::PersistFailed {
                message_id: message.id.clone(),
                reason: e.to_string(),
            });
        }
    }

    /// Switch the active locale. Already rendered messages are untouched.
    pub fn set_locale(&self, locale: Locale) {
        {
            let mut state = self.inner.state();
            if state.locale == locale {
                return;
            }
            state.locale = locale;
        }
        info!(locale = %locale, "Conversation locale changed");
        self.inner.emit(ChatEvent::LocaleChanged { locale });
    }

    pub fn locale(&self) -> Locale {
        self.inner.state().locale
    }

    /// Copy of the rendered message sequence.
    pub fn messages(&self) -> Vec<Message> {
        self.inner.state().messages.clone()
    }

    /// Charged replies since mount, or the remote message count once a
    /// snapshot has been reconciled.
    pub fn usage(&self) -> u32 {
        self.inner.state().usage
    }

    pub fn quota(&self) -> u32 {
        self.inner.config.quota
    }

    pub fn mode(&self) -> ConversationMode {
        self.inner.state().mode
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.state().identity.clone()
    }

    /// Whether a submission is currently awaiting its reply.
    pub fn is_busy(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state().closed
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ChatEvent> {
        self.inner.events.subscribe()
    }

    /// Tear the conversation down. The feed subscription is released and
    /// any later result (snapshot, reply) is discarded without error.
    pub fn close(&self) {
        let subscription = {
            let mut state = self.inner.state();
            if state.closed {
                return;
            }
            state.closed = true;
            state.generation += 1;
            state.subscription.take()
        };
        drop(subscription);
        info!("Conversation closed");
    }
}

// =============================================================================
// Tests
// =============================================================================
