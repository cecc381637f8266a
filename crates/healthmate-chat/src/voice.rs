//! Voice capture: turns an interim-result speech stream into one finalized
//! transcript for the input field.
//!
//! Valid transitions:
//! - Idle -> Listening (user activation)
//! - Listening -> Idle (final result, stream end, stream error, deactivation)
//!
//! The recognition session is owned by `VoiceCapture` and stopped whenever
//! the capture returns to Idle or is dropped.

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use healthmate_core::error::HealthmateError;
use healthmate_core::locale::Locale;

use crate::error::ChatError;

/// Capture state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VoiceState {
    #[default]
    Idle,
    Listening,
}

impl fmt::Display for VoiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceState::Idle => write!(f, "Idle"),
            VoiceState::Listening => write!(f, "Listening"),
        }
    }
}

impl VoiceState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &VoiceState) -> bool {
        matches!(
            (self, target),
            (VoiceState::Idle, VoiceState::Listening) | (VoiceState::Listening, VoiceState::Idle)
        )
    }
}

/// One event from a speech-recognition stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// Non-final hypothesis for the utterance so far.
    Interim(String),
    /// Finalized transcript.
    Final(String),
    /// The stream ended on its own.
    End,
    /// The recognizer failed.
    Error(String),
}

/// A running recognition stream. Stopping must be idempotent.
pub trait RecognitionSession: Send {
    fn stop(&mut self);
}

/// A started session together with its event stream.
pub struct RecognitionHandle {
    pub session: Box<dyn RecognitionSession>,
    pub events: mpsc::Receiver<SpeechEvent>,
}

/// Platform speech-to-text capability.
pub trait SpeechRecognizer: Send + Sync {
    fn is_supported(&self) -> bool;

    /// Start continuous recognition with interim results in `language`
    /// (a locale code such as `en-US`).
    fn start(&self, language: &str) -> Result<RecognitionHandle, HealthmateError>;
}

/// Recognizer for runtimes without speech recognition.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedRecognizer;

impl SpeechRecognizer for UnsupportedRecognizer {
    fn is_supported(&self) -> bool {
        false
    }

    fn start(&self, _language: &str) -> Result<RecognitionHandle, HealthmateError> {
        Err(HealthmateError::Voice(
            "Speech recognition is not supported on this runtime".to_string(),
        ))
    }
}

/// Voice capture adapter. One instance owns at most one live session.
pub struct VoiceCapture {
    recognizer: Box<dyn SpeechRecognizer>,
    state: VoiceState,
    draft: String,
    session: Option<Box<dyn RecognitionSession>>,
    events: Option<mpsc::Receiver<SpeechEvent>>,
}

impl fmt::Debug for VoiceCapture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceCapture")
            .field("state", &self.state)
            .field("draft", &self.draft)
            .field("has_session", &self.session.is_some())
            .finish()
    }
}

impl VoiceCapture {
    pub fn new(recognizer: Box<dyn SpeechRecognizer>) -> Self {
        Self {
            recognizer,
            state: VoiceState::Idle,
            draft: String::new(),
            session: None,
            events: None,
        }
    }

    /// Whether the voice control should be offered at all.
    pub fn is_supported(&self) -> bool {
        self.recognizer.is_supported()
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    /// Live interim transcript, for display only.
    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Start listening in `locale`'s language.
    ///
    /// Returns `Ok(false)` without side effects when already listening or
    /// when the runtime has no speech recognition.
    pub fn activate(&mut self, locale: Locale) -> Result<bool, ChatError> {
        if !self.state.can_transition_to(&VoiceState::Listening) {
            debug!(state = %self.state, "Voice activation ignored");
            return Ok(false);
        }
        if !self.is_supported() {
            debug!("Voice activation ignored: recognition unsupported");
            return Ok(false);
        }

        let handle = self.recognizer.start(locale.code())?;
        self.session = Some(handle.session);
        self.events = Some(handle.events);
        self.draft.clear();
        self.state = VoiceState::Listening;
        info!(language = locale.code(), "Voice capture listening");
        Ok(true)
    }

    /// Feed one recognition event. Returns the transcript when this event
    /// finalizes the utterance; at most once per activation.
    pub fn handle_event(&mut self, event: SpeechEvent) -> Option<String> {
        if self.state != VoiceState::Listening {
            debug!(?event, "Speech event ignored while idle");
            return None;
        }

        match event {
            SpeechEvent::Interim(text) => {
                self.draft = text;
                None
            }
            SpeechEvent::Final(text) => {
                let transcript = if text.trim().is_empty() {
                    std::mem::take(&mut self.draft)
                } else {
                    text
                };
                self.finish();
                non_empty(transcript)
            }
            SpeechEvent::End => {
                let transcript = std::mem::take(&mut self.draft);
                self.finish();
                non_empty(transcript)
            }
            SpeechEvent::Error(reason) => {
                warn!(reason = %reason, "Speech recognition error");
                self.finish();
                None
            }
        }
    }

    /// Drain the session's events until the utterance is finalized or the
    /// capture returns to Idle.
    pub async fn listen(&mut self) -> Option<String> {
        while self.state == VoiceState::Listening {
            let next = match self.events.as_mut() {
                Some(events) => events.recv().await,
                None => None,
            };
            let event = next.unwrap_or(SpeechEvent::End);
            if let Some(transcript) = self.handle_event(event) {
                return Some(transcript);
            }
        }
        None
    }

    /// User-initiated stop. Nothing is emitted.
    pub fn deactivate(&mut self) {
        if self.state == VoiceState::Listening {
            info!("Voice capture cancelled");
            self.draft.clear();
            self.finish();
        }
    }

    fn finish(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop();
        }
        self.events = None;
        self.draft.clear();
        debug!("Voice state: {} -> {}", self.state, VoiceState::Idle);
        self.state = VoiceState::Idle;
    }
}

impl Drop for VoiceCapture {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop();
        }
    }
}

fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

// =============================================================================
// Tests
// =============================================================================
