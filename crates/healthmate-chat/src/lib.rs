//! Chat engine for Healthmate.
//!
//! Provides the conversation manager (optimistic appends reconciled with the
//! remote feed, per-conversation quota, localized fallback text), the prompt
//! translator and its Gemini backend, voice capture, and the smaller
//! assistant features built on the same backend.

pub mod auth;
pub mod conversation;
pub mod error;
pub mod gemini;
pub mod locale_settings;
pub mod prompt;
pub mod symptoms;
pub mod tips;
pub mod voice;

pub use auth::{Authorizer, RoleAuthorizer};
pub use conversation::{ConversationManager, SubmitOutcome};
pub use error::{ChatError, UpstreamError};
pub use gemini::GeminiClient;
pub use locale_settings::LocaleSettings;
pub use prompt::{GenerativeBackend, PromptTranslator};
pub use symptoms::{Symptom, SymptomCheck};
pub use tips::{DailyTips, HealthTip};
pub use voice::{
    RecognitionHandle, RecognitionSession, SpeechEvent, SpeechRecognizer, UnsupportedRecognizer,
    VoiceCapture, VoiceState,
};
