//! Error types for the chat engine.

use healthmate_core::error::HealthmateError;
use healthmate_core::types::Capability;

/// Errors from the chat engine.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("a submission is already in flight")]
    Busy,
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),
    #[error("storage error: {0}")]
    StorageError(String),
    #[error("voice error: {0}")]
    VoiceError(String),
    #[error("not authorized for {0}")]
    Unauthorized(Capability),
    #[error("invalid symptom selection: {0}")]
    InvalidSymptoms(String),
}

impl From<HealthmateError> for ChatError {
    fn from(err: HealthmateError) -> Self {
        match err {
            HealthmateError::Voice(msg) => ChatError::VoiceError(msg),
            other => ChatError::StorageError(other.to_string()),
        }
    }
}

/// Failures talking to the generative-language backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    #[error("API credential is not configured")]
    MissingCredential,
    #[error("request failed: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response contained no text")]
    EmptyResponse,
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl UpstreamError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            UpstreamError::Transport(_) | UpstreamError::Timeout => true,
            UpstreamError::Status { status, .. } => *status == 429 || *status >= 500,
            UpstreamError::MissingCredential
            | UpstreamError::EmptyResponse
            | UpstreamError::Malformed(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::EmptyMessage.to_string(), "message cannot be empty");
        assert_eq!(
            ChatError::Busy.to_string(),
            "a submission is already in flight"
        );
        assert_eq!(
            ChatError::StorageError("disk full".to_string()).to_string(),
            "storage error: disk full"
        );
        assert_eq!(
            ChatError::VoiceError("microphone unavailable".to_string()).to_string(),
            "voice error: microphone unavailable"
        );
        assert_eq!(
            ChatError::Unauthorized(Capability::ManageContent).to_string(),
            "not authorized for manage_content"
        );
    }

    #[test]
    fn test_upstream_error_display() {
        assert_eq!(
            UpstreamError::MissingCredential.to_string(),
            "API credential is not configured"
        );
        assert_eq!(
            UpstreamError::Status {
                status: 500,
                body: "boom".to_string()
            }
            .to_string(),
            "API returned status 500: boom"
        );
        let wrapped: ChatError = UpstreamError::Timeout.into();
        assert_eq!(wrapped.to_string(), "upstream error: request timed out");
    }

    #[test]
    fn test_transient_classification() {
        assert!(UpstreamError::Timeout.is_transient());
        assert!(UpstreamError::Transport("reset".into()).is_transient());
        assert!(UpstreamError::Status {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(UpstreamError::Status {
            status: 429,
            body: String::new()
        }
        .is_transient());
        assert!(!UpstreamError::Status {
            status: 400,
            body: String::new()
        }
        .is_transient());
        assert!(!UpstreamError::MissingCredential.is_transient());
        assert!(!UpstreamError::EmptyResponse.is_transient());
        assert!(!UpstreamError::Malformed("x".into()).is_transient());
    }

    #[test]
    fn test_from_healthmate_error() {
        let err: ChatError = HealthmateError::Storage("connection lost".to_string()).into();
        assert!(matches!(err, ChatError::StorageError(_)));
        assert!(err.to_string().contains("connection lost"));

        let err: ChatError = HealthmateError::Voice("no mic".to_string()).into();
        assert!(matches!(err, ChatError::VoiceError(ref m) if m == "no mic"));
    }
}
