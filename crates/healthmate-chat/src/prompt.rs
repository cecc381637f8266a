//! Prompt construction and the generative-backend seam.
//!
//! `PromptTranslator` wraps raw user text in the assistant instruction
//! template (role, non-physician disclaimer, response language) and hands it
//! to a `GenerativeBackend`. The backend's text comes back verbatim.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use healthmate_core::locale::Locale;

use crate::error::UpstreamError;

/// A hosted text-generation model.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Send one fully formed prompt and return the generated text.
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError>;
}

/// Builds model prompts and interprets backend failures.
#[derive(Clone)]
pub struct PromptTranslator {
    backend: Arc<dyn GenerativeBackend>,
    max_retries: u32,
}

impl std::fmt::Debug for PromptTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptTranslator")
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl PromptTranslator {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self {
            backend,
            max_retries: 0,
        }
    }

    /// Allow up to `max_retries` extra attempts for transient failures.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Wrap raw user text in the assistant instruction template.
    pub fn wrap(text: &str, locale: Locale) -> String {
        format!(
            "You are a helpful AI health assistant. Provide accurate, helpful advice but always \
             clarify that you're not a doctor and serious concerns should be addressed by \
             healthcare professionals. Please respond in {}. User query: {}",
            locale.language_name(),
            text
        )
    }

    /// Ask the backend about `text`, answering in `locale`'s language.
    pub async fn translate(&self, text: &str, locale: Locale) -> Result<String, UpstreamError> {
        let prompt = Self::wrap(text, locale);
        self.send(&prompt).await
    }

    /// Send an already wrapped prompt, retrying transient failures.
    pub async fn send(&self, prompt: &str) -> Result<String, UpstreamError> {
        let mut attempt = 0;
        loop {
            match self.backend.generate(prompt).await {
                Ok(text) => {
                    debug!(attempt, reply_len = text.len(), "Backend replied");
                    return Ok(text);
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(error = %e, attempt, "Transient backend failure, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
