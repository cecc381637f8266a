//! HTTP client for the Gemini `generateContent` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use healthmate_core::config::LlmConfig;
use healthmate_core::error::HealthmateError;

use crate::error::UpstreamError;
use crate::prompt::GenerativeBackend;

// =============================================================================
// Wire format
// =============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// `candidates[0].content.parts[0].text`, if every step is present.
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

// =============================================================================
// Client
// =============================================================================

/// Gemini REST client.
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}

impl GeminiClient {
    /// Build a client from configuration. A missing credential is not an
    /// error here; every call then fails fast with `MissingCredential`.
    pub fn new(config: &LlmConfig) -> Result<Self, HealthmateError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| HealthmateError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let api_key = config.resolve_api_key();
        info!(
            model = %config.model,
            has_api_key = api_key.is_some(),
            timeout_secs = config.timeout_secs,
            "Gemini client configured"
        );

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    /// Full `generateContent` URL, without the credential.
    pub fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

fn classify(err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout
    } else {
        UpstreamError::Transport(err.to_string())
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(UpstreamError::MissingCredential)?;

        let body = GenerateRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        debug!(model = %self.model, prompt_len = prompt.len(), "Calling Gemini");

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let text = response.text().await.map_err(classify)?;
        debug!(status = status.as_u16(), body_len = text.len(), "Gemini responded");

        if !status.is_success() {
            error!(status = status.as_u16(), body = %text, "Gemini request failed");
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| UpstreamError::Malformed(e.to_string()))?;
        parsed.first_text().ok_or(UpstreamError::EmptyResponse)
    }
}

// =============================================================================
// Tests
// =============================================================================
