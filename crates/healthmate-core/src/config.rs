use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{HealthmateError, Result};

/// Top-level configuration for the Healthmate application.
///
/// Loaded from `~/.healthmate/config.toml` by default. Each section
/// corresponds to one subsystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthmateConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
}

impl HealthmateConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HealthmateConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| HealthmateError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.healthmate/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// How a remote snapshot is folded into the rendered conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePolicy {
    /// Every snapshot replaces the whole rendered sequence.
    #[default]
    Replace,
    /// Snapshot entries win; local entries the snapshot does not know yet
    /// are kept after them.
    MergeById,
}

/// Conversation behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum number of charged assistant replies per conversation.
    pub quota: u32,
    pub reconcile: ReconcilePolicy,
    /// Reply with a canned demo answer instead of the error text when the
    /// model call fails.
    pub demo_fallback: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            quota: 10,
            reconcile: ReconcilePolicy::Replace,
            demo_fallback: false,
        }
    }
}

/// Generative-language backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// Inline credential. Prefer `api_key_env`.
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is unset.
    pub api_key_env: String,
    /// Client-side request timeout in seconds.
    pub timeout_secs: u64,
    /// Extra attempts for transient failures (timeouts, 429, 5xx).
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1".to_string(),
            model: "gemini-pro".to_string(),
            api_key: None,
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_secs: 30,
            max_retries: 0,
        }
    }
}

impl LlmConfig {
    /// The effective credential: inline value, else the configured env var.
    /// Blank values count as absent.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

/// Voice input settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Offer voice input when the runtime supports speech recognition.
    pub enabled: bool,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn create_temp_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = HealthmateConfig::default();
        assert_eq!(config.general.data_dir, "~/.healthmate/data");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.chat.quota, 10);
        assert_eq!(config.chat.reconcile, ReconcilePolicy::Replace);
        assert!(!config.chat.demo_fallback);
        assert_eq!(config.llm.model, "gemini-pro");
        assert_eq!(config.llm.timeout_secs, 30);
        assert_eq!(config.llm.max_retries, 0);
        assert!(config.voice.enabled);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
data_dir = "/custom/data"
log_level = "debug"

[chat]
quota = 3
reconcile = "merge_by_id"
demo_fallback = true

[llm]
base_url = "http://localhost:9999/v1"
model = "gemini-1.5-flash"
api_key = "k-123"
timeout_secs = 5
max_retries = 2

[voice]
enabled = false
"#;
        let file = create_temp_config(content);
        let config = HealthmateConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "/custom/data");
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.chat.quota, 3);
        assert_eq!(config.chat.reconcile, ReconcilePolicy::MergeById);
        assert!(config.chat.demo_fallback);
        assert_eq!(config.llm.base_url, "http://localhost:9999/v1");
        assert_eq!(config.llm.model, "gemini-1.5-flash");
        assert_eq!(config.llm.api_key.as_deref(), Some("k-123"));
        assert_eq!(config.llm.timeout_secs, 5);
        assert_eq!(config.llm.max_retries, 2);
        assert!(!config.voice.enabled);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[general]
log_level = "warn"
"#;
        let file = create_temp_config(content);
        let config = HealthmateConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.chat.quota, 10);
        assert_eq!(config.llm.api_key_env, "GEMINI_API_KEY");
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("[chat\nquota = ");
        let result = HealthmateConfig::load(file.path());
        assert!(matches!(result, Err(HealthmateError::Config(_))));
    }

    #[test]
    fn test_load_unknown_reconcile_policy_fails() {
        let file = create_temp_config("[chat]\nreconcile = \"newest\"\n");
        assert!(HealthmateConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = HealthmateConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.data_dir, "~/.healthmate/data");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = HealthmateConfig::default();
        config.chat.quota = 7;
        config.chat.reconcile = ReconcilePolicy::MergeById;
        config.save(&path).unwrap();

        let reloaded = HealthmateConfig::load(&path).unwrap();
        assert_eq!(reloaded.chat.quota, 7);
        assert_eq!(reloaded.chat.reconcile, ReconcilePolicy::MergeById);
        assert_eq!(reloaded.llm.base_url, config.llm.base_url);
    }

    #[test]
    fn test_resolve_api_key_prefers_inline() {
        let llm = LlmConfig {
            api_key: Some("inline".to_string()),
            api_key_env: "HEALTHMATE_TEST_UNSET_KEY_A".to_string(),
            ..LlmConfig::default()
        };
        assert_eq!(llm.resolve_api_key().as_deref(), Some("inline"));
    }

    #[test]
    fn test_resolve_api_key_blank_is_absent() {
        let llm = LlmConfig {
            api_key: Some("   ".to_string()),
            api_key_env: "HEALTHMATE_TEST_UNSET_KEY_B".to_string(),
            ..LlmConfig::default()
        };
        assert_eq!(llm.resolve_api_key(), None);
    }

    #[test]
    fn test_resolve_api_key_missing_env() {
        let llm = LlmConfig {
            api_key: None,
            api_key_env: "HEALTHMATE_TEST_UNSET_KEY_C".to_string(),
            ..LlmConfig::default()
        };
        assert_eq!(llm.resolve_api_key(), None);
    }
}
