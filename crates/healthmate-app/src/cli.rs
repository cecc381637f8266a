//! CLI argument definitions for the Healthmate terminal client.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use healthmate_core::error::HealthmateError;
use healthmate_core::locale::Locale;
use healthmate_core::types::{Identity, Role};

/// Healthmate: an AI health assistant in your terminal.
#[derive(Parser, Debug)]
#[command(name = "healthmate", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Data directory for the SQLite database.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level or filter directive (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Sign in as this user id; chat history is then saved.
    #[arg(short = 'u', long = "user")]
    pub user: Option<String>,

    /// Give the signed-in user the admin role.
    #[arg(long = "admin", requires = "user")]
    pub admin: bool,

    /// Interface language (en, hi, es, fr). Saved for later sessions.
    #[arg(long = "locale")]
    pub locale: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > HEALTHMATE_CONFIG env var > ~/.healthmate/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("HEALTHMATE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log filter.
    ///
    /// Priority: --log-level flag > HEALTHMATE_LOG env var > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        if let Some(ref level) = self.log_level {
            return level.clone();
        }
        if let Ok(level) = std::env::var("HEALTHMATE_LOG") {
            if !level.trim().is_empty() {
                return level;
            }
        }
        config_level.to_string()
    }

    /// Resolve the data directory, expanding a leading `~`.
    ///
    /// Priority: --data-dir flag > config file value.
    pub fn resolve_data_dir(&self, config_dir: &str) -> PathBuf {
        match self.data_dir {
            Some(ref p) => p.clone(),
            None => expand_home(config_dir),
        }
    }

    /// The identity to start with, if --user was given.
    pub fn resolve_identity(&self) -> Option<Identity> {
        let uid = self.user.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
        let role = if self.admin { Role::Admin } else { Role::Member };
        Some(Identity::new(uid).with_role(role))
    }

    /// The locale requested on the command line, if any.
    pub fn resolve_locale(&self) -> Result<Option<Locale>, HealthmateError> {
        self.locale.as_deref().map(str::parse::<Locale>).transpose()
    }
}

/// Expand `~/` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let home = std::env::var("USERPROFILE");
    #[cfg(not(target_os = "windows"))]
    let home = std::env::var("HOME");
    home.ok().map(PathBuf::from)
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    match home_dir() {
        Some(home) => home.join(".healthmate").join("config.toml"),
        None => PathBuf::from("config.toml"),
    }
}
