//! Healthmate application binary - composition root.
//!
//! Ties together all Healthmate crates into a terminal chat client:
//! 1. Load configuration from TOML
//! 2. Initialize storage (SQLite messages + preferences)
//! 3. Build the Gemini backend and prompt translator
//! 4. Mount the conversation for the current identity
//! 5. Render conversation events to stdout and read commands from stdin

mod cli;
mod commands;

use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use healthmate_chat::{
    Authorizer, ChatError, ConversationManager, DailyTips, GeminiClient, LocaleSettings,
    PromptTranslator, RoleAuthorizer, SymptomCheck, UnsupportedRecognizer, VoiceCapture,
};
use healthmate_core::config::HealthmateConfig;
use healthmate_core::events::ChatEvent;
use healthmate_core::locale::Locale;
use healthmate_core::services::{IdentityProvider, PreferenceStore, SessionIdentity};
use healthmate_core::types::{Capability, ConversationMode, Identity, Message, Role, Sender};
use healthmate_storage::{Database, PreferenceRepository, SqliteMessageStore};

use cli::CliArgs;
use commands::{Command, HELP};

fn print_message(message: &Message) {
    let time = message.timestamp.with_timezone(&Local).format("%H:%M");
    let who = match message.sender {
        Sender::User => "You",
        Sender::Assistant => "Healthmate",
    };
    println!("[{}] {}: {}", time, who, message.content);
}

/// Print conversation events until the channel closes.
async fn render_events(mut events: broadcast::Receiver<ChatEvent>) {
    loop {
        match events.recv().await {
            Ok(ChatEvent::MessageAppended { message }) => {
                if message.is_assistant() {
                    print_message(&message);
                }
            }
            Ok(ChatEvent::SnapshotApplied { count, usage }) => {
                tracing::debug!(count, usage, "History synced");
            }
            Ok(ChatEvent::ConversationReset { mode }) => match mode {
                ConversationMode::RemoteBacked => println!("-- signed in, history is saved --"),
                ConversationMode::LocalOnly => println!("-- guest session, nothing is saved --"),
                ConversationMode::Uninitialized => {}
            },
            Ok(ChatEvent::LocaleChanged { locale }) => {
                println!("-- language: {} --", locale.display_name());
            }
            Ok(ChatEvent::PersistFailed { message_id, reason }) => {
                println!("-- could not save message {}: {} --", message_id, reason);
            }
            Ok(other) => tracing::debug!(kind = other.kind(), "Unrendered event"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Renderer lagged behind conversation events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn init_tracing(filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: &Path) -> (HealthmateConfig, Option<String>) {
    if !path.exists() {
        return (HealthmateConfig::default(), None);
    }
    match HealthmateConfig::load(path) {
        Ok(config) => (config, None),
        Err(e) => (HealthmateConfig::default(), Some(e.to_string())),
    }
}

/// Shared handles the command loop works with.
struct App {
    manager: ConversationManager,
    translator: PromptTranslator,
    session: SessionIdentity,
    locale_settings: LocaleSettings,
    tips: DailyTips,
}

impl App {
    /// Handle one line. Returns false when the user asked to quit.
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Say(text) => match self.manager.submit(&text).await {
                Ok(_) | Err(ChatError::EmptyMessage) => {}
                Err(e) => println!("-- {} --", e),
            },
            Command::Lang(key) => match key.parse::<Locale>() {
                Ok(locale) => {
                    if let Err(e) = self.locale_settings.change(locale) {
                        tracing::warn!(error = %e, "Language not saved");
                    }
                    self.manager.set_locale(locale);
                }
                Err(e) => println!("-- {} --", e),
            },
            Command::History => {
                for message in self.manager.messages() {
                    print_message(&message);
                }
            }
            Command::Usage => println!(
                "-- usage: {} of {} --",
                self.manager.usage(),
                self.manager.quota()
            ),
            Command::Symptoms { list, details } => {
                match SymptomCheck::parse(&list, details.as_deref()) {
                    Ok(check) => {
                        let locale = self.manager.locale();
                        match check.run(&self.translator, locale).await {
                            Ok(answer) => println!("{}", answer),
                            Err(e) => {
                                tracing::warn!(error = %e, "Symptom check failed");
                                println!("{}", locale.error_text());
                            }
                        }
                    }
                    Err(e) => println!("-- {} --", e),
                }
            }
            Command::Tip => {
                let tip = self.tips.today();
                println!("Tip of the day: {}\n{}", tip.title, tip.content);
            }
            Command::Login { uid, admin } => {
                let role = if admin { Role::Admin } else { Role::Member };
                self.session.sign_in(Identity::new(uid).with_role(role));
            }
            Command::Logout => self.session.sign_out(),
            Command::Admin => {
                let identity = self.session.current_identity();
                match RoleAuthorizer.authorize(identity.as_ref(), Capability::ManageContent) {
                    Ok(()) => println!("-- content management: allowed --"),
                    Err(e) => println!("-- {} --", e),
                }
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => return false,
            Command::Invalid(line) => println!("-- unknown command: {} (try /help) --", line),
        }
        true
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config, then tracing at the resolved level.
    let config_file = args.resolve_config_path();
    let (config, config_error) = load_config(&config_file);
    init_tracing(&args.resolve_log_level(&config.general.log_level));

    tracing::info!("Starting Healthmate v{}", env!("CARGO_PKG_VERSION"));
    match config_error {
        Some(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load config, using defaults"
        ),
        None => tracing::info!(path = %config_file.display(), "Configuration resolved"),
    }

    // Storage.
    let data_dir = args.resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }
    let db_path = data_dir.join("healthmate.db");
    let db = match Database::new(&db_path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            tracing::error!(path = %db_path.display(), error = %e, "Failed to open database");
            return Err(e.into());
        }
    };
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    let store = Arc::new(SqliteMessageStore::new(Arc::clone(&db)));
    let prefs: Arc<dyn PreferenceStore> = Arc::new(PreferenceRepository::new(Arc::clone(&db)));

    // Locale.
    let mut locale_settings = LocaleSettings::load(Arc::clone(&prefs));
    match args.resolve_locale() {
        Ok(Some(locale)) => locale_settings.change(locale)?,
        Ok(None) => {}
        Err(e) => {
            tracing::error!(error = %e, "Invalid --locale");
            return Err(e.into());
        }
    }

    // Model backend.
    let client = GeminiClient::new(&config.llm)?;
    if !client.has_credential() {
        tracing::warn!(
            env = %config.llm.api_key_env,
            "No Gemini API key configured; replies will use the fallback text"
        );
    }
    let translator =
        PromptTranslator::new(Arc::new(client)).with_max_retries(config.llm.max_retries);

    // Conversation.
    let manager = ConversationManager::new(
        config.chat.clone(),
        translator.clone(),
        store,
        locale_settings.current(),
    );
    let renderer = tokio::spawn(render_events(manager.subscribe_events()));
    let session = SessionIdentity::new(args.resolve_identity());
    let identity_watch = manager.follow_identity(&session);

    let voice = VoiceCapture::new(Box::new(UnsupportedRecognizer));
    if config.voice.enabled && voice.is_supported() {
        println!("-- voice input available --");
    } else {
        tracing::debug!("Voice input not offered on this runtime");
    }

    println!("Type a health question, or /help for commands.");

    let mut app = App {
        manager: manager.clone(),
        translator,
        session,
        locale_settings,
        tips: DailyTips::new(prefs),
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if !app.handle(Command::parse(&line)).await {
            break;
        }
    }

    manager.close();
    identity_watch.abort();
    drop(app);
    drop(manager);
    renderer.abort();
    tracing::info!("Healthmate stopped");
    Ok(())
}
