//! Healthmate core: shared message and identity types, localized system
//! text, configuration, errors, domain events and collaborator contracts.

pub mod config;
pub mod error;
pub mod events;
pub mod locale;
pub mod services;
pub mod types;

pub use config::HealthmateConfig;
pub use error::{HealthmateError, Result};
pub use events::ChatEvent;
pub use locale::Locale;
pub use services::{
    IdentityProvider, MessageStore, PreferenceStore, SessionIdentity, SnapshotFn, Subscription,
};
pub use types::*;
