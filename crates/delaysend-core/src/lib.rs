//! # DelaySend Core
//!
//! Shared building blocks for the delayed-send service:
//! - `types`: message/conversation snapshots, commands, notification content
//! - `traits`: the collaborators the controller consumes (repositories,
//!   retry-send, notification publisher)
//! - `config`: TOML configuration with per-field defaults
//! - `error`: the crate-wide error type

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::DelaySendConfig;
pub use error::{DelaySendError, Result};
pub use traits::{ConversationRepository, MessageRepository, NotificationPublisher, RetrySend};
pub use types::{
    Command, CommandKind, Conversation, DelayedNotification, Message, NotificationAction,
    ProgressSample, SendOutcome,
};
