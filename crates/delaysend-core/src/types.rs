//! Domain types shared between the controller, its collaborators and hosts.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DelaySendError;

/// Read-only snapshot of a message waiting to be sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique, externally assigned message id.
    pub id: i64,
    /// Conversation this message belongs to.
    pub thread_id: i64,
    /// Recipient address (phone number, email, ...).
    pub address: String,
    /// Message text.
    pub body: String,
    /// When the message is scheduled to go out.
    pub date: DateTime<Utc>,
}

/// Read-only snapshot of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    /// Display name; falls back to the recipients when empty.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub recipients: Vec<String>,
}

impl Conversation {
    /// Title shown to the user for this conversation.
    pub fn title(&self) -> String {
        if !self.name.trim().is_empty() {
            self.name.clone()
        } else if !self.recipients.is_empty() {
            self.recipients.join(", ")
        } else {
            format!("conversation {}", self.id)
        }
    }
}

/// Terminal result reported by a retry-send operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent { attempts: u32 },
    Exhausted { attempts: u32, last_error: String },
}

impl SendOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            SendOutcome::Sent { attempts } | SendOutcome::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Command kinds understood by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Start,
    Stop,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Start => write!(f, "start"),
            CommandKind::Stop => write!(f, "stop"),
        }
    }
}

/// A typed START/STOP command for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Command {
    pub kind: CommandKind,
    pub message_id: i64,
}

impl Command {
    pub fn start(message_id: i64) -> Self {
        Self { kind: CommandKind::Start, message_id }
    }

    pub fn stop(message_id: i64) -> Self {
        Self { kind: CommandKind::Stop, message_id }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.message_id)
    }
}

/// Parses `start <id>` / `stop <id>`, case-insensitive.
impl FromStr for Command {
    type Err = DelaySendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let (Some(verb), Some(id), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(DelaySendError::Command(format!(
                "expected '<start|stop> <message_id>', got '{s}'"
            )));
        };
        let kind = match verb.to_ascii_lowercase().as_str() {
            "start" => CommandKind::Start,
            "stop" => CommandKind::Stop,
            other => return Err(DelaySendError::Command(format!("unknown verb '{other}'"))),
        };
        let message_id = id
            .parse::<i64>()
            .map_err(|e| DelaySendError::Command(format!("bad message id '{id}': {e}")))?;
        Ok(Self { kind, message_id })
    }
}

/// User-actionable control attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationAction {
    pub label: String,
    /// Command issued when the user taps the action.
    pub command: Command,
    /// Callback request code; unique per message.
    pub request_code: i64,
}

/// Content of the "now sending" notification for one delayed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DelayedNotification {
    /// Notification slot, derived from the message id.
    pub slot: i64,
    pub title: String,
    /// Expanded text (the message body).
    pub body: String,
    pub actions: Vec<NotificationAction>,
}

/// One progress reading for a waiting task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSample {
    pub message_id: i64,
    pub elapsed_millis: u64,
    pub total_millis: u64,
}
