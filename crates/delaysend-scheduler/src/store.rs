//! File-based snapshot store — read-only message and conversation lookups.
//! Loaded once from a JSON file; lookups never touch the disk again.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use delaysend_core::error::Result;
use delaysend_core::traits::{ConversationRepository, MessageRepository};
use delaysend_core::types::{Conversation, Message};
use serde::{Deserialize, Serialize};

/// On-disk layout of a snapshot file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SnapshotFile {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub conversations: Vec<Conversation>,
}

/// In-memory message/conversation snapshot.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    messages: HashMap<i64, Message>,
    conversations: HashMap<i64, Conversation>,
}

impl SnapshotStore {
    pub fn from_parts(messages: Vec<Message>, conversations: Vec<Conversation>) -> Self {
        Self {
            messages: messages.into_iter().map(|m| (m.id, m)).collect(),
            conversations: conversations.into_iter().map(|c| (c.id, c)).collect(),
        }
    }

    /// Load a snapshot file. A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!("⚠️ Snapshot {} not found, starting empty", path.display());
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path)?;
        let file: SnapshotFile = serde_json::from_str(&json)?;
        tracing::debug!(
            "💾 Loaded {} messages, {} conversations from {}",
            file.messages.len(),
            file.conversations.len(),
            path.display()
        );
        Ok(Self::from_parts(file.messages, file.conversations))
    }

    /// Write a snapshot file (used by tooling and tests).
    pub fn save(path: &Path, file: &SnapshotFile) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(file)?)?;
        Ok(())
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

#[async_trait]
impl MessageRepository for SnapshotStore {
    async fn get(&self, message_id: i64) -> Option<Message> {
        self.messages.get(&message_id).cloned()
    }
}

#[async_trait]
impl ConversationRepository for SnapshotStore {
    async fn get(&self, thread_id: i64) -> Option<Conversation> {
        self.conversations.get(&thread_id).cloned()
    }
}
