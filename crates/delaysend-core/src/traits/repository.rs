use async_trait::async_trait;

use crate::types::{Conversation, Message};

/// Message lookup. Returns `None` when the message does not exist.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn get(&self, message_id: i64) -> Option<Message>;
}

/// Conversation lookup. Returns `None` when the thread does not exist.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn get(&self, thread_id: i64) -> Option<Conversation>;
}
