//! Collaborator traits consumed by the delayed-dispatch controller.

pub mod publisher;
pub mod repository;
pub mod sender;

pub use publisher::NotificationPublisher;
pub use repository::{ConversationRepository, MessageRepository};
pub use sender::RetrySend;
