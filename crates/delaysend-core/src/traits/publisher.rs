use crate::types::DelayedNotification;

/// Receives the lifecycle of one notification slot per message.
///
/// Calls are fire-and-forget and must not block; rendering is the
/// implementation's business. For a given message id, `retire` is the last
/// call the controller makes.
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, message_id: i64, content: &DelayedNotification);

    fn update_progress(&self, message_id: i64, elapsed_millis: u64, total_millis: u64);

    fn retire(&self, message_id: i64);
}
