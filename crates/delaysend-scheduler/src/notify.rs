//! Notification content for delayed messages, plus a publisher that logs
//! and keeps a short in-memory history.
//! Lightweight: no rendering, no platform calls. Hosts with a real
//! notification surface implement `NotificationPublisher` themselves.

use std::collections::VecDeque;
use std::sync::Mutex;

use delaysend_core::traits::NotificationPublisher;
use delaysend_core::types::{
    Command, Conversation, DelayedNotification, Message, NotificationAction,
};
use serde::Serialize;

/// Default number of events kept by [`LogPublisher`].
pub const DEFAULT_HISTORY: usize = 100;

/// Notification slot for a message.
///
/// Conversation notifications use positive ids, so delayed-send slots are
/// the negated message id. Negation wraps (`i64::MIN` maps to itself), which
/// keeps the mapping one-to-one over every id. The same value doubles as the
/// cancel action's request code, which keeps callbacks from two messages
/// apart.
pub fn notification_slot(message_id: i64) -> i64 {
    message_id.wrapping_neg()
}

/// Build the "now sending" notification for a message.
pub fn build_notification(message: &Message, conversation: &Conversation) -> DelayedNotification {
    let slot = notification_slot(message.id);
    DelayedNotification {
        slot,
        title: format!("Sending message to {}", conversation.title()),
        body: message.body.clone(),
        actions: vec![NotificationAction {
            label: "Cancel".into(),
            command: Command::stop(message.id),
            request_code: slot,
        }],
    }
}

/// One call received by a publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NotifyEvent {
    Published { message_id: i64, content: DelayedNotification },
    Progress { message_id: i64, elapsed_millis: u64, total_millis: u64 },
    Retired { message_id: i64 },
}

impl NotifyEvent {
    pub fn message_id(&self) -> i64 {
        match self {
            NotifyEvent::Published { message_id, .. }
            | NotifyEvent::Progress { message_id, .. }
            | NotifyEvent::Retired { message_id } => *message_id,
        }
    }
}

/// Publisher that traces every call and records it in a ring buffer.
pub struct LogPublisher {
    capacity: usize,
    history: Mutex<VecDeque<NotifyEvent>>,
}

impl LogPublisher {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            history: Mutex::new(VecDeque::new()),
        }
    }

    fn record(&self, event: NotifyEvent) {
        let mut history = self.history.lock().unwrap_or_else(|p| p.into_inner());
        history.push_back(event);
        // Ring buffer — keep the most recent `capacity` events
        while history.len() > self.capacity {
            history.pop_front();
        }
    }

    /// All recorded events, oldest first.
    pub fn history(&self) -> Vec<NotifyEvent> {
        self.history
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Recorded events for one message, oldest first.
    pub fn events_for(&self, message_id: i64) -> Vec<NotifyEvent> {
        self.history()
            .into_iter()
            .filter(|e| e.message_id() == message_id)
            .collect()
    }

    /// Elapsed values of the progress updates for one message.
    pub fn progress_for(&self, message_id: i64) -> Vec<(u64, u64)> {
        self.events_for(message_id)
            .into_iter()
            .filter_map(|e| match e {
                NotifyEvent::Progress { elapsed_millis, total_millis, .. } => {
                    Some((elapsed_millis, total_millis))
                }
                _ => None,
            })
            .collect()
    }

    pub fn retired_count(&self, message_id: i64) -> usize {
        self.events_for(message_id)
            .iter()
            .filter(|e| matches!(e, NotifyEvent::Retired { .. }))
            .count()
    }
}

impl Default for LogPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationPublisher for LogPublisher {
    fn publish(&self, message_id: i64, content: &DelayedNotification) {
        tracing::info!("📢 [{}] {} (slot {})", message_id, content.title, content.slot);
        self.record(NotifyEvent::Published { message_id, content: content.clone() });
    }

    fn update_progress(&self, message_id: i64, elapsed_millis: u64, total_millis: u64) {
        tracing::debug!("⏳ [{}] {}/{} ms", message_id, elapsed_millis, total_millis);
        self.record(NotifyEvent::Progress { message_id, elapsed_millis, total_millis });
    }

    fn retire(&self, message_id: i64) {
        tracing::info!("🧹 [{}] notification retired", message_id);
        self.record(NotifyEvent::Retired { message_id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(id: i64) -> Message {
        Message {
            id,
            thread_id: 3,
            address: "+15550100".into(),
            body: "see you at 8".into(),
            date: Utc::now(),
        }
    }

    #[test]
    fn test_slot_is_negated_and_unique_per_message() {
        assert_eq!(notification_slot(42), -42);
        assert_ne!(notification_slot(42), notification_slot(43));
        assert!(notification_slot(i64::MAX) <= 0);
    }

    #[test]
    fn test_slot_does_not_wrap_at_i32_bounds() {
        let ids = [
            0,
            1,
            i32::MAX as i64,
            i32::MAX as i64 + 1,
            u32::MAX as i64 + 1,
            i64::MAX,
            i64::MIN,
        ];
        let slots: std::collections::HashSet<i64> = ids.iter().map(|id| notification_slot(*id)).collect();
        assert_eq!(slots.len(), ids.len());
        assert_eq!(notification_slot(i32::MAX as i64 + 1), -(i32::MAX as i64) - 1);
        assert_eq!(notification_slot(i64::MIN), i64::MIN);
    }

    #[test]
    fn test_build_notification() {
        let conv = Conversation { id: 3, name: "Alice".into(), recipients: vec![] };
        let n = build_notification(&message(42), &conv);
        assert_eq!(n.title, "Sending message to Alice");
        assert_eq!(n.body, "see you at 8");
        assert_eq!(n.actions.len(), 1);
        assert_eq!(n.actions[0].command, Command::stop(42));
        assert_eq!(n.actions[0].request_code, n.slot);
    }

    #[test]
    fn test_cancel_request_codes_differ_between_messages() {
        let conv = Conversation { id: 3, name: "Alice".into(), recipients: vec![] };
        let a = build_notification(&message(1), &conv);
        let b = build_notification(&message(2), &conv);
        assert_ne!(a.actions[0].request_code, b.actions[0].request_code);
        let wrapped = build_notification(&message(1 + i32::MAX as i64), &conv);
        assert_ne!(a.actions[0].request_code, wrapped.actions[0].request_code);
    }

    #[test]
    fn test_history_ring_buffer() {
        let publisher = LogPublisher::with_capacity(3);
        for i in 0..5 {
            publisher.update_progress(1, i * 10, 100);
        }
        publisher.retire(1);
        let progress = publisher.progress_for(1);
        assert_eq!(progress, vec![(30, 100), (40, 100)]);
        assert_eq!(publisher.retired_count(1), 1);
        assert_eq!(publisher.history().len(), 3);
    }
}
