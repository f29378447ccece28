//! Delayed-dispatch controller — one cancellable tokio task per message.
//!
//! `start` registers the message and spawns a task that loads the message
//! and its conversation, publishes the "now sending" notification, then
//! races the deadline against cancellation while ticking progress. If the
//! deadline wins, the message goes to the retry-send operation exactly once.
//! Every exit path runs the same cleanup: retire the notification, then
//! release the registry entry.

use std::sync::Arc;
use std::time::Duration;

use delaysend_core::config::SchedulerConfig;
use delaysend_core::traits::{
    ConversationRepository, MessageRepository, NotificationPublisher, RetrySend,
};
use delaysend_core::types::{Command, CommandKind, Conversation, Message};
use tokio::task::JoinHandle;

use crate::notify::build_notification;
use crate::registry::{RegistryStats, TaskRegistry};
use crate::tasks::{DelayedTask, TaskHandle, TaskOutcome, TaskState};
use crate::ticker::{Clock, SystemClock, Ticker, remaining_delay};

/// Default progress cadence.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Collaborators consumed by the controller.
struct Collaborators {
    messages: Arc<dyn MessageRepository>,
    conversations: Arc<dyn ConversationRepository>,
    sender: Arc<dyn RetrySend>,
    publisher: Arc<dyn NotificationPublisher>,
}

/// Delayed-dispatch controller. Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct DelayedDispatcher {
    registry: Arc<TaskRegistry>,
    deps: Arc<Collaborators>,
    clock: Arc<dyn Clock>,
    tick_interval: Duration,
}

impl DelayedDispatcher {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        conversations: Arc<dyn ConversationRepository>,
        sender: Arc<dyn RetrySend>,
        publisher: Arc<dyn NotificationPublisher>,
    ) -> Self {
        Self {
            registry: Arc::new(TaskRegistry::new()),
            deps: Arc::new(Collaborators {
                messages,
                conversations,
                sender,
                publisher,
            }),
            clock: Arc::new(SystemClock),
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_config(self, config: &SchedulerConfig) -> Self {
        self.with_tick_interval(Duration::from_millis(config.tick_interval_ms))
    }

    /// Begin a delayed send for `message_id`.
    ///
    /// Returns `None` when a task for this message is already running (the
    /// call is a no-op). Must be called from within a tokio runtime.
    pub fn start(&self, message_id: i64) -> Option<JoinHandle<TaskOutcome>> {
        let (handle, already_exists) = self.registry.register(message_id);
        if already_exists {
            tracing::debug!("⏭️ Message {} already has a delayed send, ignoring start", message_id);
            return None;
        }
        let this = self.clone();
        Some(tokio::spawn(async move { this.run(handle).await }))
    }

    /// Cancel the waiting task for `message_id`.
    ///
    /// Returns true if this call cancelled a waiting task. Unknown ids,
    /// repeated stops and tasks already sending are no-ops.
    pub fn stop(&self, message_id: i64) -> bool {
        let Some(handle) = self.registry.get(message_id) else {
            tracing::debug!("⏭️ No delayed send for message {}, ignoring stop", message_id);
            return false;
        };
        if handle.cancel() {
            tracing::info!("🛑 Delayed send for message {} cancelled", message_id);
            true
        } else {
            tracing::debug!(
                "⏭️ Message {} is {}, ignoring stop",
                message_id,
                handle.state()
            );
            false
        }
    }

    /// Route a typed command.
    pub fn dispatch(&self, command: Command) -> Option<JoinHandle<TaskOutcome>> {
        match command.kind {
            CommandKind::Start => self.start(command.message_id),
            CommandKind::Stop => {
                self.stop(command.message_id);
                None
            }
        }
    }

    /// Cancel every waiting task and wait until all tasks have cleaned up.
    /// Sends already in flight are allowed to finish.
    pub async fn shutdown(&self) {
        let handles = self.registry.handles();
        tracing::info!("⏹️ Shutting down {} delayed sends", handles.len());
        for handle in &handles {
            handle.cancel();
        }
        self.registry.wait_idle().await;
    }

    /// Snapshot of all tasks that have loaded their message.
    pub fn active_tasks(&self) -> Vec<DelayedTask> {
        let mut tasks: Vec<DelayedTask> = self
            .registry
            .handles()
            .iter()
            .filter_map(TaskHandle::snapshot)
            .collect();
        tasks.sort_by_key(|t| t.message_id);
        tasks
    }

    pub fn is_active(&self, message_id: i64) -> bool {
        self.registry.get(message_id).is_some()
    }

    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    async fn run(&self, handle: TaskHandle) -> TaskOutcome {
        let _cleanup = CleanupGuard {
            registry: self.registry.clone(),
            publisher: self.deps.publisher.clone(),
            handle: handle.clone(),
        };
        let message_id = handle.message_id();

        // A stop during lookup releases the entry right away instead of
        // waiting for the repositories to answer.
        let inputs = tokio::select! {
            biased;
            _ = handle.cancel_token().cancelled() => return TaskOutcome::Cancelled,
            inputs = self.load_inputs(message_id) => inputs,
        };
        let (message, conversation) = match inputs {
            Ok(inputs) => inputs,
            Err(reason) => return TaskOutcome::Aborted(reason),
        };

        if handle.is_cancelled() {
            return TaskOutcome::Cancelled;
        }

        let started_at = self.clock.now();
        let delay = remaining_delay(message.date, started_at);
        handle.set_timing(message.date, started_at);
        self.deps
            .publisher
            .publish(message_id, &build_notification(&message, &conversation));
        tracing::info!(
            "⏰ Message {} to '{}' goes out in {} ms",
            message_id,
            conversation.title(),
            delay.as_millis()
        );

        if !self.wait(&handle, delay).await {
            return TaskOutcome::Cancelled;
        }

        tracing::info!("📤 Sending message {}", message_id);
        let outcome = self.deps.sender.send(&message).await;
        handle.transition(TaskState::Sending, TaskState::Completed);
        tracing::info!(
            "✅ Delayed send for message {} finished after {} attempt(s): {:?}",
            message_id,
            outcome.attempts(),
            outcome
        );
        TaskOutcome::Completed(outcome)
    }

    /// Fetch the message and its conversation once.
    async fn load_inputs(&self, message_id: i64) -> Result<(Message, Conversation), String> {
        // TODO: surface lookup failures to the caller that scheduled the
        // message instead of only logging them.
        let Some(message) = self.deps.messages.get(message_id).await else {
            tracing::warn!("⚠️ Message {} not found, dropping delayed send", message_id);
            return Err(format!("message {message_id} not found"));
        };
        let Some(conversation) = self.deps.conversations.get(message.thread_id).await else {
            tracing::warn!(
                "⚠️ Conversation {} for message {} not found, dropping delayed send",
                message.thread_id,
                message_id
            );
            return Err(format!("conversation {} not found", message.thread_id));
        };
        Ok((message, conversation))
    }

    /// Waiting period. Returns true if the task committed to sending, false
    /// if it was cancelled. Ticker and deadline are dropped on return.
    async fn wait(&self, handle: &TaskHandle, delay: Duration) -> bool {
        let message_id = handle.message_id();
        let mut ticker = Ticker::new(message_id, self.tick_interval, delay);
        let deadline = tokio::time::sleep(delay);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = handle.cancel_token().cancelled() => return false,
                _ = &mut deadline => {
                    // Loses to a stop that already moved the state out of Waiting.
                    return handle.transition(TaskState::Waiting, TaskState::Sending);
                }
                sample = ticker.tick() => {
                    self.deps.publisher.update_progress(
                        message_id,
                        sample.elapsed_millis,
                        sample.total_millis,
                    );
                }
            }
        }
    }
}

/// Retires the notification and releases the registry entry when a task
/// ends, however it ends (including the task being dropped by the runtime).
struct CleanupGuard {
    registry: Arc<TaskRegistry>,
    publisher: Arc<dyn NotificationPublisher>,
    handle: TaskHandle,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let message_id = self.handle.message_id();
        // Retire before unregistering so a restart for the same id cannot
        // publish ahead of this retire.
        self.publisher.retire(message_id);
        self.registry.unregister(&self.handle);
        tracing::debug!("🧹 Delayed send for message {} released ({})", message_id, self.handle.state());
    }
}
