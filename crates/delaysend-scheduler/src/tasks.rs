//! Task definitions — the state machine for one delayed message.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use delaysend_core::types::SendOutcome;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Lifecycle of a delayed task.
///
/// ```text
/// Waiting --deadline--> Sending --send resolves--> Completed
/// Waiting --stop------> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum TaskState {
    Waiting = 0,
    Sending = 1,
    Completed = 2,
    Cancelled = 3,
}

impl TaskState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => TaskState::Waiting,
            1 => TaskState::Sending,
            2 => TaskState::Completed,
            _ => TaskState::Cancelled,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Cancelled)
    }

    /// Whether `self -> to` is an edge of the lifecycle.
    pub fn can_move_to(&self, to: TaskState) -> bool {
        matches!(
            (self, to),
            (TaskState::Waiting, TaskState::Sending)
                | (TaskState::Sending, TaskState::Completed)
                | (TaskState::Waiting, TaskState::Cancelled)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            TaskState::Waiting => "waiting",
            TaskState::Sending => "sending",
            TaskState::Completed => "completed",
            TaskState::Cancelled => "cancelled",
        })
    }
}

/// How a task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The deadline was reached and the send operation finished.
    Completed(SendOutcome),
    /// Stopped before the deadline.
    Cancelled,
    /// Inputs could not be loaded; nothing was published or sent.
    Aborted(String),
}

/// Point-in-time view of a running task.
#[derive(Debug, Clone, Serialize)]
pub struct DelayedTask {
    pub message_id: i64,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub state: TaskState,
}

#[derive(Debug)]
struct TaskShared {
    message_id: i64,
    generation: u64,
    state: AtomicU8,
    cancel: CancellationToken,
    timing: OnceLock<(DateTime<Utc>, DateTime<Utc>)>,
}

/// Shared handle to one registered task.
///
/// The state byte is the only arbiter between the deadline and a stop
/// request: whichever compare-and-swap out of `Waiting` lands first wins,
/// the other one observes a non-`Waiting` state and backs off.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    inner: Arc<TaskShared>,
}

impl TaskHandle {
    pub(crate) fn new(message_id: i64, generation: u64) -> Self {
        Self {
            inner: Arc::new(TaskShared {
                message_id,
                generation,
                state: AtomicU8::new(TaskState::Waiting as u8),
                cancel: CancellationToken::new(),
                timing: OnceLock::new(),
            }),
        }
    }

    pub fn message_id(&self) -> i64 {
        self.inner.message_id
    }

    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Attempt `from -> to`. Returns false for edges outside the lifecycle
    /// and when another transition got there first.
    pub(crate) fn transition(&self, from: TaskState, to: TaskState) -> bool {
        if !from.can_move_to(to) {
            return false;
        }
        self.inner
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Stop request. Only succeeds while the task is still waiting; a task
    /// that already committed to sending is left alone.
    pub fn cancel(&self) -> bool {
        if self.transition(TaskState::Waiting, TaskState::Cancelled) {
            self.inner.cancel.cancel();
            true
        } else {
            false
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    pub(crate) fn set_timing(&self, scheduled_at: DateTime<Utc>, started_at: DateTime<Utc>) {
        if self.inner.timing.set((scheduled_at, started_at)).is_err() {
            tracing::warn!(
                "⚠️ Timing for message {} already recorded, keeping the first",
                self.inner.message_id
            );
        }
    }

    /// `None` until the task has loaded its message.
    pub fn snapshot(&self) -> Option<DelayedTask> {
        let (scheduled_at, started_at) = *self.inner.timing.get()?;
        Some(DelayedTask {
            message_id: self.inner.message_id,
            scheduled_at,
            started_at,
            state: self.state(),
        })
    }

    /// Generations are unique per registry, so this tells apart two tasks
    /// registered under the same message id.
    pub(crate) fn same_task(&self, other: &TaskHandle) -> bool {
        self.inner.message_id == other.inner.message_id
            && self.inner.generation == other.inner.generation
    }
}
