//! # DelaySend Scheduler
//!
//! Delayed-dispatch controller for messages scheduled for later delivery.
//!
//! ## Architecture
//! ```text
//! START(id) ──► TaskRegistry (one task per message id)
//!                 └── spawned task
//!                       ├── load Message + Conversation (read-only)
//!                       ├── publish "Sending message to …" (Cancel → STOP(id))
//!                       ├── Waiting: select! {
//!                       │     cancel token ──► Cancelled
//!                       │     deadline     ──► Sending ──► RetrySend ──► Completed
//!                       │     ticker       ──► update_progress
//!                       │   }
//!                       └── cleanup guard: retire(id), unregister
//! STOP(id)  ──► Waiting → Cancelled (single compare-and-swap)
//! ```

pub mod controller;
pub mod dispatch;
pub mod notify;
pub mod registry;
pub mod retry;
pub mod store;
pub mod tasks;
pub mod ticker;

pub use controller::DelayedDispatcher;
pub use dispatch::{LogTransport, Transport, WebhookTransport};
pub use notify::{LogPublisher, NotifyEvent};
pub use registry::{RegistryStats, TaskRegistry};
pub use retry::{RetryPolicy, RetrySender};
pub use store::SnapshotStore;
pub use tasks::{DelayedTask, TaskHandle, TaskOutcome, TaskState};
pub use ticker::{Clock, SystemClock, Ticker};
