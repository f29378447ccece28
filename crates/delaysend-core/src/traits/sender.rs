use async_trait::async_trait;

use crate::types::{Message, SendOutcome};

/// Send-with-retry operation.
///
/// Implementations own the whole retry/backoff policy and resolve exactly
/// once, either with a successful send or after giving up. Callers treat
/// either outcome as "done".
#[async_trait]
pub trait RetrySend: Send + Sync {
    async fn send(&self, message: &Message) -> SendOutcome;
}
