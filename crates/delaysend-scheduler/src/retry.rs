//! Reference send-with-retry operation: exponential backoff with jitter over
//! a [`Transport`].

use std::time::Duration;

use async_trait::async_trait;
use delaysend_core::config::RetryConfig;
use delaysend_core::traits::RetrySend;
use delaysend_core::types::{Message, SendOutcome};
use rand::Rng;

use crate::dispatch::Transport;

/// Retry/backoff settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: Duration::from_millis(config.jitter_ms),
        }
    }

    /// Delay before retry number `attempt` (1-based, counting the failed
    /// attempt), without jitter: `base * 2^(attempt-1)` capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    fn backoff_with_jitter(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.backoff(attempt) + Duration::from_millis(extra)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Sends through a transport, retrying failed attempts per the policy.
pub struct RetrySender {
    transport: Box<dyn Transport>,
    policy: RetryPolicy,
}

impl RetrySender {
    pub fn new(transport: Box<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl RetrySend for RetrySender {
    async fn send(&self, message: &Message) -> SendOutcome {
        let mut last_error = String::new();

        for attempt in 1..=self.policy.max_attempts {
            match self.transport.deliver(message).await {
                Ok(()) => {
                    if attempt > 1 {
                        tracing::info!(
                            "🔄 Message {} sent via {} on attempt {}",
                            message.id,
                            self.transport.name(),
                            attempt
                        );
                    }
                    return SendOutcome::Sent { attempts: attempt };
                }
                Err(e) => {
                    tracing::warn!(
                        "⚠️ Send attempt {}/{} for message {} failed: {}",
                        attempt,
                        self.policy.max_attempts,
                        message.id,
                        e
                    );
                    last_error = e.to_string();
                    if attempt < self.policy.max_attempts {
                        tokio::time::sleep(self.policy.backoff_with_jitter(attempt)).await;
                    }
                }
            }
        }

        tracing::warn!(
            "❌ Giving up on message {} after {} attempts",
            message.id,
            self.policy.max_attempts
        );
        SendOutcome::Exhausted {
            attempts: self.policy.max_attempts,
            last_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use delaysend_core::error::{DelaySendError, Result};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` attempts, then succeeds.
    struct FlakyTransport {
        failures: u32,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn deliver(&self, _message: &Message) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                Err(DelaySendError::Transport(format!("boom {n}")))
            } else {
                Ok(())
            }
        }
    }

    fn message() -> Message {
        Message {
            id: 1,
            thread_id: 1,
            address: "+1".into(),
            body: "x".into(),
            date: Utc::now(),
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(250),
            jitter: Duration::ZERO,
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let p = policy(5);
        assert_eq!(p.backoff(1), Duration::from_millis(100));
        assert_eq!(p.backoff(2), Duration::from_millis(200));
        assert_eq!(p.backoff(3), Duration::from_millis(250));
        assert_eq!(p.backoff(40), Duration::from_millis(250));
    }

    #[test]
    fn test_policy_from_config_has_at_least_one_attempt() {
        let config = RetryConfig { max_attempts: 0, ..RetryConfig::default() };
        assert_eq!(RetryPolicy::from_config(&config).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let sender = RetrySender::new(
            Box::new(FlakyTransport { failures: 2, calls: calls.clone() }),
            policy(3),
        );
        let outcome = sender.send(&message()).await;
        assert_eq!(outcome, SendOutcome::Sent { attempts: 3 });
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let sender = RetrySender::new(
            Box::new(FlakyTransport { failures: u32::MAX, calls: calls.clone() }),
            policy(2),
        );
        let outcome = sender.send(&message()).await;
        assert_eq!(outcome.attempts(), 2);
        match outcome {
            SendOutcome::Exhausted { last_error, .. } => assert!(last_error.contains("boom 2")),
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
