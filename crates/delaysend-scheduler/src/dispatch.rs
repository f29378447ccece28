//! Message transports — the single delivery attempt under the retry loop.
//! Supports: HTTP webhook (JSON POST) and a log-only transport.

use std::time::Duration;

use async_trait::async_trait;
use delaysend_core::config::{TransportConfig, TransportKind};
use delaysend_core::error::{DelaySendError, Result};
use delaysend_core::types::Message;

/// One delivery attempt for a message.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, message: &Message) -> Result<()>;
}

/// Generic HTTP webhook — POST with JSON body.
pub struct WebhookTransport {
    client: reqwest::Client,
    url: String,
    headers: Vec<(String, String)>,
    timeout: Duration,
}

impl WebhookTransport {
    pub fn new(url: &str, headers: Vec<(String, String)>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
            headers,
            timeout,
        }
    }
}

/// JSON body posted for a message.
pub fn webhook_payload(message: &Message) -> serde_json::Value {
    serde_json::json!({
        "message_id": message.id,
        "thread_id": message.thread_id,
        "address": message.address,
        "body": message.body,
        "scheduled_at": message.date.to_rfc3339(),
    })
}

#[async_trait]
impl Transport for WebhookTransport {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn deliver(&self, message: &Message) -> Result<()> {
        let mut req = self
            .client
            .post(&self.url)
            .json(&webhook_payload(message))
            .timeout(self.timeout);

        for (key, value) in &self.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| DelaySendError::Transport(format!("Webhook send failed: {e}")))?;

        if resp.status().is_success() {
            tracing::info!("✅ Message {} delivered to {}", message.id, self.url);
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(DelaySendError::Transport(format!("Webhook error {status}: {body}")))
        }
    }
}

/// Logs the message and reports success.
#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl Transport for LogTransport {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, message: &Message) -> Result<()> {
        tracing::info!(
            "📨 Message {} to {} (thread {}): {}",
            message.id,
            message.address,
            message.thread_id,
            message.body
        );
        Ok(())
    }
}

/// Build the transport selected in config.
pub fn transport_from_config(config: &TransportConfig) -> Box<dyn Transport> {
    match config.kind {
        TransportKind::Log => Box::new(LogTransport),
        TransportKind::Webhook => Box::new(WebhookTransport::new(
            &config.webhook_url,
            config.headers.clone(),
            Duration::from_secs(config.timeout_secs),
        )),
    }
}
