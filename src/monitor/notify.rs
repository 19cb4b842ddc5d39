use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use tracing::{debug, error};

use super::{env::APP_CONFIG, REQUEST_TIMEOUT};

#[async_trait]
pub trait MessageSink {
    async fn send(&self, chat_id: &str, text: &str) -> Result<()>;
}

pub struct Notifier {
    client: reqwest::Client,
}

impl Notifier {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?,
        })
    }
}

#[async_trait]
impl MessageSink for Notifier {
    async fn send(&self, chat_id: &str, text: &str) -> Result<()> {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            APP_CONFIG.telegram_api_key
        );
        let response = self
            .client
            .post(&url)
            .json(&json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                debug!(chat_id, text, "sent telegram message");
                Ok(())
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(anyhow!(
                    "failed to send telegram message, status {}: {}",
                    status,
                    body
                ))
            }
        }
    }
}

/// Best-effort delivery to every destination. Each attempt is independent;
/// one dead chat must not starve the others, and no failure reaches the
/// caller.
pub async fn fan_out(sink: &impl MessageSink, destinations: &[&str], text: &str) {
    for chat_id in destinations {
        if let Err(err) = sink.send(chat_id, text).await {
            error!(%err, chat_id, "failed to deliver notification");
        }
    }
}

/// Single-destination variant for command replies, same swallow policy.
pub async fn notify_reply(sink: &impl MessageSink, chat_id: &str, text: &str) {
    if let Err(err) = sink.send(chat_id, text).await {
        error!(%err, chat_id, "failed to deliver command reply");
    }
}
