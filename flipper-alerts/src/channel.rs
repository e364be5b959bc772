use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

/// Upper bound on a single webhook delivery so a slow or unreachable
/// destination can never stall the alert dispatcher's fan-out loop
/// (spec §4.4 step 5, §6).
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// A destination an alert message can be dispatched to. Grounded on the
/// fan-out-over-a-trait-object style `barter-execution` uses for its
/// exchange connectors — one small trait, one struct per concrete
/// destination, driven through `dyn` rather than an enum match (SPEC_FULL.md
/// §4.5).
#[async_trait]
pub trait AlertChannel: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, message: &str) -> Result<(), String>;
}

/// Webhook shaped like an instant-messenger bot API: `{"chat_id", "text"}`.
pub struct InstantMessengerWebhook {
    pub name: String,
    pub webhook_url: String,
    pub chat_id: String,
    client: reqwest::Client,
}

impl InstantMessengerWebhook {
    pub fn new(name: impl Into<String>, webhook_url: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            webhook_url: webhook_url.into(),
            chat_id: chat_id.into(),
            client: reqwest::Client::builder()
                .timeout(WEBHOOK_TIMEOUT)
                .build()
                .expect("reqwest client builds with default TLS backend"),
        }
    }
}

#[derive(Serialize)]
struct InstantMessengerPayload<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[async_trait]
impl AlertChannel for InstantMessengerWebhook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: &str) -> Result<(), String> {
        let payload = InstantMessengerPayload {
            chat_id: &self.chat_id,
            text: message,
        };
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("webhook returned {}", response.status()));
        }
        Ok(())
    }
}

/// Webhook shaped like a team-chat incoming-webhook API: `{"content"}`.
pub struct ChatWebhook {
    pub name: String,
    pub webhook_url: String,
    client: reqwest::Client,
}

impl ChatWebhook {
    pub fn new(name: impl Into<String>, webhook_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            webhook_url: webhook_url.into(),
            client: reqwest::Client::builder()
                .timeout(WEBHOOK_TIMEOUT)
                .build()
                .expect("reqwest client builds with default TLS backend"),
        }
    }
}

#[derive(Serialize)]
struct ChatPayload<'a> {
    content: &'a str,
}

#[async_trait]
impl AlertChannel for ChatWebhook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: &str) -> Result<(), String> {
        let payload = ChatPayload { content: message };
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("webhook returned {}", response.status()));
        }
        Ok(())
    }
}

/// Local desktop notification. There is no failure mode reachable from
/// this process for a local notification, so it is always counted as
/// sent (SPEC_FULL.md §4.5).
pub struct DesktopChannel {
    pub name: String,
}

impl DesktopChannel {
    pub fn new() -> Self {
        Self { name: "desktop".to_string() }
    }
}

impl Default for DesktopChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertChannel for DesktopChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: &str) -> Result<(), String> {
        tracing::info!(message, "desktop notification");
        Ok(())
    }
}
