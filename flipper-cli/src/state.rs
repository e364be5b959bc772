use std::sync::Arc;
use std::time::Duration;

use flipper_alerts::{AlertChannel, ChatWebhook, DesktopChannel, InstantMessengerWebhook};
use flipper_client::{ClientConfig, UpstreamClient};
use flipper_storage::Storage;
use flipper_universe::{StaticCatalog, UniverseGraph};

/// Process-wide singletons every HTTP handler and scan task borrows from
/// (SPEC_FULL.md §5, "Shared-resource policy": the writer, the client's
/// rate bucket/cache/single-flight are all process-wide).
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
    pub graph: Arc<UniverseGraph>,
    pub catalog: Arc<StaticCatalog>,
    pub client: Arc<UpstreamClient>,
    pub alert_cooldown: Duration,
}

impl AppState {
    /// Channel set is fixed at process start from environment configuration
    /// (`FLIPPER_CHAT_WEBHOOK_URL`, `FLIPPER_MESSENGER_WEBHOOK_URL` /
    /// `_CHAT_ID`); the desktop channel always participates. Webhook
    /// destinations with no URL configured are dropped rather than sent to
    /// an empty string.
    pub fn alert_channels(&self) -> Vec<Box<dyn AlertChannel>> {
        let mut channels: Vec<Box<dyn AlertChannel>> = vec![Box::new(DesktopChannel::new())];
        if let Ok(url) = std::env::var("FLIPPER_CHAT_WEBHOOK_URL") {
            channels.push(Box::new(ChatWebhook::new("chat", url)));
        }
        if let (Ok(url), Ok(chat_id)) = (
            std::env::var("FLIPPER_MESSENGER_WEBHOOK_URL"),
            std::env::var("FLIPPER_MESSENGER_CHAT_ID"),
        ) {
            channels.push(Box::new(InstantMessengerWebhook::new("messenger", url, chat_id)));
        }
        channels
    }
}

pub fn default_client_config() -> ClientConfig {
    ClientConfig::default()
}
