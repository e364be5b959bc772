use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;

use flipper_storage::dao::{AlertHistoryDao, WatchlistDao};
use flipper_storage::{AlertMetric, Storage};

use crate::channel::AlertChannel;
use crate::error::AlertError;
use crate::formatter::format_alert;

/// Outcome of one evaluate-and-dispatch call, returned so callers (the
/// orchestrator, or a test) can assert on what actually happened without
/// re-querying storage.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub message: String,
    pub channels_sent: Vec<String>,
    pub channels_failed: HashMap<String, String>,
}

/// Evaluates one tracked item's current metric value against its
/// configured threshold, suppresses repeats inside the cooldown window,
/// and fans a crossing out to every configured channel (SPEC_FULL.md
/// §4.5). Durable recording happens unconditionally once a crossing is
/// not suppressed, even if every channel delivery fails — the alert still
/// "happened" from the system's point of view.
pub struct AlertDispatcher<'a> {
    storage: &'a Storage,
    channels: Vec<Box<dyn AlertChannel>>,
    cooldown: Duration,
}

impl<'a> AlertDispatcher<'a> {
    pub fn new(storage: &'a Storage, channels: Vec<Box<dyn AlertChannel>>, cooldown: Duration) -> Self {
        Self { storage, channels, cooldown }
    }

    pub async fn evaluate_and_dispatch(
        &self,
        type_id: u32,
        type_name: &str,
        metric_values: &HashMap<AlertMetric, f64>,
        scan_id: Option<i64>,
    ) -> Result<Option<DispatchOutcome>, AlertError> {
        let watchlist_dao = WatchlistDao::new(self.storage);
        let Some(item) = watchlist_dao.get(type_id).await? else {
            return Ok(None);
        };
        if !item.alert_enabled {
            return Ok(None);
        }
        let (Some(metric), Some(threshold)) = (item.alert_metric, item.alert_threshold) else {
            return Ok(None);
        };
        let Some(&current_value) = metric_values.get(&metric) else {
            return Ok(None);
        };
        if current_value < threshold {
            return Ok(None);
        }

        let alert_history = AlertHistoryDao::new(self.storage);
        if let Some(last_sent) = alert_history.last_alert_time(type_id, metric, threshold).await? {
            let elapsed = Utc::now().signed_duration_since(last_sent);
            if elapsed.num_seconds() < self.cooldown.as_secs() as i64 {
                return Ok(None);
            }
        }

        let message = format_alert(type_name, metric, threshold, current_value);

        let mut channels_sent = Vec::new();
        let mut channels_failed = HashMap::new();
        for channel in &self.channels {
            match channel.send(&message).await {
                Ok(()) => channels_sent.push(channel.name().to_string()),
                Err(reason) => {
                    channels_failed.insert(channel.name().to_string(), reason);
                }
            }
        }

        alert_history
            .record(
                type_id,
                metric,
                threshold,
                current_value,
                message.clone(),
                channels_sent.clone(),
                channels_failed.clone(),
                scan_id,
            )
            .await?;

        Ok(Some(DispatchOutcome {
            message,
            channels_sent,
            channels_failed,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct RecordingChannel {
        name: String,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl AlertChannel for RecordingChannel {
        fn name(&self) -> &str {
            &self.name
        }
        async fn send(&self, _message: &str) -> Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err("boom".to_string())
            } else {
                Ok(())
            }
        }
    }

    async fn setup_watchlist(storage: &Storage, type_id: u32, metric: AlertMetric, threshold: f64) {
        let dao = WatchlistDao::new(storage);
        dao.add(type_id).await.unwrap();
        dao.set_alert(type_id, Some(metric), Some(threshold)).await.unwrap();
    }

    #[tokio::test]
    async fn below_threshold_does_not_dispatch() {
        let storage = Storage::open_in_memory().unwrap();
        setup_watchlist(&storage, 587, AlertMetric::MarginPercent, 10.0).await;

        let dispatcher = AlertDispatcher::new(&storage, vec![], Duration::from_secs(3600));
        let mut values = HashMap::new();
        values.insert(AlertMetric::MarginPercent, 5.0);

        let outcome = dispatcher
            .evaluate_and_dispatch(587, "Tritanium", &values, None)
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn crossing_threshold_dispatches_to_all_channels_and_records_history() {
        let storage = Storage::open_in_memory().unwrap();
        setup_watchlist(&storage, 587, AlertMetric::MarginPercent, 10.0).await;

        let calls = Arc::new(AtomicUsize::new(0));
        let channels: Vec<Box<dyn AlertChannel>> = vec![Box::new(RecordingChannel {
            name: "discord".to_string(),
            calls: calls.clone(),
            fail: false,
        })];
        let dispatcher = AlertDispatcher::new(&storage, channels, Duration::from_secs(3600));

        let mut values = HashMap::new();
        values.insert(AlertMetric::MarginPercent, 15.0);

        let outcome = dispatcher
            .evaluate_and_dispatch(587, "Tritanium", &values, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.channels_sent, vec!["discord".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let history = AlertHistoryDao::new(&storage)
            .last_alert_time(587, AlertMetric::MarginPercent, 10.0)
            .await
            .unwrap();
        assert!(history.is_some());
    }

    #[tokio::test]
    async fn repeat_crossing_inside_cooldown_is_suppressed() {
        let storage = Storage::open_in_memory().unwrap();
        setup_watchlist(&storage, 587, AlertMetric::MarginPercent, 10.0).await;

        let dispatcher = AlertDispatcher::new(&storage, vec![], Duration::from_secs(3600));
        let mut values = HashMap::new();
        values.insert(AlertMetric::MarginPercent, 15.0);

        let first = dispatcher
            .evaluate_and_dispatch(587, "Tritanium", &values, None)
            .await
            .unwrap();
        assert!(first.is_some());

        let second = dispatcher
            .evaluate_and_dispatch(587, "Tritanium", &values, None)
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn failed_channel_is_still_recorded_in_history() {
        let storage = Storage::open_in_memory().unwrap();
        setup_watchlist(&storage, 587, AlertMetric::MarginPercent, 10.0).await;

        let calls = Arc::new(AtomicUsize::new(0));
        let channels: Vec<Box<dyn AlertChannel>> = vec![Box::new(RecordingChannel {
            name: "discord".to_string(),
            calls,
            fail: true,
        })];
        let dispatcher = AlertDispatcher::new(&storage, channels, Duration::from_secs(3600));

        let mut values = HashMap::new();
        values.insert(AlertMetric::MarginPercent, 15.0);

        let outcome = dispatcher
            .evaluate_and_dispatch(587, "Tritanium", &values, None)
            .await
            .unwrap()
            .unwrap();
        assert!(outcome.channels_sent.is_empty());
        assert_eq!(outcome.channels_failed.get("discord").unwrap(), "boom");
    }

    #[tokio::test]
    async fn untracked_type_is_not_dispatched() {
        let storage = Storage::open_in_memory().unwrap();
        let dispatcher = AlertDispatcher::new(&storage, vec![], Duration::from_secs(3600));
        let mut values = HashMap::new();
        values.insert(AlertMetric::MarginPercent, 15.0);

        let outcome = dispatcher
            .evaluate_and_dispatch(9999, "Unknown", &values, None)
            .await
            .unwrap();
        assert!(outcome.is_none());
    }
}
