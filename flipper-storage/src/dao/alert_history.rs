use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::models::AlertMetric;
use crate::writer::Storage;

/// Durable alert log, and the source of truth for cooldown gating: "has
/// this (type_id, metric, threshold) fired inside the cooldown window"
/// (SPEC_FULL.md §4.3).
pub struct AlertHistoryDao<'a> {
    storage: &'a Storage,
}

#[allow(clippy::too_many_arguments)]
impl<'a> AlertHistoryDao<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn record(
        &self,
        type_id: u32,
        metric: AlertMetric,
        threshold: f64,
        current_value: f64,
        message: String,
        channels_sent: Vec<String>,
        channels_failed: std::collections::HashMap<String, String>,
        scan_id: Option<i64>,
    ) -> Result<(), StorageError> {
        let metric_str = serde_json::to_value(metric)?.as_str().unwrap().to_string();
        let sent_json = serde_json::to_string(&channels_sent)?;
        let failed_json = serde_json::to_string(&channels_failed)?;
        let sent_at = Utc::now().to_rfc3339();

        self.storage
            .write(move |tx| {
                tx.execute(
                    "INSERT INTO alert_history
                     (type_id, metric, threshold, current_value, message, channels_sent, channels_failed, sent_at, scan_id)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    rusqlite::params![
                        type_id, metric_str, threshold, current_value, message, sent_json, failed_json, sent_at, scan_id
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Most recent `sent_at` for this exact (type_id, metric, threshold)
    /// triple, or `None` if it has never fired. Callers compare this
    /// against the configured cooldown to decide whether to suppress a
    /// repeat alert.
    pub async fn last_alert_time(
        &self,
        type_id: u32,
        metric: AlertMetric,
        threshold: f64,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        let metric_str = serde_json::to_value(metric)?.as_str().unwrap().to_string();
        self.storage
            .read(move |conn| {
                conn.query_row(
                    "SELECT MAX(sent_at) FROM alert_history WHERE type_id = ?1 AND metric = ?2 AND threshold = ?3",
                    rusqlite::params![type_id, metric_str, threshold],
                    |row| row.get::<_, Option<String>>(0),
                )
            })
            .await?
            .map(|s| {
                s.parse::<DateTime<Utc>>()
                    .map_err(|e| StorageError::LegacyImport(e.to_string()))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn last_alert_time_is_none_before_any_alert() {
        let storage = Storage::open_in_memory().unwrap();
        let dao = AlertHistoryDao::new(&storage);
        let result = dao
            .last_alert_time(587, AlertMetric::MarginPercent, 10.0)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn record_then_last_alert_time_reflects_the_most_recent_fire() {
        let storage = Storage::open_in_memory().unwrap();
        let dao = AlertHistoryDao::new(&storage);

        dao.record(
            587,
            AlertMetric::MarginPercent,
            10.0,
            12.5,
            "margin exceeded".to_string(),
            vec!["discord".to_string()],
            HashMap::new(),
            None,
        )
        .await
        .unwrap();

        let result = dao
            .last_alert_time(587, AlertMetric::MarginPercent, 10.0)
            .await
            .unwrap();
        assert!(result.is_some());

        let other = dao
            .last_alert_time(587, AlertMetric::TotalProfit, 10.0)
            .await
            .unwrap();
        assert!(other.is_none());
    }
}
