use chrono::Utc;

use crate::error::StorageError;
use crate::models::{AlertMetric, WatchlistItem};
use crate::writer::Storage;

/// Watched item types. Removing an entry cascades to its `alert_history`
/// rows via the foreign key declared in `migration_001_base_tables`
/// (SPEC_FULL.md §4.3, Testable Property: watchlist cascade).
pub struct WatchlistDao<'a> {
    storage: &'a Storage,
}

impl<'a> WatchlistDao<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn add(&self, type_id: u32) -> Result<(), StorageError> {
        let added_at = Utc::now().to_rfc3339();
        self.storage
            .write(move |tx| {
                tx.execute(
                    "INSERT INTO watchlist (type_id, added_at, alert_enabled) VALUES (?1, ?2, 0)
                     ON CONFLICT(type_id) DO NOTHING",
                    rusqlite::params![type_id, added_at],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn remove(&self, type_id: u32) -> Result<(), StorageError> {
        self.storage
            .write(move |tx| {
                tx.execute("DELETE FROM watchlist WHERE type_id = ?1", [type_id])?;
                Ok(())
            })
            .await
    }

    pub async fn set_alert(
        &self,
        type_id: u32,
        metric: Option<AlertMetric>,
        threshold: Option<f64>,
    ) -> Result<(), StorageError> {
        let metric_str = metric.map(|m| serde_json::to_value(m).unwrap().as_str().unwrap().to_string());
        self.storage
            .write(move |tx| {
                tx.execute(
                    "UPDATE watchlist SET alert_enabled = ?1, alert_metric = ?2, alert_threshold = ?3
                     WHERE type_id = ?4",
                    rusqlite::params![metric_str.is_some(), metric_str, threshold, type_id],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn list(&self) -> Result<Vec<WatchlistItem>, StorageError> {
        self.storage
            .read(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT type_id, added_at, alert_enabled, alert_metric, alert_threshold
                     FROM watchlist ORDER BY type_id",
                )?;
                let rows = stmt.query_map([], |row| {
                    let metric: Option<String> = row.get(3)?;
                    Ok(WatchlistItem {
                        type_id: row.get(0)?,
                        added_at: row.get::<_, String>(1)?.parse().unwrap_or_else(|_| Utc::now()),
                        alert_enabled: row.get(2)?,
                        alert_metric: metric.and_then(|m| serde_json::from_value(serde_json::Value::String(m)).ok()),
                        alert_threshold: row.get(4)?,
                    })
                })?;
                rows.collect()
            })
            .await
    }

    pub async fn get(&self, type_id: u32) -> Result<Option<WatchlistItem>, StorageError> {
        self.storage
            .read(move |conn| {
                conn.query_row(
                    "SELECT type_id, added_at, alert_enabled, alert_metric, alert_threshold
                     FROM watchlist WHERE type_id = ?1",
                    [type_id],
                    |row| {
                        let metric: Option<String> = row.get(3)?;
                        Ok(WatchlistItem {
                            type_id: row.get(0)?,
                            added_at: row.get::<_, String>(1)?.parse().unwrap_or_else(|_| Utc::now()),
                            alert_enabled: row.get(2)?,
                            alert_metric: metric.and_then(|m| serde_json::from_value(serde_json::Value::String(m)).ok()),
                            alert_threshold: row.get(4)?,
                        })
                    },
                )
                .optional()
            })
            .await
    }

    pub async fn contains(&self, type_id: u32) -> Result<bool, StorageError> {
        self.storage
            .read(move |conn| {
                conn.query_row(
                    "SELECT 1 FROM watchlist WHERE type_id = ?1",
                    [type_id],
                    |_| Ok(()),
                )
                .optional()
                .map(|row| row.is_some())
            })
            .await
    }
}

use rusqlite::OptionalExtension;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_then_list_round_trips() {
        let storage = Storage::open_in_memory().unwrap();
        let dao = WatchlistDao::new(&storage);
        dao.add(587).await.unwrap();
        dao.add(34).await.unwrap();

        let items = dao.list().await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].type_id, 34);
        assert!(!items[0].alert_enabled);
    }

    #[tokio::test]
    async fn adding_same_type_id_twice_is_a_no_op() {
        let storage = Storage::open_in_memory().unwrap();
        let dao = WatchlistDao::new(&storage);
        dao.add(587).await.unwrap();
        dao.add(587).await.unwrap();
        assert_eq!(dao.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn removing_a_watched_item_cascades_to_alert_history() {
        let storage = Storage::open_in_memory().unwrap();
        let dao = WatchlistDao::new(&storage);
        dao.add(587).await.unwrap();

        storage
            .write(|tx| {
                tx.execute(
                    "INSERT INTO alert_history (type_id, metric, threshold, current_value, message, channels_sent, channels_failed, sent_at)
                     VALUES (587, 'margin_percent', 10.0, 12.0, 'msg', '[]', '{}', '2026-01-01T00:00:00Z')",
                    [],
                )
            })
            .await
            .unwrap();

        dao.remove(587).await.unwrap();

        let count: i64 = storage
            .read(|conn| conn.query_row("SELECT COUNT(*) FROM alert_history", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn get_returns_none_for_untracked_type() {
        let storage = Storage::open_in_memory().unwrap();
        let dao = WatchlistDao::new(&storage);
        assert!(dao.get(587).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_alert_updates_threshold_and_metric() {
        let storage = Storage::open_in_memory().unwrap();
        let dao = WatchlistDao::new(&storage);
        dao.add(587).await.unwrap();
        dao.set_alert(587, Some(AlertMetric::MarginPercent), Some(15.0))
            .await
            .unwrap();

        let items = dao.list().await.unwrap();
        assert!(items[0].alert_enabled);
        assert_eq!(items[0].alert_metric, Some(AlertMetric::MarginPercent));
        assert_eq!(items[0].alert_threshold, Some(15.0));
    }
}
