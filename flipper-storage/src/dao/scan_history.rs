use chrono::Utc;

use crate::error::StorageError;
use crate::models::ScanKind;
use crate::writer::Storage;

/// One row per completed (or canceled-but-partial) scan run, the parent
/// that all `*_results` tables hang off of via `scan_id` (SPEC_FULL.md
/// §4.3).
pub struct ScanHistoryDao<'a> {
    storage: &'a Storage,
}

impl<'a> ScanHistoryDao<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn record(
        &self,
        kind: ScanKind,
        origin_system: u32,
        duration_ms: i64,
        count: i64,
        top_profit: f64,
        total_profit: f64,
        parameter_snapshot: serde_json::Value,
    ) -> Result<i64, StorageError> {
        let kind_str = serde_json::to_value(kind)?.as_str().unwrap().to_string();
        let started_at = Utc::now().to_rfc3339();
        let snapshot_json = serde_json::to_string(&parameter_snapshot)?;

        self.storage
            .write(move |tx| {
                tx.execute(
                    "INSERT INTO scan_history
                     (kind, origin_system, started_at, duration_ms, count, top_profit, total_profit, parameter_snapshot)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    rusqlite::params![
                        kind_str, origin_system, started_at, duration_ms, count, top_profit, total_profit, snapshot_json
                    ],
                )?;
                Ok(tx.last_insert_rowid())
            })
            .await
    }

    pub async fn recent(&self, kind: ScanKind, limit: i64) -> Result<Vec<i64>, StorageError> {
        let kind_str = serde_json::to_value(kind)?.as_str().unwrap().to_string();
        self.storage
            .read(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id FROM scan_history WHERE kind = ?1 ORDER BY id DESC LIMIT ?2",
                )?;
                let rows = stmt.query_map(rusqlite::params![kind_str, limit], |row| row.get(0))?;
                rows.collect()
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_returns_increasing_ids_and_recent_filters_by_kind() {
        let storage = Storage::open_in_memory().unwrap();
        let dao = ScanHistoryDao::new(&storage);

        let first = dao
            .record(ScanKind::RadiusFlip, 30000142, 120, 3, 500.0, 1200.0, serde_json::json!({}))
            .await
            .unwrap();
        let second = dao
            .record(ScanKind::Contract, 30000142, 80, 1, 900.0, 900.0, serde_json::json!({}))
            .await
            .unwrap();
        assert!(second > first);

        let recent = dao.recent(ScanKind::RadiusFlip, 10).await.unwrap();
        assert_eq!(recent, vec![first]);
    }
}
