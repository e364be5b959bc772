use chrono::Utc;

use crate::error::StorageError;
use crate::models::DemandRegion;
use crate::writer::Storage;

/// Cached per-region historical-demand aggregates, upserted by region id
/// (SPEC_FULL.md §4.3).
pub struct DemandRegionDao<'a> {
    storage: &'a Storage,
}

impl<'a> DemandRegionDao<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn upsert(&self, region_id: u32, data: serde_json::Value) -> Result<(), StorageError> {
        let data_json = serde_json::to_string(&data)?;
        let updated_at = Utc::now().to_rfc3339();
        self.storage
            .write(move |tx| {
                tx.execute(
                    "INSERT INTO demand_regions (region_id, data, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(region_id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
                    rusqlite::params![region_id, data_json, updated_at],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get(&self, region_id: u32) -> Result<Option<DemandRegion>, StorageError> {
        self.storage
            .read(move |conn| {
                match conn.query_row(
                    "SELECT region_id, data, updated_at FROM demand_regions WHERE region_id = ?1",
                    [region_id],
                    |row| {
                        let data: String = row.get(1)?;
                        let updated_at: String = row.get(2)?;
                        Ok((row.get::<_, u32>(0)?, data, updated_at))
                    },
                ) {
                    Ok(v) => Ok(Some(v)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .await?
            .map(|(region_id, data, updated_at)| {
                Ok(DemandRegion {
                    region_id,
                    data: serde_json::from_str(&data)?,
                    updated_at: updated_at
                        .parse()
                        .map_err(|e: chrono::ParseError| StorageError::LegacyImport(e.to_string()))?,
                })
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_then_get_round_trips_and_overwrites() {
        let storage = Storage::open_in_memory().unwrap();
        let dao = DemandRegionDao::new(&storage);

        dao.upsert(10000002, serde_json::json!({"avg_daily_volume": 100})).await.unwrap();
        let first = dao.get(10000002).await.unwrap().unwrap();
        assert_eq!(first.data["avg_daily_volume"], 100);

        dao.upsert(10000002, serde_json::json!({"avg_daily_volume": 200})).await.unwrap();
        let second = dao.get(10000002).await.unwrap().unwrap();
        assert_eq!(second.data["avg_daily_volume"], 200);
    }

    #[tokio::test]
    async fn get_returns_none_for_unknown_region() {
        let storage = Storage::open_in_memory().unwrap();
        let dao = DemandRegionDao::new(&storage);
        assert!(dao.get(99999999).await.unwrap().is_none());
    }
}
