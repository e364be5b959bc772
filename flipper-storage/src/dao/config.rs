use crate::error::StorageError;
use crate::models::Config;
use crate::writer::Storage;

/// Config is a singleton row: "Always exactly one row; load returns
/// defaults on miss" (SPEC_FULL.md §4.3).
pub struct ConfigDao<'a> {
    storage: &'a Storage,
}

impl<'a> ConfigDao<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn load(&self) -> Result<Config, StorageError> {
        let row: Option<String> = self
            .storage
            .read(|conn| {
                match conn.query_row("SELECT data FROM config WHERE id = 1", [], |row| row.get(0)) {
                    Ok(v) => Ok(Some(v)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .await?;

        match row {
            Some(json) => serde_json::from_str(&json).map_err(StorageError::from),
            None => Ok(Config::default()),
        }
    }

    pub async fn save(&self, config: Config) -> Result<(), StorageError> {
        let json = serde_json::to_string(&config)?;
        self.storage
            .write(move |tx| {
                tx.execute(
                    "INSERT INTO config (id, data) VALUES (1, ?1)
                     ON CONFLICT(id) DO UPDATE SET data = excluded.data",
                    [json],
                )?;
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_returns_defaults_on_miss() {
        let storage = Storage::open_in_memory().unwrap();
        let dao = ConfigDao::new(&storage);
        assert_eq!(dao.load().await.unwrap(), Config::default());
    }

    #[tokio::test]
    async fn save_then_load_round_trips_and_stays_singleton() {
        let storage = Storage::open_in_memory().unwrap();
        let dao = ConfigDao::new(&storage);

        let mut config = Config::default();
        config.rate_per_sec = 5.0;
        dao.save(config.clone()).await.unwrap();
        dao.save(config.clone()).await.unwrap();

        assert_eq!(dao.load().await.unwrap(), config);

        let count: i64 = storage
            .read(|conn| conn.query_row("SELECT COUNT(*) FROM config", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
