use chrono::Utc;

use crate::error::StorageError;
use crate::models::{Character, Fill};
use crate::writer::Storage;

/// Raw fill ledger backing the FIFO realized-P&L and drawdown math in
/// `flipper-risk` (SPEC_FULL.md §4.6). Storage only persists the ledger;
/// it knows nothing about lot matching.
pub struct FillsDao<'a> {
    storage: &'a Storage,
}

impl<'a> FillsDao<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn add_character(&self, character_id: u64, name: String) -> Result<(), StorageError> {
        let added_at = Utc::now().to_rfc3339();
        self.storage
            .write(move |tx| {
                tx.execute(
                    "INSERT INTO characters (character_id, name, added_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(character_id) DO UPDATE SET name = excluded.name",
                    rusqlite::params![character_id as i64, name, added_at],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn characters(&self) -> Result<Vec<Character>, StorageError> {
        self.storage
            .read(|conn| {
                let mut stmt = conn.prepare("SELECT character_id, name, added_at FROM characters ORDER BY character_id")?;
                let rows = stmt.query_map([], |row| {
                    let added_at: String = row.get(2)?;
                    Ok(Character {
                        character_id: row.get::<_, i64>(0)? as u64,
                        name: row.get(1)?,
                        added_at: added_at.parse().unwrap_or_else(|_| Utc::now()),
                    })
                })?;
                rows.collect()
            })
            .await
    }

    pub async fn record_fill(
        &self,
        character_id: u64,
        type_id: u32,
        is_buy: bool,
        price: f64,
        quantity: i64,
    ) -> Result<i64, StorageError> {
        let filled_at = Utc::now().to_rfc3339();
        self.storage
            .write(move |tx| {
                tx.execute(
                    "INSERT INTO fills (character_id, type_id, is_buy, price, quantity, filled_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    rusqlite::params![character_id as i64, type_id, is_buy, price, quantity, filled_at],
                )?;
                Ok(tx.last_insert_rowid())
            })
            .await
    }

    pub async fn fills_for_character(&self, character_id: u64) -> Result<Vec<Fill>, StorageError> {
        self.storage
            .read(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, character_id, type_id, is_buy, price, quantity, filled_at
                     FROM fills WHERE character_id = ?1 ORDER BY filled_at ASC, id ASC",
                )?;
                let rows = stmt.query_map([character_id as i64], |row| {
                    let filled_at: String = row.get(6)?;
                    Ok(Fill {
                        id: row.get(0)?,
                        character_id: row.get::<_, i64>(1)? as u64,
                        type_id: row.get(2)?,
                        is_buy: row.get(3)?,
                        price: row.get(4)?,
                        quantity: row.get(5)?,
                        filled_at: filled_at.parse().unwrap_or_else(|_| Utc::now()),
                    })
                })?;
                rows.collect()
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fills_come_back_in_fifo_order_for_lot_matching() {
        let storage = Storage::open_in_memory().unwrap();
        let dao = FillsDao::new(&storage);
        dao.add_character(95465499, "Test Pilot".to_string()).await.unwrap();

        dao.record_fill(95465499, 34, true, 5.0, 1000).await.unwrap();
        dao.record_fill(95465499, 34, false, 5.5, 400).await.unwrap();

        let fills = dao.fills_for_character(95465499).await.unwrap();
        assert_eq!(fills.len(), 2);
        assert!(fills[0].is_buy);
        assert!(!fills[1].is_buy);
    }
}
