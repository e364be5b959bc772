use crate::error::StorageError;
use crate::models::{ContractResultRow, FlipResultRow, RouteResultRow, StationResultRow};
use crate::writer::Storage;

/// Bulk insert of a single scan's result rows, one table per scan type
/// (SPEC_FULL.md §4.1, §4.3). Each call runs inside one write transaction
/// so a scan's results either all land or none do.
pub struct ResultsDao<'a> {
    storage: &'a Storage,
}

impl<'a> ResultsDao<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn insert_flips(&self, rows: Vec<FlipResultRow>) -> Result<(), StorageError> {
        self.storage
            .write(move |tx| {
                for row in &rows {
                    tx.execute(
                        "INSERT INTO flip_results
                         (scan_id, type_id, type_name, buy_system, sell_system, units, ask, bid, profit_per_unit, total_profit, margin, total_jumps)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                        rusqlite::params![
                            row.scan_id, row.type_id, row.type_name, row.buy_system, row.sell_system,
                            row.units, row.ask, row.bid, row.profit_per_unit, row.total_profit,
                            row.margin, row.total_jumps
                        ],
                    )?;
                }
                Ok(())
            })
            .await
    }

    pub async fn insert_stations(&self, rows: Vec<StationResultRow>) -> Result<(), StorageError> {
        self.storage
            .write(move |tx| {
                for row in &rows {
                    let execution_plan = serde_json::to_string(&row.execution_plan)
                        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
                    tx.execute(
                        "INSERT INTO station_results
                         (scan_id, type_id, type_name, best_bid, best_ask, margin_percent, vwap_30d, volatility_index,
                          depth_score, days_of_supply, buy_sell_ratio, scam_score, period_roi, composite_score, execution_plan)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                        rusqlite::params![
                            row.scan_id, row.type_id, row.type_name, row.best_bid, row.best_ask,
                            row.margin_percent, row.vwap_30d, row.volatility_index, row.depth_score,
                            row.days_of_supply, row.buy_sell_ratio, row.scam_score, row.period_roi,
                            row.composite_score, execution_plan
                        ],
                    )?;
                }
                Ok(())
            })
            .await
    }

    pub async fn insert_contracts(&self, rows: Vec<ContractResultRow>) -> Result<(), StorageError> {
        self.storage
            .write(move |tx| {
                for row in &rows {
                    tx.execute(
                        "INSERT INTO contract_results
                         (scan_id, contract_id, contract_price, estimated_value, expected_profit, realized_profit, margin, confidence_percent, priced_ratio)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                        rusqlite::params![
                            row.scan_id, row.contract_id as i64, row.contract_price, row.estimated_value,
                            row.expected_profit, row.realized_profit, row.margin, row.confidence_percent, row.priced_ratio
                        ],
                    )?;
                }
                Ok(())
            })
            .await
    }

    pub async fn insert_routes(&self, rows: Vec<RouteResultRow>) -> Result<(), StorageError> {
        self.storage
            .write(move |tx| {
                for row in &rows {
                    let segments = serde_json::to_string(&row.segments)
                        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
                    tx.execute(
                        "INSERT INTO route_results (scan_id, segments, total_profit, total_jumps, profit_per_jump)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        rusqlite::params![row.scan_id, segments, row.total_profit, row.total_jumps, row.profit_per_jump],
                    )?;
                }
                Ok(())
            })
            .await
    }

    pub async fn flips_for_scan(&self, scan_id: i64) -> Result<Vec<FlipResultRow>, StorageError> {
        self.storage
            .read(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT scan_id, type_id, type_name, buy_system, sell_system, units, ask, bid, profit_per_unit, total_profit, margin, total_jumps
                     FROM flip_results WHERE scan_id = ?1 ORDER BY total_profit DESC",
                )?;
                let rows = stmt.query_map([scan_id], |row| {
                    Ok(FlipResultRow {
                        scan_id: row.get(0)?,
                        type_id: row.get(1)?,
                        type_name: row.get(2)?,
                        buy_system: row.get(3)?,
                        sell_system: row.get(4)?,
                        units: row.get(5)?,
                        ask: row.get(6)?,
                        bid: row.get(7)?,
                        profit_per_unit: row.get(8)?,
                        total_profit: row.get(9)?,
                        margin: row.get(10)?,
                        total_jumps: row.get(11)?,
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
    use crate::dao::scan_history::ScanHistoryDao;
    use crate::models::ScanKind;

    fn sample_flip(scan_id: i64, total_profit: f64) -> FlipResultRow {
        FlipResultRow {
            scan_id,
            type_id: 34,
            type_name: "Tritanium".to_string(),
            buy_system: 30000142,
            sell_system: 30000144,
            units: 1000,
            ask: 5.5,
            bid: 5.0,
            profit_per_unit: 0.5,
            total_profit,
            margin: 0.1,
            total_jumps: 3,
        }
    }

    #[tokio::test]
    async fn inserted_flips_come_back_ordered_by_profit_descending() {
        let storage = Storage::open_in_memory().unwrap();
        let scan_dao = ScanHistoryDao::new(&storage);
        let results_dao = ResultsDao::new(&storage);

        let scan_id = scan_dao
            .record(ScanKind::RadiusFlip, 30000142, 10, 2, 900.0, 1400.0, serde_json::json!({}))
            .await
            .unwrap();

        results_dao
            .insert_flips(vec![sample_flip(scan_id, 500.0), sample_flip(scan_id, 900.0)])
            .await
            .unwrap();

        let rows = results_dao.flips_for_scan(scan_id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].total_profit, 900.0);
    }
}
