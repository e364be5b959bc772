use rusqlite::Connection;
use tracing::info;

use crate::error::StorageError;

/// Schema migrations are monotonic and idempotent: each checks for the
/// columns/tables it needs before applying an additive change, so running
/// them against an up-to-date database is a no-op (SPEC_FULL.md §4.3,
/// Testable Property 7).
type Migration = fn(&Connection) -> rusqlite::Result<()>;

const MIGRATIONS: &[(u32, Migration)] = &[
    (1, migration_001_base_tables),
    (2, migration_002_alert_history_scan_fk),
    (3, migration_003_fills_and_characters),
];

pub fn run_migrations(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);",
    )?;

    let current: u32 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| row.get(0))
        .unwrap_or(0);

    for &(version, migration) in MIGRATIONS {
        if version <= current {
            continue;
        }
        migration(conn)?;
        conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
        info!(version, "applied schema migration");
    }

    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn add_column_if_missing(
    conn: &Connection,
    table: &str,
    column: &str,
    ddl: &str,
) -> rusqlite::Result<()> {
    if !table_has_column(conn, table, column)? {
        conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {ddl}"), [])?;
    }
    Ok(())
}

fn migration_001_base_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS config (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            data TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS watchlist (
            type_id INTEGER PRIMARY KEY,
            added_at TEXT NOT NULL,
            alert_enabled INTEGER NOT NULL DEFAULT 0,
            alert_metric TEXT,
            alert_threshold REAL
        );

        CREATE TABLE IF NOT EXISTS alert_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            type_id INTEGER NOT NULL,
            metric TEXT NOT NULL,
            threshold REAL NOT NULL,
            current_value REAL NOT NULL,
            message TEXT NOT NULL,
            channels_sent TEXT NOT NULL,
            channels_failed TEXT NOT NULL,
            sent_at TEXT NOT NULL,
            FOREIGN KEY (type_id) REFERENCES watchlist(type_id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS scan_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            origin_system INTEGER NOT NULL,
            started_at TEXT NOT NULL,
            duration_ms INTEGER NOT NULL,
            count INTEGER NOT NULL,
            top_profit REAL NOT NULL,
            total_profit REAL NOT NULL,
            parameter_snapshot TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS flip_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            scan_id INTEGER NOT NULL,
            type_id INTEGER NOT NULL,
            type_name TEXT NOT NULL,
            buy_system INTEGER NOT NULL,
            sell_system INTEGER NOT NULL,
            units INTEGER NOT NULL,
            ask REAL NOT NULL,
            bid REAL NOT NULL,
            profit_per_unit REAL NOT NULL,
            total_profit REAL NOT NULL,
            margin REAL NOT NULL,
            total_jumps INTEGER NOT NULL,
            FOREIGN KEY (scan_id) REFERENCES scan_history(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS station_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            scan_id INTEGER NOT NULL,
            type_id INTEGER NOT NULL,
            type_name TEXT NOT NULL,
            best_bid REAL NOT NULL,
            best_ask REAL NOT NULL,
            margin_percent REAL NOT NULL,
            vwap_30d REAL NOT NULL,
            volatility_index REAL NOT NULL,
            depth_score REAL NOT NULL,
            days_of_supply REAL NOT NULL,
            buy_sell_ratio REAL NOT NULL,
            scam_score REAL NOT NULL,
            period_roi REAL NOT NULL,
            composite_score REAL NOT NULL,
            execution_plan TEXT NOT NULL,
            FOREIGN KEY (scan_id) REFERENCES scan_history(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS contract_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            scan_id INTEGER NOT NULL,
            contract_id INTEGER NOT NULL,
            contract_price REAL NOT NULL,
            estimated_value REAL NOT NULL,
            expected_profit REAL NOT NULL,
            realized_profit REAL NOT NULL,
            margin REAL NOT NULL,
            confidence_percent REAL NOT NULL,
            priced_ratio REAL NOT NULL,
            FOREIGN KEY (scan_id) REFERENCES scan_history(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS route_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            scan_id INTEGER NOT NULL,
            segments TEXT NOT NULL,
            total_profit REAL NOT NULL,
            total_jumps INTEGER NOT NULL,
            profit_per_jump REAL NOT NULL,
            FOREIGN KEY (scan_id) REFERENCES scan_history(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS demand_regions (
            region_id INTEGER PRIMARY KEY,
            data TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        ",
    )
}

/// `alert_history.scan_id` was dropped from the initial create to keep the
/// first migration focused on the core tables; added here additively per
/// the "new columns, leave old ones" discipline in §4.3.
fn migration_002_alert_history_scan_fk(conn: &Connection) -> rusqlite::Result<()> {
    add_column_if_missing(conn, "alert_history", "scan_id", "scan_id INTEGER")
}

fn migration_003_fills_and_characters(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS characters (
            character_id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            added_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS fills (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            character_id INTEGER NOT NULL,
            type_id INTEGER NOT NULL,
            is_buy INTEGER NOT NULL,
            price REAL NOT NULL,
            quantity INTEGER NOT NULL,
            filled_at TEXT NOT NULL,
            FOREIGN KEY (character_id) REFERENCES characters(character_id) ON DELETE CASCADE
        );
        ",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent_on_fresh_database() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 3);
    }

    #[test]
    fn migrating_from_one_version_behind_reaches_latest_schema() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE schema_version (version INTEGER NOT NULL);")
            .unwrap();
        migration_001_base_tables(&conn).unwrap();
        migration_002_alert_history_scan_fk(&conn).unwrap();
        conn.execute("INSERT INTO schema_version (version) VALUES (2)", [])
            .unwrap();

        run_migrations(&conn).unwrap();

        assert!(table_has_column(&conn, "fills", "quantity").unwrap());
    }
}
