use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};

use crate::error::StorageError;
use crate::schema::run_migrations;

enum Backing {
    File(PathBuf),
    /// `cache=shared` in-memory database, named so repeated `Connection`s
    /// see the same data. `_keepalive` holds one connection open for the
    /// process lifetime — SQLite destroys a shared in-memory database the
    /// instant its last connection closes, and every `read`/`write` call
    /// opens and closes its own connection.
    Memory {
        uri: String,
        _keepalive: std::sync::Mutex<Connection>,
    },
}

/// Single embedded file-backed relational store in a concurrent-read,
/// serialized-write mode (SPEC_FULL.md §4.3). `write_lock` is the process
/// wide writer handle named in §5 ("no component takes more than one lock
/// at a time"); reads open their own short-lived connection so they are
/// never blocked by an in-flight write, which is safe under WAL.
pub struct Storage {
    backing: Backing,
    write_lock: tokio::sync::Mutex<()>,
}

impl Storage {
    /// Open (creating if absent) the embedded store at `db_path`, enable
    /// write-ahead journaling so readers never block writers (§5), and run
    /// schema migrations to completion before returning.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db_path = db_path.as_ref().to_path_buf();
        let conn = Connection::open(&db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        run_migrations(&conn)?;

        Ok(Self {
            backing: Backing::File(db_path),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Open a private, named in-memory store, useful for tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let name = format!(
            "flipper-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        );
        let uri = format!("file:{name}?mode=memory&cache=shared");
        let flags = OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE;
        let keepalive = Connection::open_with_flags(&uri, flags)?;
        keepalive.pragma_update(None, "foreign_keys", "ON")?;
        run_migrations(&keepalive)?;

        Ok(Self {
            backing: Backing::Memory {
                uri,
                _keepalive: std::sync::Mutex::new(keepalive),
            },
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    fn open_connection(&self, read_only: bool) -> rusqlite::Result<Connection> {
        let conn = match &self.backing {
            Backing::File(path) => {
                let flags = if read_only {
                    OpenFlags::SQLITE_OPEN_READ_ONLY
                } else {
                    OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
                };
                Connection::open_with_flags(path, flags)?
            }
            Backing::Memory { uri, .. } => {
                let flags = OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE;
                Connection::open_with_flags(uri, flags)?
            }
        };
        // foreign_keys is per-connection, not persisted in the schema, so
        // every freshly opened connection needs it re-enabled for cascade
        // deletes to fire.
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    /// Run `body` inside a single write transaction under the process-wide
    /// writer lock. The transaction either fully commits or fully rolls
    /// back — there is no way to observe a partially written result set,
    /// matching §5's cancellation guarantee.
    pub async fn write<F, T>(&self, body: F) -> Result<T, StorageError>
    where
        F: FnOnce(&rusqlite::Transaction) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self.write_lock.lock().await;

        // SAFETY-adjacent note: opening the connection happens on the
        // blocking pool, never on the async executor thread.
        let conn_result = self.open_connection(false);

        tokio::task::spawn_blocking(move || -> Result<T, StorageError> {
            let mut conn = conn_result?;
            let tx = conn.transaction()?;
            let result = body(&tx)?;
            tx.commit()?;
            Ok(result)
        })
        .await
        .map_err(|e| StorageError::Join(e.to_string()))?
    }

    /// Run `body` against a fresh read-only connection. Reads may be
    /// concurrent with each other and with the in-flight writer (§4.3).
    pub async fn read<F, T>(&self, body: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn_result = self.open_connection(true);

        tokio::task::spawn_blocking(move || -> Result<T, StorageError> {
            let conn = conn_result?;
            Ok(body(&conn)?)
        })
        .await
        .map_err(|e| StorageError::Join(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path().join("flipper.db")).unwrap();

        storage
            .write(|tx| {
                tx.execute(
                    "INSERT INTO config (id, data) VALUES (1, ?1)",
                    [r#"{"hello":"world"}"#],
                )
            })
            .await
            .unwrap();

        let data: String = storage
            .read(|conn| conn.query_row("SELECT data FROM config WHERE id = 1", [], |row| row.get(0)))
            .await
            .unwrap();

        assert_eq!(data, r#"{"hello":"world"}"#);
    }

    #[tokio::test]
    async fn in_memory_store_persists_across_calls() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .write(|tx| {
                tx.execute(
                    "INSERT INTO config (id, data) VALUES (1, ?1)",
                    [r#"{"hello":"world"}"#],
                )
            })
            .await
            .unwrap();

        let data: String = storage
            .read(|conn| conn.query_row("SELECT data FROM config WHERE id = 1", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(data, r#"{"hello":"world"}"#);
    }

    #[tokio::test]
    async fn writes_serialize_without_losing_either_insert() {
        let dir = tempfile::tempdir().unwrap();
        let storage = std::sync::Arc::new(Storage::open(dir.path().join("flipper.db")).unwrap());

        let mut handles = Vec::new();
        for i in 0..20 {
            let storage = storage.clone();
            handles.push(tokio::spawn(async move {
                storage
                    .write(move |tx| {
                        tx.execute(
                            "INSERT INTO scan_history (kind, origin_system, started_at, duration_ms, count, top_profit, total_profit, parameter_snapshot) VALUES ('radius_flip', 1, '2026-01-01T00:00:00Z', 1, ?1, 0, 0, '{}')",
                            [i],
                        )
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let count: i64 = storage
            .read(|conn| conn.query_row("SELECT COUNT(*) FROM scan_history", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(count, 20);
    }
}
