use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json (de)serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("blocking write task panicked: {0}")]
    Join(String),

    #[error("legacy config import failed: {0}")]
    LegacyImport(String),
}
