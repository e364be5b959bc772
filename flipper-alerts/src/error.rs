use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("storage error: {0}")]
    Storage(#[from] flipper_storage::StorageError),

    #[error("delivery to channel {channel} failed: {reason}")]
    Delivery { channel: String, reason: String },
}
