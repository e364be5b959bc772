use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("upstream client error: {0}")]
    Client(#[from] flipper_client::ClientError),

    #[error("storage error: {0}")]
    Storage(#[from] flipper_storage::StorageError),

    #[error("alert dispatch error: {0}")]
    Alert(#[from] flipper_alerts::AlertError),

    #[error("unknown origin system {0}")]
    UnknownOrigin(u32),

    #[error("scan canceled")]
    Canceled,
}
