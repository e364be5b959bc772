use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("storage error: {0}")]
    Storage(#[from] flipper_storage::StorageError),

    #[error("no return samples to compute a risk metric over")]
    EmptySampleSet,
}
