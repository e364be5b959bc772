use thiserror::Error;

/// Errors raised loading or querying static universe data.
#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("failed to read static data file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse static data file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown system id {0}")]
    UnknownSystem(u32),

    #[error("unknown station id {0}")]
    UnknownStation(u64),
}
