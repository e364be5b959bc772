use thiserror::Error;

/// Per-item and per-region failures are swallowed by the scanners
/// themselves (§7's propagation policy — skip and log); this enum is only
/// for failures that prevent computing any result at all.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("upstream client error: {0}")]
    Client(#[from] flipper_client::ClientError),

    #[error("unknown origin system {0}")]
    UnknownOrigin(u32),

    #[error("scan canceled")]
    Canceled,
}
