pub mod dao;
pub mod error;
pub mod legacy_import;
pub mod models;
pub mod schema;
pub mod writer;

pub use error::StorageError;
pub use models::{
    AlertHistoryRow, AlertMetric, Character, Config, ContractResultRow, DemandRegion, Fill,
    FlipResultRow, RouteResultRow, ScanKind, ScanRecord, StationResultRow, WatchlistItem,
};
pub use writer::Storage;
