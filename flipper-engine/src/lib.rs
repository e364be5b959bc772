pub mod contract_scan;
pub mod error;
pub mod fees;
pub mod params;
pub mod progress;
pub mod radius_flip;
pub mod result;
pub mod route_builder;
pub mod station_trade;

pub use contract_scan::{ContractCandidate, ContractScanner, ItemContext};
pub use error::ScanError;
pub use params::{ContractScanParams, RouteParams, ScanParams};
pub use progress::ProgressSink;
pub use radius_flip::RadiusFlipScanner;
pub use result::{ContractRow, ExecutionPlan, FlipRow, RouteRow, RouteSegment, ScanResult, ScanResultHeader, StationRow};
pub use route_builder::{RouteBuilder, RouteOpportunity};
pub use station_trade::{StationTradeParams, StationTradeScanner, TypeBook};
