pub mod alert_history;
pub mod config;
pub mod demand_regions;
pub mod fills;
pub mod results;
pub mod scan_history;
pub mod watchlist;

pub use alert_history::AlertHistoryDao;
pub use config::ConfigDao;
pub use demand_regions::DemandRegionDao;
pub use fills::FillsDao;
pub use results::ResultsDao;
pub use scan_history::ScanHistoryDao;
pub use watchlist::WatchlistDao;
