//! Rate-limited, conditionally-cached upstream REST client plus the memory
//! caches that sit in front of it (SPEC_FULL.md C3 + C4).

pub mod cache;
pub mod client;
pub mod error;
pub mod etag_cache;
pub mod models;
pub mod rate_limiter;
pub mod single_flight;

pub use client::{Auth, Cacheable, ClientConfig, UpstreamClient};
pub use error::ClientError;
pub use models::{ContractItem, ContractKind, HistoryBucket, Order, OrderRange, PublicContract, SessionToken};
