use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Buy-order reach, as reported by the upstream API. The precise
/// station/jump-range/region compatibility table is an external contract —
/// see SPEC_FULL.md §9 Open Questions — and is applied in
/// `flipper-engine::fees::range_reaches`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderRange {
    Station,
    Jumps(u8),
    Region,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Order {
    pub type_id: u32,
    pub location_id: u64,
    pub system_id: u32,
    pub is_buy: bool,
    pub price: f64,
    pub volume_remaining: u64,
    pub volume_total: u64,
    pub min_volume: u64,
    /// `None` for sell orders, which SPEC_FULL.md §3 notes "do not" carry a
    /// range.
    pub range: Option<OrderRange>,
    pub issued_at: DateTime<Utc>,
}

impl Order {
    pub fn is_valid(&self) -> bool {
        self.price > 0.0 && self.volume_remaining <= self.volume_total
    }
}

/// Per-(region, type) daily aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct HistoryBucket {
    pub date: chrono::NaiveDate,
    pub average: f64,
    pub highest: f64,
    pub lowest: f64,
    pub volume: u64,
    pub order_count: u64,
}

impl HistoryBucket {
    pub fn is_valid(&self) -> bool {
        self.lowest <= self.average && self.average <= self.highest
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    ItemExchange,
    Auction,
    Courier,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PublicContract {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: ContractKind,
    pub price: f64,
    pub start_location_id: u64,
    pub volume_m3: f64,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ContractItem>>,
}

impl PublicContract {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ContractItem {
    pub type_id: u32,
    pub quantity: u64,
    pub is_included: bool,
}

/// Upstream access/refresh token pair, the only output of the OAuth2 flow
/// that enters the core (SPEC_FULL.md §1).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionToken {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Envelope for a paginated upstream response, reconstructed by the client
/// from the `X-Pages` header (SPEC_FULL.md §4.2, "Pagination").
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_pages: u32,
}
