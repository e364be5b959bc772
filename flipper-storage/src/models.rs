use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted singleton configuration. `load` returns `Config::default()` on
/// miss (SPEC_FULL.md §4.3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub client_user_agent: String,
    pub rate_per_sec: f64,
    pub burst: f64,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub alert_cooldown_seconds: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_user_agent: "flipper/0.1".to_string(),
            rate_per_sec: 20.0,
            burst: 40.0,
            access_token: None,
            refresh_token: None,
            token_expires_at: None,
            alert_cooldown_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertMetric {
    MarginPercent,
    TotalProfit,
    ProfitPerUnit,
    DailyVolume,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistItem {
    pub type_id: u32,
    pub added_at: DateTime<Utc>,
    pub alert_enabled: bool,
    pub alert_metric: Option<AlertMetric>,
    pub alert_threshold: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertHistoryRow {
    pub id: i64,
    pub type_id: u32,
    pub metric: AlertMetric,
    pub threshold: f64,
    pub current_value: f64,
    pub message: String,
    pub channels_sent: Vec<String>,
    pub channels_failed: HashMap<String, String>,
    pub sent_at: DateTime<Utc>,
    pub scan_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanKind {
    RadiusFlip,
    StationTrade,
    Contract,
    Route,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: i64,
    pub kind: ScanKind,
    pub origin_system: u32,
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub count: i64,
    pub top_profit: f64,
    pub total_profit: f64,
    pub parameter_snapshot: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlipResultRow {
    pub scan_id: i64,
    pub type_id: u32,
    pub type_name: String,
    pub buy_system: u32,
    pub sell_system: u32,
    pub units: i64,
    pub ask: f64,
    pub bid: f64,
    pub profit_per_unit: f64,
    pub total_profit: f64,
    pub margin: f64,
    pub total_jumps: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationResultRow {
    pub scan_id: i64,
    pub type_id: u32,
    pub type_name: String,
    pub best_bid: f64,
    pub best_ask: f64,
    pub margin_percent: f64,
    pub vwap_30d: f64,
    pub volatility_index: f64,
    pub depth_score: f64,
    pub days_of_supply: f64,
    pub buy_sell_ratio: f64,
    pub scam_score: f64,
    pub period_roi: f64,
    pub composite_score: f64,
    pub execution_plan: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractResultRow {
    pub scan_id: i64,
    pub contract_id: u64,
    pub contract_price: f64,
    pub estimated_value: f64,
    pub expected_profit: f64,
    pub realized_profit: f64,
    pub margin: f64,
    pub confidence_percent: f64,
    pub priced_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResultRow {
    pub scan_id: i64,
    pub segments: serde_json::Value,
    pub total_profit: f64,
    pub total_jumps: i64,
    pub profit_per_jump: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandRegion {
    pub region_id: u32,
    pub data: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub character_id: u64,
    pub name: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub id: i64,
    pub character_id: u64,
    pub type_id: u32,
    pub is_buy: bool,
    pub price: f64,
    pub quantity: i64,
    pub filled_at: DateTime<Utc>,
}
