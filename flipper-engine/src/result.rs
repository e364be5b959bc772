use serde::{Deserialize, Serialize};

/// Common header shared by every scanner's rows (§9, "Dynamic dispatch
/// over result shapes"). Persistence picks the result table by `kind`,
/// so this header never itself gets persisted — it is the in-memory
/// summarization/ranking shape the orchestrator and alert pipeline
/// consume before mapping each variant's body to its storage row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResultHeader {
    pub type_id: u32,
    pub name: String,
    pub total_profit: f64,
    pub margin: f64,
    pub jumps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlipRow {
    pub header: ScanResultHeader,
    pub buy_system: u32,
    pub sell_system: u32,
    pub units: i64,
    pub ask: f64,
    pub bid: f64,
    pub profit_per_unit: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub can_fill: bool,
    pub expected_filled_qty: i64,
    pub expected_buy_price: f64,
    pub expected_sell_price: f64,
    pub worst_case_slippage_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationRow {
    pub header: ScanResultHeader,
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
    pub execution_plan: ExecutionPlan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractRow {
    pub header: ScanResultHeader,
    pub contract_id: u64,
    pub contract_price: f64,
    pub estimated_value: f64,
    pub expected_profit: f64,
    pub realized_profit: f64,
    pub confidence_percent: f64,
    pub priced_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSegment {
    pub buy_system: u32,
    pub sell_system: u32,
    pub type_id: u32,
    pub profit: f64,
    pub jumps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRow {
    pub segments: Vec<RouteSegment>,
    pub total_profit: f64,
    pub total_jumps: u32,
    pub profit_per_jump: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanResult {
    RadiusFlip(Vec<FlipRow>),
    StationTrade(Vec<StationRow>),
    Contract(Vec<ContractRow>),
    Route(Vec<RouteRow>),
}
