/// Parameters shared by every scanner (spec §4.1, "Common parameters").
#[derive(Debug, Clone)]
pub struct ScanParams {
    pub origin_system_id: u32,
    pub buy_radius_jumps: u32,
    pub sell_radius_jumps: u32,
    pub cargo_m3: f64,
    pub sales_tax_percent: f64,
    pub broker_fee_percent: f64,
    pub min_margin_percent: f64,
    pub min_profit: f64,
    pub min_daily_volume: f64,
    pub min_route_security: Option<f64>,
    pub require_history: bool,
    pub result_limit: usize,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            origin_system_id: 0,
            buy_radius_jumps: 5,
            sell_radius_jumps: 5,
            cargo_m3: 10_000.0,
            sales_tax_percent: 3.6,
            broker_fee_percent: 1.0,
            min_margin_percent: 5.0,
            min_profit: 0.0,
            min_daily_volume: 0.0,
            min_route_security: None,
            require_history: false,
            result_limit: 100,
        }
    }
}

/// Extra knobs for the public-contract scan (spec §4.1.3).
#[derive(Debug, Clone)]
pub struct ContractScanParams {
    pub min_contract_price: f64,
    pub max_contract_margin_percent: f64,
    pub min_priced_ratio: f64,
    pub instant_liquidation: bool,
    pub hold_days: f64,
    pub target_confidence_percent: f64,
    pub daily_carry_rate: f64,
}

impl Default for ContractScanParams {
    fn default() -> Self {
        Self {
            min_contract_price: 0.0,
            max_contract_margin_percent: 100.0,
            min_priced_ratio: 0.8,
            instant_liquidation: false,
            hold_days: 7.0,
            target_confidence_percent: 50.0,
            daily_carry_rate: 0.0,
        }
    }
}

/// Route builder parameters (spec §4.1.4).
#[derive(Debug, Clone)]
pub struct RouteParams {
    pub origin_system_id: u32,
    pub hops: u32,
    pub cargo_m3: f64,
    pub budget_isk: f64,
    pub sales_tax_percent: f64,
    pub broker_fee_percent: f64,
    pub beam_width: usize,
    pub min_route_security: Option<f64>,
}
