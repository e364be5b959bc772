use chrono::{DateTime, Utc};
use flipper_client::{ContractKind, Order, PublicContract};
use flipper_universe::StaticCatalog;

use crate::params::ContractScanParams;
use crate::progress::ProgressSink;
use crate::result::{ContractRow, ScanResultHeader};

/// Fraction of an item's daily volume assumed executable per day when
/// estimating full-liquidation time for the confidence model in spec
/// §4.1.3 step 8. Not specified upstream; chosen conservatively and
/// recorded as a design decision rather than derived from data.
const EXECUTABLE_THROUGHPUT_FRACTION: f64 = 0.25;

/// Per-item pricing context the orchestrator assembles from the book and
/// 30d history before calling in (keeps this module free of any network
/// or persistence dependency).
pub struct ItemContext<'a> {
    pub type_id: u32,
    pub quantity: u64,
    pub vwap_30d: Option<f64>,
    pub cheapest_ask: Option<f64>,
    pub daily_volume: Option<f64>,
    /// Buy-side book within the sell radius, only consulted in
    /// `instant_liquidation` mode.
    pub bid_book: &'a [Order],
}

pub struct ContractCandidate<'a> {
    pub contract: &'a PublicContract,
    pub items: Vec<ItemContext<'a>>,
}

struct ItemValuation {
    quantity: u64,
    unit_value: f64,
    daily_volume: Option<f64>,
    high_deviation: bool,
    low_volume: bool,
}

pub struct ContractScanner<'a> {
    catalog: &'a StaticCatalog,
}

impl<'a> ContractScanner<'a> {
    pub fn new(catalog: &'a StaticCatalog) -> Self {
        Self { catalog }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn scan(
        &self,
        contract_params: &ContractScanParams,
        sales_tax_percent: f64,
        broker_fee_percent: f64,
        min_margin_percent: f64,
        min_daily_volume_floor: f64,
        require_history: bool,
        candidates: &[ContractCandidate<'_>],
        now: DateTime<Utc>,
        result_limit: usize,
        progress: &ProgressSink,
    ) -> Vec<ContractRow> {
        progress.emit(format!("evaluating {} contracts", candidates.len()));

        let mut rows = Vec::new();
        for candidate in candidates {
            if let Some(row) = self.evaluate(
                contract_params,
                sales_tax_percent,
                broker_fee_percent,
                min_margin_percent,
                min_daily_volume_floor,
                require_history,
                candidate,
                now,
            ) {
                rows.push(row);
            }
        }

        rows.sort_by(|a, b| {
            let a_rank = if a.expected_profit != 0.0 { a.expected_profit } else { a.realized_profit };
            let b_rank = if b.expected_profit != 0.0 { b.expected_profit } else { b.realized_profit };
            b_rank.total_cmp(&a_rank).then(a.header.type_id.cmp(&b.header.type_id))
        });
        rows.truncate(result_limit);

        progress.emit(format!("found {} results", rows.len()));
        rows
    }

    #[allow(clippy::too_many_arguments)]
    fn evaluate(
        &self,
        contract_params: &ContractScanParams,
        sales_tax_percent: f64,
        broker_fee_percent: f64,
        min_margin_percent: f64,
        min_daily_volume_floor: f64,
        require_history: bool,
        candidate: &ContractCandidate<'_>,
        now: DateTime<Utc>,
    ) -> Option<ContractRow> {
        let contract = candidate.contract;
        if contract.kind != ContractKind::ItemExchange || contract.is_expired(now) {
            return None;
        }
        if contract.price < contract_params.min_contract_price {
            return None;
        }

        let non_blueprint_items: Vec<&ItemContext<'_>> = candidate
            .items
            .iter()
            .filter(|item| self.catalog.item(item.type_id).map(|t| !t.is_blueprint()).unwrap_or(true))
            .collect();
        if non_blueprint_items.is_empty() {
            return None;
        }

        let mut valuations = Vec::with_capacity(non_blueprint_items.len());
        let mut priced_count = 0usize;
        for item in &non_blueprint_items {
            let Some(valuation) = self.value_item(contract_params, require_history, min_daily_volume_floor, item) else {
                if contract_params.instant_liquidation {
                    // an item that cannot be fully absorbed kills an
                    // instant-liquidation contract outright (§4.1.3 step 5).
                    return None;
                }
                continue;
            };
            priced_count += 1;
            valuations.push(valuation);
        }

        let priced_ratio = priced_count as f64 / non_blueprint_items.len() as f64;
        if priced_ratio < contract_params.min_priced_ratio {
            return None;
        }

        let low_volume_count = valuations.iter().filter(|v| v.low_volume).count();
        if priced_count > 0 && low_volume_count as f64 / priced_count as f64 > 0.5 {
            return None;
        }
        let high_deviation_count = valuations.iter().filter(|v| v.high_deviation).count();
        if priced_count > 0 && high_deviation_count as f64 / priced_count as f64 > 0.3 {
            return None;
        }

        let estimated_value: f64 = valuations.iter().map(|v| v.unit_value * v.quantity as f64).sum();

        let tax = sales_tax_percent / 100.0;
        let broker = broker_fee_percent / 100.0;
        let revenue_multiplier = if contract_params.instant_liquidation { 1.0 - tax } else { 1.0 - tax - broker };
        let gross_revenue = estimated_value * revenue_multiplier;
        let realized_profit = gross_revenue - contract.price;
        let margin_percent = if contract.price > 0.0 { realized_profit / contract.price * 100.0 } else { 0.0 };

        if margin_percent > contract_params.max_contract_margin_percent {
            return None;
        }

        let confidence_percent = if contract_params.instant_liquidation {
            100.0
        } else {
            let confidence: f64 = valuations
                .iter()
                .map(|v| {
                    let Some(daily_volume) = v.daily_volume.filter(|d| *d > 0.0) else {
                        return 0.0;
                    };
                    let throughput = daily_volume * EXECUTABLE_THROUGHPUT_FRACTION;
                    let tau = v.quantity as f64 / throughput.max(1e-9);
                    1.0 - (-contract_params.hold_days / tau).exp()
                })
                .product();
            confidence * 100.0
        };

        if confidence_percent < contract_params.target_confidence_percent {
            return None;
        }

        let haircut = 0.95;
        let carry_cost = contract.price * contract_params.daily_carry_rate * contract_params.hold_days;
        let expected_profit = if contract_params.instant_liquidation {
            realized_profit
        } else {
            gross_revenue * haircut - contract.price - carry_cost
        };

        if expected_profit <= 0.0 || margin_percent < min_margin_percent {
            return None;
        }

        let type_id = non_blueprint_items[0].type_id;
        Some(ContractRow {
            header: ScanResultHeader {
                type_id,
                name: self.catalog.item_name(type_id).to_string(),
                total_profit: expected_profit,
                margin: margin_percent,
                jumps: 0,
            },
            contract_id: contract.id,
            contract_price: contract.price,
            estimated_value,
            expected_profit,
            realized_profit,
            confidence_percent,
            priced_ratio,
        })
    }

    fn value_item(
        &self,
        contract_params: &ContractScanParams,
        require_history: bool,
        min_daily_volume_floor: f64,
        item: &ItemContext<'_>,
    ) -> Option<ItemValuation> {
        if contract_params.instant_liquidation {
            let mut remaining = item.quantity;
            let mut proceeds = 0.0;
            let mut book: Vec<&Order> = item.bid_book.iter().collect();
            book.sort_by(|a, b| b.price.total_cmp(&a.price));
            for order in book {
                if remaining == 0 {
                    break;
                }
                let take = order.volume_remaining.min(remaining);
                proceeds += take as f64 * order.price;
                remaining -= take;
            }
            if remaining > 0 {
                return None;
            }
            return Some(ItemValuation {
                quantity: item.quantity,
                unit_value: proceeds / item.quantity.max(1) as f64,
                daily_volume: item.daily_volume,
                high_deviation: false,
                low_volume: false,
            });
        }

        let bait_threshold_factor = 0.5;
        let unit_value = match (item.vwap_30d, item.cheapest_ask) {
            (Some(vwap), Some(ask)) if ask >= bait_threshold_factor * vwap => Some((vwap.min(ask), false)),
            (Some(vwap), Some(ask)) => Some(((0.7 * vwap).min(2.0 * ask), true)),
            (None, _) if require_history => None,
            (None, Some(ask)) => Some((ask, false)),
            _ => None,
        };

        let (unit_value, high_deviation) = unit_value?;
        let low_volume = item.daily_volume.map(|v| v < min_daily_volume_floor).unwrap_or(true);
        let _ = contract_params;

        Some(ItemValuation {
            quantity: item.quantity,
            unit_value,
            daily_volume: item.daily_volume,
            high_deviation,
            low_volume,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use flipper_universe::ItemType;

    fn catalog() -> StaticCatalog {
        StaticCatalog::new(
            vec![ItemType { type_id: 34, name: "Tritanium".into(), volume_m3: 0.01, market_group_id: None }],
            vec![],
        )
    }

    fn contract(price: f64, expires_in_days: i64) -> PublicContract {
        PublicContract {
            id: 1,
            kind: ContractKind::ItemExchange,
            price,
            start_location_id: 60003760,
            volume_m3: 100.0,
            expires_at: Utc::now() + Duration::days(expires_in_days),
            items: None,
        }
    }

    #[test]
    fn underpriced_contract_with_healthy_vwap_yields_positive_profit() {
        let catalog = catalog();
        let scanner = ContractScanner::new(&catalog);
        let c = contract(1_000.0, 3);
        let items = vec![ItemContext { type_id: 34, quantity: 100, vwap_30d: Some(20.0), cheapest_ask: Some(19.0), daily_volume: Some(50_000.0), bid_book: &[] }];
        let candidates = vec![ContractCandidate { contract: &c, items }];

        let params = ContractScanParams { min_contract_price: 0.0, target_confidence_percent: 0.0, ..ContractScanParams::default() };
        let (sink, _rx) = ProgressSink::noop();
        let results = scanner.scan(&params, 3.6, 1.0, 0.0, 0.0, false, &candidates, Utc::now(), 10, &sink);

        assert_eq!(results.len(), 1);
        assert!(results[0].expected_profit > 0.0);
    }

    #[test]
    fn a_bait_ask_far_below_vwap_is_flagged_high_deviation_not_taken_at_face_value() {
        let catalog = catalog();
        let scanner = ContractScanner::new(&catalog);
        let c = contract(50.0, 3);
        // ask of 1.0 against a vwap of 20.0 is a bait order (< 50% of vwap).
        let items = vec![ItemContext { type_id: 34, quantity: 100, vwap_30d: Some(20.0), cheapest_ask: Some(1.0), daily_volume: Some(50_000.0), bid_book: &[] }];
        let candidates = vec![ContractCandidate { contract: &c, items }];

        let params = ContractScanParams { min_contract_price: 0.0, target_confidence_percent: 0.0, ..ContractScanParams::default() };
        let (sink, _rx) = ProgressSink::noop();
        let results = scanner.scan(&params, 3.6, 1.0, 0.0, 0.0, false, &candidates, Utc::now(), 10, &sink);

        // substituted valuation is min(0.7*20, 2*1) = 2.0/unit, not 20.0/unit.
        if let Some(row) = results.first() {
            assert!(row.estimated_value < 20.0 * 100.0);
        }
    }

    #[test]
    fn expired_contracts_are_rejected() {
        let catalog = catalog();
        let scanner = ContractScanner::new(&catalog);
        let c = contract(1_000.0, -1);
        let items = vec![ItemContext { type_id: 34, quantity: 10, vwap_30d: Some(200.0), cheapest_ask: Some(190.0), daily_volume: Some(1_000.0), bid_book: &[] }];
        let candidates = vec![ContractCandidate { contract: &c, items }];

        let (sink, _rx) = ProgressSink::noop();
        let results = scanner.scan(&ContractScanParams::default(), 3.6, 1.0, 0.0, 0.0, false, &candidates, Utc::now(), 10, &sink);
        assert!(results.is_empty());
    }

    #[test]
    fn instant_liquidation_rejects_a_contract_the_book_cannot_fully_absorb() {
        let catalog = catalog();
        let scanner = ContractScanner::new(&catalog);
        let c = contract(100.0, 3);
        let thin_bid = Order {
            type_id: 34,
            location_id: 1,
            system_id: 1,
            is_buy: true,
            price: 15.0,
            volume_remaining: 10,
            volume_total: 10,
            min_volume: 1,
            range: None,
            issued_at: Utc::now(),
        };
        let thin_bid_book = [thin_bid];
        let items = vec![ItemContext { type_id: 34, quantity: 1_000, vwap_30d: None, cheapest_ask: None, daily_volume: None, bid_book: &thin_bid_book }];
        let candidates = vec![ContractCandidate { contract: &c, items }];

        let params = ContractScanParams { instant_liquidation: true, ..ContractScanParams::default() };
        let (sink, _rx) = ProgressSink::noop();
        let results = scanner.scan(&params, 3.6, 1.0, 0.0, 0.0, false, &candidates, Utc::now(), 10, &sink);
        assert!(results.is_empty());
    }
}
