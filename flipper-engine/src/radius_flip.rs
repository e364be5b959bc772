use std::collections::HashMap;

use flipper_client::Order;
use flipper_universe::{StaticCatalog, SystemId, UniverseGraph};

use crate::fees;
use crate::params::ScanParams;
use crate::progress::ProgressSink;
use crate::result::{FlipRow, ScanResultHeader};

/// Geographic flip scan (spec §4.1.1). Fetching orders is the
/// orchestrator's job (through `flipper-client`, region by region); this
/// module is the pure evaluation core so the profit/ranking/filter
/// properties in §8 are directly testable without any network layer.
pub struct RadiusFlipScanner<'a> {
    graph: &'a UniverseGraph,
    catalog: &'a StaticCatalog,
}

impl<'a> RadiusFlipScanner<'a> {
    pub fn new(graph: &'a UniverseGraph, catalog: &'a StaticCatalog) -> Self {
        Self { graph, catalog }
    }

    /// `orders` is every order already fetched for the relevant regions.
    /// `daily_volume(type_id, region_id)` looks up cached demand
    /// (`flipper-storage::DemandRegion`) for the §4.1.1 volume filter;
    /// returning `None` skips the filter for that type (treated as
    /// unknown rather than zero, matching §7's `NotFound` → "no data"
    /// downgrade).
    pub fn scan(
        &self,
        params: &ScanParams,
        orders: &[Order],
        daily_volume: impl Fn(u32, u32) -> Option<f64>,
        progress: &ProgressSink,
    ) -> Vec<FlipRow> {
        progress.emit("finding systems");
        let buy_candidates = self.graph.systems_within(
            SystemId(params.origin_system_id),
            params.buy_radius_jumps,
            params.min_route_security,
        );
        let sell_candidates = self.graph.systems_within(
            SystemId(params.origin_system_id),
            params.sell_radius_jumps,
            params.min_route_security,
        );

        let buy_systems: HashMap<u32, u32> = buy_candidates.iter().map(|w| (w.system_id.0, w.jumps)).collect();
        let sell_system_ids: Vec<SystemId> = sell_candidates.iter().map(|w| w.system_id).collect();

        progress.emit(format!(
            "fetched orders for {} candidate systems",
            buy_systems.len() + sell_system_ids.len()
        ));

        let mut sells_by_type: HashMap<u32, Vec<&Order>> = HashMap::new();
        let mut buys_by_type: HashMap<u32, Vec<&Order>> = HashMap::new();
        for order in orders {
            if !order.is_valid() {
                continue;
            }
            if order.is_buy {
                buys_by_type.entry(order.type_id).or_default().push(order);
            } else if buy_systems.contains_key(&order.system_id) {
                sells_by_type.entry(order.type_id).or_default().push(order);
            }
        }

        let mut rows = Vec::new();
        for (type_id, sells) in &sells_by_type {
            let Some(buys) = buys_by_type.get(type_id) else {
                continue;
            };

            let mut sorted_sells: Vec<&Order> = sells.iter().copied().collect();
            sorted_sells.sort_by(|a, b| a.price.total_cmp(&b.price));
            let Some(best_sell) = sorted_sells.first() else {
                continue;
            };
            let ask = best_sell.price;
            let buy_system = SystemId(best_sell.system_id);

            let compatible_buys: Vec<&&Order> = buys
                .iter()
                .filter(|o| {
                    sell_system_ids.iter().any(|&candidate| {
                        fees::order_range_reaches(self.graph, SystemId(o.system_id), candidate, o.range)
                    })
                })
                .collect();
            let Some(best_buy) = compatible_buys.iter().max_by(|a, b| a.price.total_cmp(&b.price)) else {
                continue;
            };
            let bid = best_buy.price;
            let sell_system = SystemId(best_buy.system_id);

            let max_units_by_cargo = self
                .catalog
                .item(*type_id)
                .filter(|item| item.volume_m3 > 0.0)
                .map(|item| (params.cargo_m3 / item.volume_m3).floor() as u64)
                .unwrap_or(u64::MAX);

            // Absorb price levels cheapest-first, the way `contract_scan.rs`'s
            // `value_item` walks a bid book, stopping as soon as a level no
            // longer clears the bid after fees (spec §4.1.1 step 4).
            let mut remaining = max_units_by_cargo.min(best_buy.volume_remaining);
            let mut units = 0u64;
            let mut total = 0.0f64;
            for level in &sorted_sells {
                if remaining == 0 {
                    break;
                }
                let level_profit_per_unit =
                    fees::profit_per_unit(level.price, bid, params.sales_tax_percent, params.broker_fee_percent);
                if level_profit_per_unit <= 0.0 {
                    break;
                }
                let take = level.volume_remaining.min(remaining);
                units += take;
                total += level_profit_per_unit * take as f64;
                remaining -= take;
            }
            let units = units as i64;
            if units <= 0 {
                continue;
            }

            let profit_per_unit = total / units as f64;
            let margin = fees::margin(ask, bid, params.sales_tax_percent, params.broker_fee_percent) * 100.0;

            if margin < params.min_margin_percent || total < params.min_profit {
                continue;
            }

            if params.min_daily_volume > 0.0 {
                if let Ok(system) = self.graph.system(buy_system) {
                    if let Some(volume) = daily_volume(*type_id, system.region_id.0) {
                        if volume < params.min_daily_volume {
                            continue;
                        }
                    }
                }
            }

            let buy_hop = *buy_systems.get(&buy_system.0).unwrap_or(&0);
            let sell_hop = self
                .graph
                .shortest_path(buy_system, sell_system, params.min_route_security)
                .unwrap_or(0);
            let total_jumps = buy_hop + sell_hop;

            rows.push(FlipRow {
                header: ScanResultHeader {
                    type_id: *type_id,
                    name: self.catalog.item_name(*type_id).to_string(),
                    total_profit: total,
                    margin,
                    jumps: total_jumps,
                },
                buy_system: buy_system.0,
                sell_system: sell_system.0,
                units,
                ask,
                bid,
                profit_per_unit,
            });
        }

        rows.sort_by(|a, b| {
            b.header
                .total_profit
                .total_cmp(&a.header.total_profit)
                .then(b.header.margin.total_cmp(&a.header.margin))
                .then(a.header.jumps.cmp(&b.header.jumps))
                .then(a.header.type_id.cmp(&b.header.type_id))
        });
        rows.truncate(params.result_limit);

        progress.emit(format!("found {} results", rows.len()));
        rows
    }
}
