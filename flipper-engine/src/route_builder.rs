use flipper_universe::{SystemId, UniverseGraph};

use crate::params::RouteParams;
use crate::progress::ProgressSink;
use crate::result::{RouteRow, RouteSegment};

/// A single profitable type opportunity between two systems, evaluated the
/// same way as the radius flip scan (spec §4.1.4: "using the same
/// per-type evaluation as 4.1.1"). The orchestrator assembles these from
/// the region-wide book once per route-building call; this module only
/// searches over them.
pub struct RouteOpportunity {
    pub buy_system: SystemId,
    pub sell_system: SystemId,
    pub type_id: u32,
    pub profit_per_unit: f64,
    pub cargo_m3_per_unit: f64,
    pub max_units: i64,
    pub cost_per_unit: f64,
}

#[derive(Clone)]
struct BeamState {
    current_system: SystemId,
    remaining_cargo: f64,
    remaining_budget: f64,
    accumulated_profit: f64,
    accumulated_jumps: u32,
    segments: Vec<RouteSegment>,
}

impl BeamState {
    fn profit_per_jump(&self) -> f64 {
        self.accumulated_profit / self.accumulated_jumps.max(1) as f64
    }
}

pub struct RouteBuilder<'a> {
    graph: &'a UniverseGraph,
}

impl<'a> RouteBuilder<'a> {
    pub fn new(graph: &'a UniverseGraph) -> Self {
        Self { graph }
    }

    pub fn build(&self, params: &RouteParams, opportunities: &[RouteOpportunity], progress: &ProgressSink) -> Vec<RouteRow> {
        progress.emit("searching routes");

        let mut frontier = vec![BeamState {
            current_system: SystemId(params.origin_system_id),
            remaining_cargo: params.cargo_m3,
            remaining_budget: params.budget_isk,
            accumulated_profit: 0.0,
            accumulated_jumps: 0,
            segments: Vec::new(),
        }];

        for depth in 0..params.hops {
            let mut expanded = Vec::new();
            for state in &frontier {
                for opp in opportunities {
                    if let Some(next) = self.try_expand(params, state, opp) {
                        expanded.push(next);
                    }
                }
            }

            if expanded.is_empty() {
                break;
            }

            expanded.sort_by(|a, b| {
                b.profit_per_jump()
                    .total_cmp(&a.profit_per_jump())
                    .then(b.accumulated_profit.total_cmp(&a.accumulated_profit))
            });
            expanded.truncate(params.beam_width);
            frontier = expanded;

            progress.emit(format!("depth {} of {}: {} candidate routes", depth + 1, params.hops, frontier.len()));
        }

        let mut rows: Vec<RouteRow> = frontier
            .into_iter()
            .filter(|s| !s.segments.is_empty())
            .map(|s| RouteRow {
                total_profit: s.accumulated_profit,
                total_jumps: s.accumulated_jumps,
                profit_per_jump: s.profit_per_jump(),
                segments: s.segments,
            })
            .collect();

        rows.sort_by(|a, b| b.total_profit.total_cmp(&a.total_profit));

        progress.emit(format!("found {} results", rows.len()));
        rows
    }

    fn try_expand(&self, params: &RouteParams, state: &BeamState, opp: &RouteOpportunity) -> Option<BeamState> {
        let current = self.graph.system(state.current_system).ok()?;
        let buy_location = self.graph.system(opp.buy_system).ok()?;
        if current.region_id != buy_location.region_id {
            return None;
        }

        let jumps_to_buy = self.graph.shortest_path(state.current_system, opp.buy_system, params.min_route_security)?;
        let jumps_to_sell = self.graph.shortest_path(opp.buy_system, opp.sell_system, params.min_route_security)?;
        let jumps_delta = jumps_to_buy + jumps_to_sell;

        let units_by_cargo = if opp.cargo_m3_per_unit > 0.0 {
            (state.remaining_cargo / opp.cargo_m3_per_unit).floor() as i64
        } else {
            opp.max_units
        };
        let units_by_budget = if opp.cost_per_unit > 0.0 {
            (state.remaining_budget / opp.cost_per_unit).floor() as i64
        } else {
            opp.max_units
        };
        let units = units_by_cargo.min(units_by_budget).min(opp.max_units);
        if units <= 0 {
            return None;
        }

        let profit = opp.profit_per_unit * units as f64;
        if profit <= 0.0 {
            return None;
        }

        let mut segments = state.segments.clone();
        segments.push(RouteSegment {
            buy_system: opp.buy_system.0,
            sell_system: opp.sell_system.0,
            type_id: opp.type_id,
            profit,
            jumps: jumps_delta,
        });

        Some(BeamState {
            current_system: opp.sell_system,
            remaining_cargo: state.remaining_cargo - units as f64 * opp.cargo_m3_per_unit,
            remaining_budget: state.remaining_budget - units as f64 * opp.cost_per_unit,
            accumulated_profit: state.accumulated_profit + profit,
            accumulated_jumps: state.accumulated_jumps + jumps_delta,
            segments,
        })
    }
}
