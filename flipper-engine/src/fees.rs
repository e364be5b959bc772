use flipper_client::OrderRange;
use flipper_universe::{SystemId, UniverseGraph};

/// Whether a buy order's declared reach covers `target_system`, given the
/// order sits in `order_system` (spec §9 Open Questions: "the precise
/// compatibility table ... is an external contract ... should be
/// re-verified at implementation time"). Resolved here as: `Station`
/// requires the order's own system; `Jumps(n)` requires a path of at most
/// `n` jumps with no security floor (range is a logistics limit, not a
/// safety one); `Region` requires the same region.
pub fn order_range_reaches(
    graph: &UniverseGraph,
    order_system: SystemId,
    target_system: SystemId,
    range: Option<OrderRange>,
) -> bool {
    match range {
        None | Some(OrderRange::Station) => order_system == target_system,
        Some(OrderRange::Jumps(n)) => graph
            .shortest_path(order_system, target_system, None)
            .is_some_and(|d| d <= n as u32),
        Some(OrderRange::Region) => {
            match (graph.system(order_system), graph.system(target_system)) {
                (Ok(a), Ok(b)) => a.region_id == b.region_id,
                _ => false,
            }
        }
    }
}

/// Shared profit math so the identity in the specification's Testable
/// Property 2 holds structurally rather than by convention: every
/// scanner computes profit through this module, never inline.
///
/// `total_profit = (sell·(1 − tax) − buy·(1 + broker)) × units`.
pub fn profit_per_unit(ask: f64, bid: f64, sales_tax_percent: f64, broker_fee_percent: f64) -> f64 {
    let tax = sales_tax_percent / 100.0;
    let broker = broker_fee_percent / 100.0;
    bid * (1.0 - tax) - ask * (1.0 + broker)
}

pub fn total_profit(ask: f64, bid: f64, units: i64, sales_tax_percent: f64, broker_fee_percent: f64) -> f64 {
    profit_per_unit(ask, bid, sales_tax_percent, broker_fee_percent) * units as f64
}

/// Margin is profit-per-unit relative to the cost of acquiring it.
pub fn margin(ask: f64, bid: f64, sales_tax_percent: f64, broker_fee_percent: f64) -> f64 {
    if ask <= 0.0 {
        return 0.0;
    }
    profit_per_unit(ask, bid, sales_tax_percent, broker_fee_percent) / ask
}

#[cfg(test)]
mod tests {
    use super::*;
    use flipper_universe::{RegionId, SecurityRating, SolarSystem};

    fn two_system_graph() -> UniverseGraph {
        let systems = vec![
            SolarSystem { id: SystemId(1), name: "A".into(), region_id: RegionId(10), security: SecurityRating(1.0) },
            SolarSystem { id: SystemId(2), name: "B".into(), region_id: RegionId(10), security: SecurityRating(1.0) },
            SolarSystem { id: SystemId(3), name: "C".into(), region_id: RegionId(20), security: SecurityRating(1.0) },
        ];
        UniverseGraph::new(systems, &[(SystemId(1), SystemId(2))])
    }

    #[test]
    fn station_range_only_reaches_its_own_system() {
        let graph = two_system_graph();
        assert!(order_range_reaches(&graph, SystemId(1), SystemId(1), Some(OrderRange::Station)));
        assert!(!order_range_reaches(&graph, SystemId(1), SystemId(2), Some(OrderRange::Station)));
    }

    #[test]
    fn jumps_range_reaches_within_the_declared_hop_count() {
        let graph = two_system_graph();
        assert!(order_range_reaches(&graph, SystemId(1), SystemId(2), Some(OrderRange::Jumps(1))));
        assert!(!order_range_reaches(&graph, SystemId(1), SystemId(3), Some(OrderRange::Jumps(1))));
    }

    #[test]
    fn region_range_reaches_any_system_in_the_same_region() {
        let graph = two_system_graph();
        assert!(order_range_reaches(&graph, SystemId(1), SystemId(2), Some(OrderRange::Region)));
        assert!(!order_range_reaches(&graph, SystemId(1), SystemId(3), Some(OrderRange::Region)));
    }

    #[test]
    fn profit_identity_matches_the_radius_flip_trivial_seed_scenario() {
        // ask 100, bid 130, 10 units, tax 3.6%, broker 1%.
        let result = total_profit(100.0, 130.0, 10, 3.6, 1.0);
        assert!((result - 243.2).abs() < 1e-9);
    }

    #[test]
    fn margin_is_zero_when_ask_is_non_positive() {
        assert_eq!(margin(0.0, 100.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn margin_matches_profit_per_unit_divided_by_ask() {
        let ppu = profit_per_unit(100.0, 130.0, 3.6, 1.0);
        let m = margin(100.0, 130.0, 3.6, 1.0);
        assert!((m - ppu / 100.0).abs() < 1e-12);
    }
}
