use std::collections::{HashMap, VecDeque};

use derive_more::Constructor;
use rust_decimal::Decimal;

use flipper_storage::Fill;

/// A lot of units bought at a given price, waiting to be matched against a
/// later sell (SPEC_FULL.md §4.6, grounded on the position-keeping style in
/// `jackbot-risk`'s `PositionTracker`, adapted from net-position tracking
/// to queue-based FIFO realization).
#[derive(Debug, Clone, Copy, Constructor)]
struct OpenLot {
    price: Decimal,
    quantity: i64,
}

/// One closed trade: a sell matched against one or more FIFO buy lots.
#[derive(Debug, Clone, PartialEq)]
pub struct RealizedTrade {
    pub type_id: u32,
    pub quantity: i64,
    pub cost_basis: Decimal,
    pub proceeds: Decimal,
    pub realized_pnl: Decimal,
}

/// Consumes a character's fill stream in chronological order and emits one
/// [`RealizedTrade`] per sell, matching the earliest-bought open units
/// first. Buys that are never sold remain as open inventory and never
/// appear in the realized trade list — this module only reports closed
/// P&L, never unrealized.
#[derive(Debug, Default)]
pub struct FifoMatcher {
    open_lots: HashMap<u32, VecDeque<OpenLot>>,
}

impl FifoMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay a character's fills (already ordered oldest-first) and
    /// return every realized trade produced along the way.
    pub fn replay(fills: &[Fill]) -> Vec<RealizedTrade> {
        let mut matcher = Self::new();
        let mut realized = Vec::new();
        for fill in fills {
            realized.extend(matcher.apply(fill));
        }
        realized
    }

    pub fn apply(&mut self, fill: &Fill) -> Vec<RealizedTrade> {
        let price = Decimal::try_from(fill.price).unwrap_or_default();

        if fill.is_buy {
            self.open_lots
                .entry(fill.type_id)
                .or_default()
                .push_back(OpenLot::new(price, fill.quantity));
            return Vec::new();
        }

        let lots = self.open_lots.entry(fill.type_id).or_default();
        let mut remaining = fill.quantity;
        let mut cost_basis = Decimal::ZERO;
        let mut matched = 0i64;

        while remaining > 0 {
            let Some(front) = lots.front_mut() else {
                break;
            };
            let take = remaining.min(front.quantity);
            cost_basis += front.price * Decimal::from(take);
            front.quantity -= take;
            remaining -= take;
            matched += take;
            if front.quantity == 0 {
                lots.pop_front();
            }
        }

        if matched == 0 {
            return Vec::new();
        }

        let proceeds = price * Decimal::from(matched);
        vec![RealizedTrade {
            type_id: fill.type_id,
            quantity: matched,
            cost_basis,
            proceeds,
            realized_pnl: proceeds - cost_basis,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fill(type_id: u32, is_buy: bool, price: f64, quantity: i64) -> Fill {
        Fill {
            id: 0,
            character_id: 1,
            type_id,
            is_buy,
            price,
            quantity,
            filled_at: Utc::now(),
        }
    }

    #[test]
    fn sell_fully_covered_by_one_buy_lot_realizes_full_quantity() {
        let fills = vec![fill(34, true, 5.0, 1000), fill(34, false, 6.0, 400)];
        let realized = FifoMatcher::replay(&fills);
        assert_eq!(realized.len(), 1);
        assert_eq!(realized[0].quantity, 400);
        assert_eq!(realized[0].cost_basis, Decimal::try_from(2000.0).unwrap());
        assert_eq!(realized[0].proceeds, Decimal::try_from(2400.0).unwrap());
        assert_eq!(realized[0].realized_pnl, Decimal::try_from(400.0).unwrap());
    }

    #[test]
    fn sell_spanning_two_buy_lots_uses_earliest_price_first() {
        let fills = vec![
            fill(34, true, 5.0, 100),
            fill(34, true, 7.0, 100),
            fill(34, false, 8.0, 150),
        ];
        let realized = FifoMatcher::replay(&fills);
        assert_eq!(realized.len(), 1);
        // 100 units @ 5.0 + 50 units @ 7.0 = 500 + 350 = 850
        assert_eq!(realized[0].cost_basis, Decimal::try_from(850.0).unwrap());
        assert_eq!(realized[0].proceeds, Decimal::try_from(1200.0).unwrap());
    }

    #[test]
    fn selling_more_than_is_held_only_realizes_the_covered_portion() {
        let fills = vec![fill(34, true, 5.0, 100), fill(34, false, 6.0, 500)];
        let realized = FifoMatcher::replay(&fills);
        assert_eq!(realized.len(), 1);
        assert_eq!(realized[0].quantity, 100);
    }

    #[test]
    fn selling_with_no_open_lots_realizes_nothing() {
        let fills = vec![fill(34, false, 6.0, 100)];
        let realized = FifoMatcher::replay(&fills);
        assert!(realized.is_empty());
    }
}
