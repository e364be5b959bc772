use std::collections::HashMap;

use rust_decimal::Decimal;

/// Tracks each character's cumulative realized P&L and the peak it has
/// reached, so the current drawdown percentage can be read at any point
/// (SPEC_FULL.md §4.6, grounded on `jackbot-risk::drawdown::DrawdownTracker`
/// — generalized from per-instrument keys to per-character).
#[derive(Debug, Default, Clone)]
pub struct DrawdownTracker {
    peak: HashMap<u64, Decimal>,
    current: HashMap<u64, Decimal>,
}

impl DrawdownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pnl(&mut self, character_id: u64, realized_pnl: Decimal) {
        let cur = self.current.entry(character_id).or_insert(Decimal::ZERO);
        *cur += realized_pnl;
        let peak = self.peak.entry(character_id).or_insert(*cur);
        if *cur > *peak {
            *peak = *cur;
        }
    }

    /// Fraction of the peak cumulative P&L currently given back, in
    /// `[0, 1]`. Zero until the character's cumulative P&L has gone
    /// positive at least once, since drawdown is only meaningful relative
    /// to a peak.
    pub fn drawdown(&self, character_id: u64) -> Decimal {
        let cur = *self.current.get(&character_id).unwrap_or(&Decimal::ZERO);
        let peak = *self.peak.get(&character_id).unwrap_or(&cur);
        if peak <= Decimal::ZERO {
            Decimal::ZERO
        } else {
            ((peak - cur) / peak).max(Decimal::ZERO)
        }
    }

    pub fn peak(&self, character_id: u64) -> Decimal {
        *self.peak.get(&character_id).unwrap_or(&Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn drawdown_is_zero_while_pnl_only_climbs() {
        let mut tracker = DrawdownTracker::new();
        tracker.record_pnl(1, dec!(100));
        tracker.record_pnl(1, dec!(50));
        assert_eq!(tracker.drawdown(1), Decimal::ZERO);
    }

    #[test]
    fn drawdown_reflects_pullback_from_peak() {
        let mut tracker = DrawdownTracker::new();
        tracker.record_pnl(1, dec!(200));
        tracker.record_pnl(1, dec!(-100));
        assert_eq!(tracker.drawdown(1), dec!(0.5));
    }

    #[test]
    fn unknown_character_has_zero_drawdown() {
        let tracker = DrawdownTracker::new();
        assert_eq!(tracker.drawdown(42), Decimal::ZERO);
    }

    #[test]
    fn drawdown_never_goes_negative_on_a_new_peak_after_recovery() {
        let mut tracker = DrawdownTracker::new();
        tracker.record_pnl(1, dec!(100));
        tracker.record_pnl(1, dec!(-50));
        tracker.record_pnl(1, dec!(200));
        assert_eq!(tracker.drawdown(1), Decimal::ZERO);
        assert_eq!(tracker.peak(1), dec!(250));
    }
}
