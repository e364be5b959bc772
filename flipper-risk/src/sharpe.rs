use rust_decimal::{Decimal, MathematicalOps};

/// Risk-adjusted return over a fixed window of per-scan-cycle realized
/// returns (SPEC_FULL.md §4.6, grounded on
/// `jackbot::statistic::metric::sharpe::SharpeRatio::calculate` — the
/// period-scaling half of the teacher's generic `TimeInterval` type is
/// dropped since flipper reports one fixed reporting window rather than
/// comparing across annualized horizons).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SharpeRatio {
    pub value: Decimal,
}

impl SharpeRatio {
    pub fn calculate(risk_free_return: Decimal, mean_return: Decimal, std_dev_returns: Decimal) -> Self {
        if std_dev_returns.is_zero() {
            return Self { value: Decimal::MAX };
        }
        let excess_returns = mean_return - risk_free_return;
        Self {
            value: excess_returns.checked_div(std_dev_returns).unwrap_or(Decimal::MAX),
        }
    }

    /// Compute mean and (population) standard deviation of `returns`
    /// internally before applying [`Self::calculate`].
    pub fn from_returns(risk_free_return: Decimal, returns: &[Decimal]) -> Option<Self> {
        if returns.is_empty() {
            return None;
        }
        let n = Decimal::from(returns.len());
        let mean = returns.iter().copied().sum::<Decimal>() / n;
        let variance = returns
            .iter()
            .map(|r| (*r - mean) * (*r - mean))
            .sum::<Decimal>()
            / n;
        let std_dev = variance.sqrt().unwrap_or(Decimal::ZERO);
        Some(Self::calculate(risk_free_return, mean, std_dev))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn zero_std_dev_yields_max_value() {
        let result = SharpeRatio::calculate(dec!(0.001), dec!(0.002), Decimal::ZERO);
        assert_eq!(result.value, Decimal::MAX);
    }

    #[test]
    fn calculate_divides_excess_return_by_std_dev() {
        let result = SharpeRatio::calculate(dec!(0.0015), dec!(0.0025), dec!(0.02));
        assert_eq!(result.value, dec!(0.05));
    }

    #[test]
    fn from_returns_computes_mean_and_std_dev_first() {
        let returns = vec![dec!(0.01), dec!(0.02), dec!(0.03)];
        let result = SharpeRatio::from_returns(Decimal::ZERO, &returns).unwrap();
        assert!(result.value > Decimal::ZERO);
    }

    #[test]
    fn from_returns_is_none_for_empty_samples() {
        assert!(SharpeRatio::from_returns(Decimal::ZERO, &[]).is_none());
    }
}
