use rust_decimal::Decimal;

use crate::error::RiskError;

/// Historical-simulation Value at Risk: sort observed P&L samples and read
/// off the loss at the `(1 - confidence)` percentile (SPEC_FULL.md §4.6).
/// No distributional assumption is made — the sample history itself is the
/// model, matching how `jackbot-risk` favors empirical trackers over
/// parametric ones elsewhere in the crate.
pub fn historical_var(pnl_samples: &[Decimal], confidence: Decimal) -> Result<Decimal, RiskError> {
    if pnl_samples.is_empty() {
        return Err(RiskError::EmptySampleSet);
    }
    let mut sorted = pnl_samples.to_vec();
    sorted.sort();

    let tail_fraction = Decimal::ONE - confidence;
    let cutoff = tail_count(sorted.len(), tail_fraction);
    Ok(-sorted[cutoff - 1])
}

/// Expected Shortfall: the average loss across the samples at or beyond
/// the VaR cutoff. Always at least as large as VaR, since it averages the
/// worst tail rather than reading a single point off it.
pub fn historical_es(pnl_samples: &[Decimal], confidence: Decimal) -> Result<Decimal, RiskError> {
    if pnl_samples.is_empty() {
        return Err(RiskError::EmptySampleSet);
    }
    let mut sorted = pnl_samples.to_vec();
    sorted.sort();

    let tail_fraction = Decimal::ONE - confidence;
    let cutoff = tail_count(sorted.len(), tail_fraction);
    let tail = &sorted[..cutoff];
    let sum: Decimal = tail.iter().copied().sum();
    Ok(-(sum / Decimal::from(tail.len())))
}

/// Number of worst samples making up the `tail_fraction` of the
/// population, at least 1 and at most `len`.
fn tail_count(len: usize, tail_fraction: Decimal) -> usize {
    let raw = (tail_fraction * Decimal::from(len))
        .ceil()
        .to_string()
        .parse::<usize>()
        .unwrap_or(1);
    raw.clamp(1, len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn samples() -> Vec<Decimal> {
        vec![
            dec!(-500), dec!(-200), dec!(-100), dec!(0), dec!(50),
            dec!(100), dec!(150), dec!(200), dec!(300), dec!(400),
        ]
    }

    #[test]
    fn var_at_90_percent_confidence_reads_the_tenth_percentile_loss() {
        let result = historical_var(&samples(), dec!(0.9)).unwrap();
        assert_eq!(result, dec!(500));
    }

    #[test]
    fn es_is_never_smaller_than_var_at_the_same_confidence() {
        let var = historical_var(&samples(), dec!(0.8)).unwrap();
        let es = historical_es(&samples(), dec!(0.8)).unwrap();
        assert!(es >= var);
    }

    #[test]
    fn empty_sample_set_is_an_error() {
        assert!(historical_var(&[], dec!(0.95)).is_err());
        assert!(historical_es(&[], dec!(0.95)).is_err());
    }
}
