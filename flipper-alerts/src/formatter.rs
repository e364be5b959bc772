use flipper_storage::AlertMetric;

/// Render a human-readable alert line. Kept as one free function rather
/// than a trait since there is exactly one message shape across all
/// channels — the channels differ only in transport, never in content
/// (SPEC_FULL.md §4.5).
pub fn format_alert(type_name: &str, metric: AlertMetric, threshold: f64, current_value: f64) -> String {
    let (metric_label, unit) = match metric {
        AlertMetric::MarginPercent => ("margin", "%"),
        AlertMetric::TotalProfit => ("total profit", " ISK"),
        AlertMetric::ProfitPerUnit => ("profit per unit", " ISK"),
        AlertMetric::DailyVolume => ("daily volume", " units"),
    };

    format!(
        "{type_name}: {metric_label} {current_value:.2}{unit} crossed threshold {threshold:.2}{unit}"
    )
}
