use flipper_client::{HistoryBucket, Order};
use flipper_universe::StaticCatalog;

use crate::fees;
use crate::progress::ProgressSink;
use crate::result::{ExecutionPlan, ScanResultHeader, StationRow};

/// Same-station scan parameters (spec §4.1.2).
#[derive(Debug, Clone)]
pub struct StationTradeParams {
    pub station_system_id: u32,
    pub cargo_m3: f64,
    pub sales_tax_percent: f64,
    pub broker_fee_percent: f64,
    pub min_period_roi_percent: f64,
    pub max_volatility_percent: f64,
    pub min_buy_sell_ratio: f64,
    pub max_scam_score: f64,
    pub result_limit: usize,
}

impl Default for StationTradeParams {
    fn default() -> Self {
        Self {
            station_system_id: 0,
            cargo_m3: 10_000.0,
            sales_tax_percent: 3.6,
            broker_fee_percent: 1.0,
            min_period_roi_percent: 0.0,
            max_volatility_percent: 100.0,
            min_buy_sell_ratio: 0.0,
            max_scam_score: 100.0,
            result_limit: 100,
        }
    }
}

/// Everything the scanner needs for a single traded type at the station
/// (orchestrator pulls the book and the 30d history and buckets both by
/// `type_id` before calling in).
pub struct TypeBook<'a> {
    pub type_id: u32,
    pub buy_orders: &'a [Order],
    pub sell_orders: &'a [Order],
    /// Ascending by date, oldest first, at most 30 entries.
    pub history_30d: &'a [HistoryBucket],
}

pub struct StationTradeScanner<'a> {
    catalog: &'a StaticCatalog,
}

impl<'a> StationTradeScanner<'a> {
    pub fn new(catalog: &'a StaticCatalog) -> Self {
        Self { catalog }
    }

    pub fn scan(&self, params: &StationTradeParams, books: &[TypeBook<'_>], progress: &ProgressSink) -> Vec<StationRow> {
        progress.emit("evaluating book");

        let mut rows = Vec::new();
        for book in books {
            if let Some(row) = self.evaluate_type(params, book) {
                rows.push(row);
            }
        }

        rows.sort_by(|a, b| {
            b.composite_score
                .total_cmp(&a.composite_score)
                .then(b.header.total_profit.total_cmp(&a.header.total_profit))
                .then(a.header.type_id.cmp(&b.header.type_id))
        });
        rows.truncate(params.result_limit);

        progress.emit(format!("found {} results", rows.len()));
        rows
    }

    fn evaluate_type(&self, params: &StationTradeParams, book: &TypeBook<'_>) -> Option<StationRow> {
        let best_bid = book.buy_orders.iter().map(|o| o.price).fold(0.0_f64, f64::max);
        let best_ask = book
            .sell_orders
            .iter()
            .map(|o| o.price)
            .fold(f64::INFINITY, f64::min);
        if best_bid <= 0.0 || !best_ask.is_finite() {
            return None;
        }

        let margin_percent = fees::margin(best_ask, best_bid, params.sales_tax_percent, params.broker_fee_percent) * 100.0;

        let total_history_volume: f64 = book.history_30d.iter().map(|b| b.volume as f64).sum();
        let vwap_30d = if total_history_volume > 0.0 {
            book.history_30d
                .iter()
                .map(|b| b.average * b.volume as f64)
                .sum::<f64>()
                / total_history_volume
        } else {
            book.history_30d.iter().map(|b| b.average).sum::<f64>() / book.history_30d.len().max(1) as f64
        };

        let volatility_index = sample_volatility_percent(book.history_30d);

        let daily_volume_30d = total_history_volume / book.history_30d.len().max(1) as f64;
        let near_best_band = 0.05;
        let depth_volume: u64 = book
            .buy_orders
            .iter()
            .filter(|o| best_bid > 0.0 && o.price >= best_bid * (1.0 - near_best_band))
            .map(|o| o.volume_remaining)
            .chain(
                book.sell_orders
                    .iter()
                    .filter(|o| o.price <= best_ask * (1.0 + near_best_band))
                    .map(|o| o.volume_remaining),
            )
            .sum();
        let depth_score = if daily_volume_30d > 0.0 {
            depth_volume as f64 / daily_volume_30d
        } else {
            0.0
        };

        let recent_7d: Vec<&HistoryBucket> = book.history_30d.iter().rev().take(7).collect();
        let daily_volume_7d = if recent_7d.is_empty() {
            daily_volume_30d
        } else {
            recent_7d.iter().map(|b| b.volume as f64).sum::<f64>() / recent_7d.len() as f64
        };
        let total_sell_volume: u64 = book.sell_orders.iter().map(|o| o.volume_remaining).sum();
        let days_of_supply = if daily_volume_7d > 0.0 {
            total_sell_volume as f64 / daily_volume_7d
        } else {
            f64::INFINITY
        };

        let total_buy_volume: u64 = book.buy_orders.iter().map(|o| o.volume_remaining).sum();
        let buy_sell_ratio = if total_sell_volume > 0 {
            total_buy_volume as f64 / total_sell_volume as f64
        } else if total_buy_volume > 0 {
            f64::INFINITY
        } else {
            0.0
        };

        let last_traded_days_ago = book
            .history_30d
            .iter()
            .rev()
            .position(|b| b.volume > 0)
            .map(|idx| idx as f64)
            .unwrap_or(f64::INFINITY);

        let scam_score = scam_detection_score(best_bid, vwap_30d, book, last_traded_days_ago);

        let period_roi = if margin_percent > 0.0 && daily_volume_30d > 0.0 {
            let round_trips_in_90d = 90.0 * (daily_volume_30d / total_sell_volume.max(1) as f64).min(1.0);
            margin_percent * round_trips_in_90d.max(1.0)
        } else {
            0.0
        };

        let composite_score = composite_trading_score(margin_percent, depth_score, period_roi, daily_volume_30d, scam_score);

        if period_roi < params.min_period_roi_percent
            || volatility_index > params.max_volatility_percent
            || buy_sell_ratio < params.min_buy_sell_ratio
            || scam_score > params.max_scam_score
        {
            return None;
        }

        let execution_plan = execution_plan_for(params.cargo_m3, self.catalog.item(book.type_id).map(|i| i.volume_m3), best_ask, best_bid, book);
        let profit_per_unit = fees::profit_per_unit(best_ask, best_bid, params.sales_tax_percent, params.broker_fee_percent);
        let total_profit = profit_per_unit * execution_plan.expected_filled_qty as f64;

        Some(StationRow {
            header: ScanResultHeader {
                type_id: book.type_id,
                name: self.catalog.item_name(book.type_id).to_string(),
                total_profit,
                margin: margin_percent,
                jumps: 0,
            },
            best_bid,
            best_ask,
            margin_percent,
            vwap_30d,
            volatility_index,
            depth_score,
            days_of_supply,
            buy_sell_ratio,
            scam_score,
            period_roi,
            composite_score,
            execution_plan,
        })
    }
}

fn sample_volatility_percent(history: &[HistoryBucket]) -> f64 {
    if history.len() < 2 {
        return 0.0;
    }
    let mean = history.iter().map(|b| b.average).sum::<f64>() / history.len() as f64;
    if mean <= 0.0 {
        return 0.0;
    }
    let variance = history.iter().map(|b| (b.average - mean).powi(2)).sum::<f64>() / (history.len() - 1) as f64;
    (variance.sqrt() / mean) * 100.0
}

/// Weighted scam flags from spec §4.1.2's table: each triggered flag adds a
/// fixed weight, capped at 100.
fn scam_detection_score(best_bid: f64, vwap_30d: f64, book: &TypeBook<'_>, last_traded_days_ago: f64) -> f64 {
    let mut score: f64 = 0.0;
    if vwap_30d > 0.0 && best_bid < 0.5 * vwap_30d {
        score += 35.0;
    }
    let total_buy: u64 = book.buy_orders.iter().map(|o| o.volume_remaining).sum();
    let total_sell: u64 = book.sell_orders.iter().map(|o| o.volume_remaining).sum();
    let dominated = |orders: &[Order], total: u64| {
        total > 0
            && orders
                .iter()
                .any(|o| (o.volume_remaining as f64) > 0.7 * total as f64)
    };
    if dominated(book.buy_orders, total_buy) || dominated(book.sell_orders, total_sell) {
        score += 25.0;
    }
    if last_traded_days_ago > 3.0 {
        score += 20.0;
    }
    let current_price = book.sell_orders.iter().map(|o| o.price).fold(f64::INFINITY, f64::min);
    if vwap_30d > 0.0 && current_price.is_finite() && (current_price - vwap_30d).abs() > 0.5 * vwap_30d {
        score += 20.0;
    }
    score.min(100.0)
}

fn composite_trading_score(margin_percent: f64, depth_score: f64, period_roi: f64, daily_volume: f64, scam_score: f64) -> f64 {
    let normalized_margin = margin_percent.clamp(0.0, 100.0);
    let normalized_depth = (depth_score * 20.0).clamp(0.0, 100.0);
    let normalized_roi = period_roi.clamp(0.0, 200.0) / 2.0;
    let normalized_volume = (daily_volume.ln_1p() * 10.0).clamp(0.0, 100.0);
    let scam_complement = 100.0 - scam_score;

    0.30 * normalized_margin + 0.20 * normalized_depth + 0.20 * normalized_roi + 0.15 * normalized_volume + 0.15 * scam_complement
}

fn execution_plan_for(cargo_m3: f64, item_volume_m3: Option<f64>, best_ask: f64, best_bid: f64, book: &TypeBook<'_>) -> ExecutionPlan {
    let cargo_limit = item_volume_m3
        .filter(|v| *v > 0.0)
        .map(|v| (cargo_m3 / v).floor() as u64)
        .unwrap_or(u64::MAX);

    let mut sells: Vec<&Order> = book.sell_orders.iter().collect();
    sells.sort_by(|a, b| a.price.total_cmp(&b.price));
    let mut buys: Vec<&Order> = book.buy_orders.iter().collect();
    buys.sort_by(|a, b| b.price.total_cmp(&a.price));

    let mut remaining = cargo_limit;
    let mut buy_cost = 0.0;
    let mut buy_qty = 0u64;
    for order in &sells {
        if remaining == 0 {
            break;
        }
        let take = order.volume_remaining.min(remaining);
        buy_cost += take as f64 * order.price;
        buy_qty += take;
        remaining -= take;
    }

    let mut remaining_sell = buy_qty;
    let mut sell_proceeds = 0.0;
    let mut sell_qty = 0u64;
    for order in &buys {
        if remaining_sell == 0 {
            break;
        }
        let take = order.volume_remaining.min(remaining_sell);
        sell_proceeds += take as f64 * order.price;
        sell_qty += take;
        remaining_sell -= take;
    }

    let expected_filled_qty = buy_qty.min(sell_qty) as i64;
    let expected_buy_price = if buy_qty > 0 { buy_cost / buy_qty as f64 } else { best_ask };
    let expected_sell_price = if sell_qty > 0 { sell_proceeds / sell_qty as f64 } else { best_bid };
    let worst_case_slippage_percent = if expected_filled_qty > 0 && best_ask > 0.0 {
        ((expected_buy_price - best_ask) / best_ask * 100.0).max(0.0)
    } else {
        0.0
    };

    ExecutionPlan {
        can_fill: expected_filled_qty > 0,
        expected_filled_qty,
        expected_buy_price,
        expected_sell_price,
        worst_case_slippage_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use flipper_universe::ItemType;

    fn order(is_buy: bool, price: f64, volume_remaining: u64) -> Order {
        Order {
            type_id: 34,
            location_id: 60003760,
            system_id: 30000142,
            is_buy,
            price,
            volume_remaining,
            volume_total: volume_remaining,
            min_volume: 1,
            range: None,
            issued_at: Utc::now(),
        }
    }

    fn history(average: f64, volume: u64) -> HistoryBucket {
        HistoryBucket {
            date: NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
            average,
            highest: average * 1.05,
            lowest: average * 0.95,
            volume,
            order_count: 50,
        }
    }

    fn catalog() -> StaticCatalog {
        StaticCatalog::new(
            vec![ItemType { type_id: 34, name: "Tritanium".into(), volume_m3: 0.01, market_group_id: None }],
            vec![],
        )
    }

    #[test]
    fn stable_book_yields_a_positive_composite_score() {
        let catalog = catalog();
        let scanner = StationTradeScanner::new(&catalog);
        let history: Vec<HistoryBucket> = (0..30).map(|_| history(100.0, 5_000)).collect();
        let buys = vec![order(true, 90.0, 1_000)];
        let sells = vec![order(false, 100.0, 1_000)];
        let books = vec![TypeBook { type_id: 34, buy_orders: &buys, sell_orders: &sells, history_30d: &history }];

        let (sink, _rx) = ProgressSink::noop();
        let results = scanner.scan(&StationTradeParams::default(), &books, &sink);

        assert_eq!(results.len(), 1);
        assert!(results[0].composite_score > 0.0);
        assert!(results[0].scam_score < 50.0);
    }

    #[test]
    fn a_single_order_dominating_the_book_raises_the_scam_score() {
        let catalog = catalog();
        let scanner = StationTradeScanner::new(&catalog);
        let history: Vec<HistoryBucket> = (0..30).map(|_| history(100.0, 5_000)).collect();
        let buys = vec![order(true, 90.0, 1_000)];
        let sells = vec![order(false, 45.0, 1_000)]; // well below half VWAP
        let books = vec![TypeBook { type_id: 34, buy_orders: &buys, sell_orders: &sells, history_30d: &history }];

        let (sink, _rx) = ProgressSink::noop();
        let mut params = StationTradeParams::default();
        params.max_scam_score = 100.0;
        let results = scanner.scan(&params, &books, &sink);
        assert_eq!(results.len(), 1);
        assert!(results[0].scam_score >= 25.0);
    }

    #[test]
    fn no_sell_orders_yields_no_row() {
        let catalog = catalog();
        let scanner = StationTradeScanner::new(&catalog);
        let buys = vec![order(true, 90.0, 1_000)];
        let sells: Vec<Order> = vec![];
        let history: Vec<HistoryBucket> = vec![];
        let books = vec![TypeBook { type_id: 34, buy_orders: &buys, sell_orders: &sells, history_30d: &history }];

        let (sink, _rx) = ProgressSink::noop();
        let results = scanner.scan(&StationTradeParams::default(), &books, &sink);
        assert!(results.is_empty());
    }
}
