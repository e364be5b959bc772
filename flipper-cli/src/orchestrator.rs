use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use flipper_alerts::AlertDispatcher;
use futures::stream::{self, StreamExt};
use flipper_client::{Auth, Cacheable, ClientError, HistoryBucket, Order};
use flipper_engine::{
    ContractCandidate, ContractScanner, ProgressSink, RadiusFlipScanner, RouteBuilder,
    RouteOpportunity, ScanParams, StationTradeParams, StationTradeScanner, TypeBook,
};
use flipper_storage::dao::{DemandRegionDao, ResultsDao, ScanHistoryDao};
use flipper_storage::{AlertMetric, ContractResultRow, FlipResultRow, RouteResultRow, ScanKind, StationResultRow};
use flipper_universe::{RegionId, SystemId};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::error::OrchestratorError;
use crate::state::AppState;

const HISTORY_TTL: std::time::Duration = std::time::Duration::from_secs(3600);

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamEvent {
    Progress { message: String },
    Final { result: serde_json::Value },
    Error { message: String },
}

fn send(tx: &UnboundedSender<StreamEvent>, event: StreamEvent) {
    let _ = tx.send(event);
}

/// Maximum number of region/history fetches kept in flight at once, per
/// SPEC_FULL.md §5's bounded worker pool for upstream fan-out.
pub(crate) const FETCH_CONCURRENCY: usize = 30;

/// Fetch every open order across a region set, in parallel through C3
/// (spec §4.1.1 step 3). Called by the HTTP layer before handing the
/// assembled book to [`run_radius_flip`].
pub(crate) async fn fetch_orders(
    client: &flipper_client::UpstreamClient,
    regions: &[RegionId],
    cancel: &CancellationToken,
) -> Result<Vec<Order>, ClientError> {
    if cancel.is_cancelled() {
        return Err(ClientError::Canceled);
    }

    let per_region: Vec<Result<Vec<Order>, ClientError>> = stream::iter(regions.to_vec())
        .map(|region| {
            let path = format!("/markets/{}/orders", region.0);
            async move {
                client
                    .get_json_paginated::<Order>(&path, &[], Auth::None, Cacheable::Yes { default_ttl: HISTORY_TTL }, cancel)
                    .await
            }
        })
        .buffer_unordered(FETCH_CONCURRENCY)
        .collect()
        .await;

    let mut all = Vec::new();
    for orders in per_region {
        all.append(&mut orders?);
    }
    Ok(all)
}

/// Fetch one item type's 30-day history bucket for a region. Called by the
/// HTTP layer when assembling [`TypeBook`]s for [`run_station_trade`].
pub(crate) async fn fetch_history(
    client: &flipper_client::UpstreamClient,
    region_id: u32,
    type_id: u32,
    cancel: &CancellationToken,
) -> Result<Vec<HistoryBucket>, ClientError> {
    let path = format!("/markets/{region_id}/history");
    let type_str = type_id.to_string();
    client
        .get_json::<Vec<HistoryBucket>>(
            &path,
            &[("type_id", type_str.as_str())],
            Auth::None,
            Cacheable::Yes { default_ttl: HISTORY_TTL },
            cancel,
        )
        .await
}

/// Radius flip scan (spec §4.1.1 + §4.5): pull the regions within reach,
/// evaluate, persist, alert.
pub async fn run_radius_flip(
    state: &AppState,
    params: ScanParams,
    tx: UnboundedSender<StreamEvent>,
    cancel: CancellationToken,
) -> Result<(), OrchestratorError> {
    let started = Instant::now();
    send(&tx, StreamEvent::Progress { message: "finding systems".into() });

    let origin = SystemId(params.origin_system_id);
    if state.graph.system(origin).is_err() {
        return Err(OrchestratorError::UnknownOrigin(params.origin_system_id));
    }

    let buy_systems = state.graph.systems_within(origin, params.buy_radius_jumps, params.min_route_security);
    let sell_systems = state.graph.systems_within(origin, params.sell_radius_jumps, params.min_route_security);
    let mut regions: Vec<RegionId> = state.graph.regions_of(buy_systems.iter().map(|w| &w.system_id));
    regions.extend(state.graph.regions_of(sell_systems.iter().map(|w| &w.system_id)));
    regions.sort_by_key(|r| r.0);
    regions.dedup_by_key(|r| r.0);

    send(&tx, StreamEvent::Progress { message: format!("fetching {} regions", regions.len()) });
    let orders = fetch_orders(&state.client, &regions, &cancel).await?;

    if cancel.is_cancelled() {
        return Err(OrchestratorError::Canceled);
    }

    let demand_dao = DemandRegionDao::new(&state.storage);
    let scanner = RadiusFlipScanner::new(&state.graph, &state.catalog);
    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::unbounded_channel();
    let sink = ProgressSink::new(progress_tx);

    // Demand lookups hit the storage cache synchronously is not possible
    // inside the scanner's sync closure; pre-resolve the region set's
    // cached volumes up front and hand the scanner a plain map.
    let mut volume_by_region_type: HashMap<(u32, u32), f64> = HashMap::new();
    for region in &regions {
        if let Some(cached) = demand_dao.get(region.0).await? {
            if let Some(obj) = cached.data.as_object() {
                for (type_id_str, value) in obj {
                    if let (Ok(type_id), Some(volume)) = (type_id_str.parse::<u32>(), value.as_f64()) {
                        volume_by_region_type.insert((region.0, type_id), volume);
                    }
                }
            }
        }
    }

    let rows = scanner.scan(
        &params,
        &orders,
        |type_id, region_id| volume_by_region_type.get(&(region_id, type_id)).copied(),
        &sink,
    );
    drop(sink);
    while let Ok(message) = progress_rx.try_recv() {
        send(&tx, StreamEvent::Progress { message });
    }

    if cancel.is_cancelled() {
        return Err(OrchestratorError::Canceled);
    }

    let top_profit = rows.first().map(|r| r.header.total_profit).unwrap_or(0.0);
    let total_profit: f64 = rows.iter().map(|r| r.header.total_profit).sum();
    let snapshot = serde_json::json!({
        "origin_system_id": params.origin_system_id,
        "buy_radius_jumps": params.buy_radius_jumps,
        "sell_radius_jumps": params.sell_radius_jumps,
        "cargo_m3": params.cargo_m3,
        "min_margin_percent": params.min_margin_percent,
        "min_profit": params.min_profit,
        "min_daily_volume": params.min_daily_volume,
    });

    let scan_id = ScanHistoryDao::new(&state.storage)
        .record(
            ScanKind::RadiusFlip,
            params.origin_system_id,
            started.elapsed().as_millis() as i64,
            rows.len() as i64,
            top_profit,
            total_profit,
            snapshot,
        )
        .await?;

    let result_rows: Vec<FlipResultRow> = rows
        .iter()
        .map(|r| FlipResultRow {
            scan_id,
            type_id: r.header.type_id,
            type_name: r.header.name.clone(),
            buy_system: r.buy_system,
            sell_system: r.sell_system,
            units: r.units,
            ask: r.ask,
            bid: r.bid,
            profit_per_unit: r.profit_per_unit,
            total_profit: r.header.total_profit,
            margin: r.header.margin,
            total_jumps: r.header.jumps as i64,
        })
        .collect();
    ResultsDao::new(&state.storage).insert_flips(result_rows).await?;

    dispatch_alerts(state, scan_id, rows.iter().map(|r| {
        let mut metrics = HashMap::new();
        metrics.insert(AlertMetric::MarginPercent, r.header.margin);
        metrics.insert(AlertMetric::TotalProfit, r.header.total_profit);
        metrics.insert(AlertMetric::ProfitPerUnit, r.profit_per_unit);
        (r.header.type_id, r.header.name.clone(), metrics)
    }))
    .await?;

    send(&tx, StreamEvent::Final { result: serde_json::to_value(&rows).unwrap_or_default() });
    Ok(())
}

pub async fn run_station_trade(
    state: &AppState,
    params: StationTradeParams,
    books: Vec<(u32, Vec<Order>, Vec<Order>, Vec<HistoryBucket>)>,
    tx: UnboundedSender<StreamEvent>,
    cancel: CancellationToken,
) -> Result<(), OrchestratorError> {
    let started = Instant::now();
    send(&tx, StreamEvent::Progress { message: "evaluating book".into() });
    if cancel.is_cancelled() {
        return Err(OrchestratorError::Canceled);
    }

    let scanner = StationTradeScanner::new(&state.catalog);
    let type_books: Vec<TypeBook<'_>> = books
        .iter()
        .map(|(type_id, buy_orders, sell_orders, history)| TypeBook {
            type_id: *type_id,
            buy_orders,
            sell_orders,
            history_30d: history,
        })
        .collect();
    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::unbounded_channel();
    let sink = ProgressSink::new(progress_tx);
    let rows = scanner.scan(&params, &type_books, &sink);
    drop(sink);
    while let Ok(message) = progress_rx.try_recv() {
        send(&tx, StreamEvent::Progress { message });
    }

    if cancel.is_cancelled() {
        return Err(OrchestratorError::Canceled);
    }

    let top_profit = rows.first().map(|r| r.header.total_profit).unwrap_or(0.0);
    let total_profit: f64 = rows.iter().map(|r| r.header.total_profit).sum();
    let snapshot = serde_json::json!({ "station_system_id": params.station_system_id });
    let scan_id = ScanHistoryDao::new(&state.storage)
        .record(
            ScanKind::StationTrade,
            params.station_system_id,
            started.elapsed().as_millis() as i64,
            rows.len() as i64,
            top_profit,
            total_profit,
            snapshot,
        )
        .await?;

    let result_rows: Vec<StationResultRow> = rows
        .iter()
        .map(|r| StationResultRow {
            scan_id,
            type_id: r.header.type_id,
            type_name: r.header.name.clone(),
            best_bid: r.best_bid,
            best_ask: r.best_ask,
            margin_percent: r.margin_percent,
            vwap_30d: r.vwap_30d,
            volatility_index: r.volatility_index,
            depth_score: r.depth_score,
            days_of_supply: r.days_of_supply,
            buy_sell_ratio: r.buy_sell_ratio,
            scam_score: r.scam_score,
            period_roi: r.period_roi,
            composite_score: r.composite_score,
            execution_plan: serde_json::to_value(&r.execution_plan).unwrap_or_default(),
        })
        .collect();
    ResultsDao::new(&state.storage).insert_stations(result_rows).await?;

    dispatch_alerts(state, scan_id, rows.iter().map(|r| {
        let mut metrics = HashMap::new();
        metrics.insert(AlertMetric::MarginPercent, r.margin_percent);
        metrics.insert(AlertMetric::TotalProfit, r.header.total_profit);
        (r.header.type_id, r.header.name.clone(), metrics)
    }))
    .await?;

    send(&tx, StreamEvent::Final { result: serde_json::to_value(&rows).unwrap_or_default() });
    Ok(())
}

pub async fn run_contract_scan(
    state: &AppState,
    sales_tax_percent: f64,
    broker_fee_percent: f64,
    min_margin_percent: f64,
    min_daily_volume_floor: f64,
    require_history: bool,
    origin_system_id: u32,
    contract_params: flipper_engine::ContractScanParams,
    candidates: &[ContractCandidate<'_>],
    tx: UnboundedSender<StreamEvent>,
    cancel: CancellationToken,
) -> Result<(), OrchestratorError> {
    let started = Instant::now();
    send(&tx, StreamEvent::Progress { message: format!("evaluating {} contracts", candidates.len()) });
    if cancel.is_cancelled() {
        return Err(OrchestratorError::Canceled);
    }

    let scanner = ContractScanner::new(&state.catalog);
    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::unbounded_channel();
    let sink = ProgressSink::new(progress_tx);
    let rows = scanner.scan(
        &contract_params,
        sales_tax_percent,
        broker_fee_percent,
        min_margin_percent,
        min_daily_volume_floor,
        require_history,
        candidates,
        Utc::now(),
        100,
        &sink,
    );
    drop(sink);
    while let Ok(message) = progress_rx.try_recv() {
        send(&tx, StreamEvent::Progress { message });
    }

    if cancel.is_cancelled() {
        return Err(OrchestratorError::Canceled);
    }

    let top_profit = rows.first().map(|r| r.expected_profit).unwrap_or(0.0);
    let total_profit: f64 = rows.iter().map(|r| r.expected_profit).sum();
    let snapshot = serde_json::json!({ "contract_params": format!("{:?}", contract_params) });
    let scan_id = ScanHistoryDao::new(&state.storage)
        .record(ScanKind::Contract, origin_system_id, started.elapsed().as_millis() as i64, rows.len() as i64, top_profit, total_profit, snapshot)
        .await?;

    let result_rows: Vec<ContractResultRow> = rows
        .iter()
        .map(|r| ContractResultRow {
            scan_id,
            contract_id: r.contract_id,
            contract_price: r.contract_price,
            estimated_value: r.estimated_value,
            expected_profit: r.expected_profit,
            realized_profit: r.realized_profit,
            margin: r.header.margin,
            confidence_percent: r.confidence_percent,
            priced_ratio: r.priced_ratio,
        })
        .collect();
    ResultsDao::new(&state.storage).insert_contracts(result_rows).await?;

    dispatch_alerts(state, scan_id, rows.iter().map(|r| {
        let mut metrics = HashMap::new();
        metrics.insert(AlertMetric::TotalProfit, r.expected_profit);
        (r.header.type_id, r.header.name.clone(), metrics)
    }))
    .await?;

    send(&tx, StreamEvent::Final { result: serde_json::to_value(&rows).unwrap_or_default() });
    Ok(())
}

pub async fn run_route_builder(
    state: &AppState,
    origin_system_id: u32,
    params: flipper_engine::RouteParams,
    opportunities: Vec<RouteOpportunity>,
    tx: UnboundedSender<StreamEvent>,
    cancel: CancellationToken,
) -> Result<(), OrchestratorError> {
    let started = Instant::now();
    send(&tx, StreamEvent::Progress { message: "searching routes".into() });
    if cancel.is_cancelled() {
        return Err(OrchestratorError::Canceled);
    }

    let builder = RouteBuilder::new(&state.graph);
    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::unbounded_channel();
    let sink = ProgressSink::new(progress_tx);
    let rows = builder.build(&params, &opportunities, &sink);
    drop(sink);
    while let Ok(message) = progress_rx.try_recv() {
        send(&tx, StreamEvent::Progress { message });
    }

    if cancel.is_cancelled() {
        return Err(OrchestratorError::Canceled);
    }

    let top_profit = rows.first().map(|r| r.total_profit).unwrap_or(0.0);
    let total_profit: f64 = rows.iter().map(|r| r.total_profit).sum();
    let snapshot = serde_json::json!({ "hops": params.hops, "beam_width": params.beam_width });
    let scan_id = ScanHistoryDao::new(&state.storage)
        .record(ScanKind::Route, origin_system_id, started.elapsed().as_millis() as i64, rows.len() as i64, top_profit, total_profit, snapshot)
        .await?;

    let result_rows: Vec<RouteResultRow> = rows
        .iter()
        .map(|r| RouteResultRow {
            scan_id,
            segments: serde_json::to_value(&r.segments).unwrap_or_default(),
            total_profit: r.total_profit,
            total_jumps: r.total_jumps as i64,
            profit_per_jump: r.profit_per_jump,
        })
        .collect();
    ResultsDao::new(&state.storage).insert_routes(result_rows).await?;

    send(&tx, StreamEvent::Final { result: serde_json::to_value(&rows).unwrap_or_default() });
    Ok(())
}

/// Fan out a completed scan's results against the watchlist (spec §4.4).
async fn dispatch_alerts(
    state: &AppState,
    scan_id: i64,
    results: impl Iterator<Item = (u32, String, HashMap<AlertMetric, f64>)>,
) -> Result<(), OrchestratorError> {
    let dispatcher = AlertDispatcher::new(&state.storage, state.alert_channels(), state.alert_cooldown);
    for (type_id, name, metrics) in results {
        dispatcher.evaluate_and_dispatch(type_id, &name, &metrics, Some(scan_id)).await?;
    }
    Ok(())
}
