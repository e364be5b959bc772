use std::sync::Arc;

use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use futures::stream::{self, Stream};
use futures::StreamExt;
use serde::Deserialize;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use flipper_client::{ContractKind, HistoryBucket, Order, PublicContract, SessionToken};
use flipper_engine::{
    ContractCandidate, ContractScanParams, ItemContext, RouteOpportunity, RouteParams, ScanParams,
    StationTradeParams,
};
use flipper_risk::{historical_es, historical_var, DrawdownTracker, FifoMatcher, SharpeRatio};
use flipper_storage::dao::{ConfigDao, FillsDao, WatchlistDao};
use flipper_storage::{AlertMetric, Config, WatchlistItem};
use flipper_universe::SystemId;

use crate::orchestrator::{self, StreamEvent};
use crate::state::AppState;

/// The process's one HTTP surface: four streaming scan endpoints, watchlist
/// and config CRUD, and session acceptance for the OAuth flow the upstream
/// client hands off to the orchestrator (SPEC_FULL.md component C9).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/scans/radius-flip", post(radius_flip))
        .route("/scans/station-trade", post(station_trade))
        .route("/scans/contracts", post(contracts))
        .route("/scans/route", post(route))
        .route("/watchlist", get(list_watchlist).post(add_watchlist))
        .route("/watchlist/:type_id", axum::routing::delete(remove_watchlist))
        .route("/watchlist/:type_id/alert", put(set_alert))
        .route("/config", get(get_config).put(put_config))
        .route("/session", post(accept_session))
        .route("/characters", get(list_characters).post(add_character))
        .route("/characters/:character_id/fills", post(record_fill))
        .route("/characters/:character_id/portfolio", get(character_portfolio))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

fn stream_from(rx: tokio::sync::mpsc::UnboundedReceiver<StreamEvent>, cancel: CancellationToken) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    let guard = CancelOnDrop(cancel);
    UnboundedReceiverStream::new(rx).map(move |event| {
        let _keep_alive = &guard;
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(Event::default().data(data))
    })
}

/// Cancels the backing scan task the moment the HTTP response body this
/// guard is embedded in is dropped — the client disconnecting or the
/// connection closing early is the only place SPEC_FULL.md §4.5's
/// "in-flight scan is canceled when its client disconnects" can observe.
struct CancelOnDrop(CancellationToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

#[derive(Debug, Deserialize)]
struct RadiusFlipRequest {
    origin_system_id: u32,
    #[serde(flatten)]
    params: RadiusFlipParams,
}

#[derive(Debug, Deserialize)]
struct RadiusFlipParams {
    buy_radius_jumps: u32,
    sell_radius_jumps: u32,
    cargo_m3: f64,
    #[serde(default = "default_sales_tax")]
    sales_tax_percent: f64,
    #[serde(default = "default_broker_fee")]
    broker_fee_percent: f64,
    #[serde(default)]
    min_margin_percent: f64,
    #[serde(default)]
    min_profit: f64,
    #[serde(default)]
    min_daily_volume: f64,
    #[serde(default)]
    min_route_security: Option<f64>,
    #[serde(default)]
    require_history: bool,
    #[serde(default = "default_result_limit")]
    result_limit: usize,
}

fn default_sales_tax() -> f64 {
    3.6
}
fn default_broker_fee() -> f64 {
    1.0
}
fn default_result_limit() -> usize {
    100
}

async fn radius_flip(State(state): State<Arc<AppState>>, Json(req): Json<RadiusFlipRequest>) -> impl IntoResponse {
    let params = ScanParams {
        origin_system_id: req.origin_system_id,
        buy_radius_jumps: req.params.buy_radius_jumps,
        sell_radius_jumps: req.params.sell_radius_jumps,
        cargo_m3: req.params.cargo_m3,
        sales_tax_percent: req.params.sales_tax_percent,
        broker_fee_percent: req.params.broker_fee_percent,
        min_margin_percent: req.params.min_margin_percent,
        min_profit: req.params.min_profit,
        min_daily_volume: req.params.min_daily_volume,
        min_route_security: req.params.min_route_security,
        require_history: req.params.require_history,
        result_limit: req.params.result_limit,
    };

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let task_state = state.clone();
    let task_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(err) = orchestrator::run_radius_flip(&task_state, params, tx.clone(), task_cancel).await {
            let _ = tx.send(StreamEvent::Error { message: err.to_string() });
        }
    });

    Sse::new(stream_from(rx, cancel)).keep_alive(KeepAlive::default())
}

#[derive(Debug, Deserialize)]
struct StationTradeRequest {
    station_system_id: u32,
    cargo_m3: f64,
    #[serde(default = "default_sales_tax")]
    sales_tax_percent: f64,
    #[serde(default = "default_broker_fee")]
    broker_fee_percent: f64,
    #[serde(default)]
    min_period_roi_percent: f64,
    #[serde(default = "default_max_volatility")]
    max_volatility_percent: f64,
    #[serde(default)]
    min_buy_sell_ratio: f64,
    #[serde(default = "default_max_scam_score")]
    max_scam_score: f64,
    #[serde(default = "default_result_limit")]
    result_limit: usize,
    type_ids: Vec<u32>,
}

fn default_max_volatility() -> f64 {
    100.0
}
fn default_max_scam_score() -> f64 {
    100.0
}

async fn station_trade(State(state): State<Arc<AppState>>, Json(req): Json<StationTradeRequest>) -> impl IntoResponse {
    let params = StationTradeParams {
        station_system_id: req.station_system_id,
        cargo_m3: req.cargo_m3,
        sales_tax_percent: req.sales_tax_percent,
        broker_fee_percent: req.broker_fee_percent,
        min_period_roi_percent: req.min_period_roi_percent,
        max_volatility_percent: req.max_volatility_percent,
        min_buy_sell_ratio: req.min_buy_sell_ratio,
        max_scam_score: req.max_scam_score,
        result_limit: req.result_limit,
    };

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let task_state = state.clone();
    let task_cancel = cancel.clone();
    let type_ids = req.type_ids.clone();
    let station_system_id = req.station_system_id;
    tokio::spawn(async move {
        let result = assemble_station_books(&task_state, station_system_id, &type_ids, &task_cancel)
            .await
            .map_err(|e| e.to_string());
        match result {
            Ok(books) => {
                if let Err(err) = orchestrator::run_station_trade(&task_state, params, books, tx.clone(), task_cancel).await {
                    let _ = tx.send(StreamEvent::Error { message: err.to_string() });
                }
            }
            Err(message) => {
                let _ = tx.send(StreamEvent::Error { message });
            }
        }
    });

    Sse::new(stream_from(rx, cancel)).keep_alive(KeepAlive::default())
}

async fn assemble_station_books(
    state: &AppState,
    station_system_id: u32,
    type_ids: &[u32],
    cancel: &CancellationToken,
) -> Result<Vec<(u32, Vec<Order>, Vec<Order>, Vec<HistoryBucket>)>, flipper_client::ClientError> {
    let system = state.graph.system(SystemId(station_system_id)).map_err(|_| flipper_client::ClientError::NotFound(station_system_id.to_string()))?;
    let region_id = system.region_id;

    let region_orders = orchestrator::fetch_orders(&state.client, &[region_id], cancel).await?;

    // History enrichment is a bounded worker pool over `type_ids`, mirroring
    // `fetch_orders`'s per-region fan-out (SPEC_FULL.md §5).
    let books: Vec<Result<(u32, Vec<Order>, Vec<Order>, Vec<HistoryBucket>), flipper_client::ClientError>> =
        stream::iter(type_ids.to_vec())
            .map(|type_id| {
                let (buys, sells): (Vec<Order>, Vec<Order>) = region_orders
                    .iter()
                    .filter(|o| o.type_id == type_id && o.system_id == station_system_id)
                    .cloned()
                    .partition(|o| o.is_buy);
                let client = state.client.clone();
                let cancel = cancel.clone();
                async move {
                    let history = orchestrator::fetch_history(&client, region_id.0, type_id, &cancel).await?;
                    Ok((type_id, buys, sells, history))
                }
            })
            .buffer_unordered(orchestrator::FETCH_CONCURRENCY)
            .collect()
            .await;

    books.into_iter().collect()
}

#[derive(Debug, Deserialize)]
struct ContractsRequest {
    origin_system_id: u32,
    sales_tax_percent: f64,
    broker_fee_percent: f64,
    #[serde(default)]
    min_margin_percent: f64,
    #[serde(default)]
    min_daily_volume_floor: f64,
    #[serde(default)]
    require_history: bool,
    #[serde(default)]
    contract_params: ContractsParams,
    contracts: Vec<ContractInput>,
}

#[derive(Debug, Deserialize)]
struct ContractsParams {
    #[serde(default)]
    min_contract_price: f64,
    #[serde(default = "default_max_contract_margin")]
    max_contract_margin_percent: f64,
    #[serde(default = "default_min_priced_ratio")]
    min_priced_ratio: f64,
    #[serde(default)]
    instant_liquidation: bool,
    #[serde(default = "default_hold_days")]
    hold_days: f64,
    #[serde(default)]
    target_confidence_percent: f64,
    #[serde(default)]
    daily_carry_rate: f64,
}

fn default_max_contract_margin() -> f64 {
    100.0
}
fn default_min_priced_ratio() -> f64 {
    0.8
}
fn default_hold_days() -> f64 {
    7.0
}

impl Default for ContractsParams {
    fn default() -> Self {
        Self {
            min_contract_price: 0.0,
            max_contract_margin_percent: default_max_contract_margin(),
            min_priced_ratio: default_min_priced_ratio(),
            instant_liquidation: false,
            hold_days: default_hold_days(),
            target_confidence_percent: 0.0,
            daily_carry_rate: 0.0,
        }
    }
}

impl From<ContractsParams> for ContractScanParams {
    fn from(p: ContractsParams) -> Self {
        Self {
            min_contract_price: p.min_contract_price,
            max_contract_margin_percent: p.max_contract_margin_percent,
            min_priced_ratio: p.min_priced_ratio,
            instant_liquidation: p.instant_liquidation,
            hold_days: p.hold_days,
            target_confidence_percent: p.target_confidence_percent,
            daily_carry_rate: p.daily_carry_rate,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContractInput {
    id: u64,
    kind: ContractKind,
    price: f64,
    start_location_id: u64,
    volume_m3: f64,
    expires_at: chrono::DateTime<chrono::Utc>,
    items: Vec<ContractItemInput>,
}

#[derive(Debug, Deserialize)]
struct ContractItemInput {
    type_id: u32,
    quantity: u64,
    vwap_30d: Option<f64>,
    cheapest_ask: Option<f64>,
    daily_volume: Option<f64>,
}

async fn contracts(State(state): State<Arc<AppState>>, Json(req): Json<ContractsRequest>) -> impl IntoResponse {
    let contract_params: ContractScanParams = req.contract_params.into();
    let public_contracts: Vec<PublicContract> = req
        .contracts
        .iter()
        .map(|c| PublicContract {
            id: c.id,
            kind: c.kind,
            price: c.price,
            start_location_id: c.start_location_id,
            volume_m3: c.volume_m3,
            expires_at: c.expires_at,
            items: None,
        })
        .collect();
    let empty_book: Vec<Order> = Vec::new();
    let candidates: Vec<ContractCandidate<'_>> = req
        .contracts
        .iter()
        .zip(public_contracts.iter())
        .map(|(input, contract)| ContractCandidate {
            contract,
            items: input
                .items
                .iter()
                .map(|i| ItemContext {
                    type_id: i.type_id,
                    quantity: i.quantity,
                    vwap_30d: i.vwap_30d,
                    cheapest_ask: i.cheapest_ask,
                    daily_volume: i.daily_volume,
                    bid_book: &empty_book,
                })
                .collect(),
        })
        .collect();

    // Candidates borrow from locals built above, so this runs in-request
    // rather than spawned — the evaluation is pure and synchronous, unlike
    // the other scans which fetch over the network first.
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    if let Err(err) = orchestrator::run_contract_scan(
        &state,
        req.sales_tax_percent,
        req.broker_fee_percent,
        req.min_margin_percent,
        req.min_daily_volume_floor,
        req.require_history,
        req.origin_system_id,
        contract_params,
        &candidates,
        tx.clone(),
        cancel.clone(),
    )
    .await
    {
        let _ = tx.send(StreamEvent::Error { message: err.to_string() });
    }

    Sse::new(stream_from(rx, cancel)).keep_alive(KeepAlive::default())
}

#[derive(Debug, Deserialize)]
struct RouteRequest {
    origin_system_id: u32,
    hops: u32,
    cargo_m3: f64,
    budget_isk: f64,
    #[serde(default = "default_sales_tax")]
    sales_tax_percent: f64,
    #[serde(default = "default_broker_fee")]
    broker_fee_percent: f64,
    #[serde(default = "default_beam_width")]
    beam_width: usize,
    #[serde(default)]
    min_route_security: Option<f64>,
    opportunities: Vec<RouteOpportunityInput>,
}

fn default_beam_width() -> usize {
    8
}

#[derive(Debug, Deserialize)]
struct RouteOpportunityInput {
    buy_system: u32,
    sell_system: u32,
    type_id: u32,
    profit_per_unit: f64,
    cargo_m3_per_unit: f64,
    max_units: i64,
    cost_per_unit: f64,
}

async fn route(State(state): State<Arc<AppState>>, Json(req): Json<RouteRequest>) -> impl IntoResponse {
    let params = RouteParams {
        origin_system_id: req.origin_system_id,
        hops: req.hops,
        cargo_m3: req.cargo_m3,
        budget_isk: req.budget_isk,
        sales_tax_percent: req.sales_tax_percent,
        broker_fee_percent: req.broker_fee_percent,
        beam_width: req.beam_width,
        min_route_security: req.min_route_security,
    };
    let opportunities: Vec<RouteOpportunity> = req
        .opportunities
        .iter()
        .map(|o| RouteOpportunity {
            buy_system: SystemId(o.buy_system),
            sell_system: SystemId(o.sell_system),
            type_id: o.type_id,
            profit_per_unit: o.profit_per_unit,
            cargo_m3_per_unit: o.cargo_m3_per_unit,
            max_units: o.max_units,
            cost_per_unit: o.cost_per_unit,
        })
        .collect();

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let task_state = state.clone();
    let task_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(err) = orchestrator::run_route_builder(&task_state, req.origin_system_id, params, opportunities, tx.clone(), task_cancel).await {
            let _ = tx.send(StreamEvent::Error { message: err.to_string() });
        }
    });

    Sse::new(stream_from(rx, cancel)).keep_alive(KeepAlive::default())
}

async fn list_watchlist(State(state): State<Arc<AppState>>) -> Result<Json<Vec<WatchlistItem>>, ApiError> {
    let items = WatchlistDao::new(&state.storage).list().await?;
    Ok(Json(items))
}

#[derive(Debug, Deserialize)]
struct AddWatchlistRequest {
    type_id: u32,
}

async fn add_watchlist(State(state): State<Arc<AppState>>, Json(req): Json<AddWatchlistRequest>) -> Result<StatusCode, ApiError> {
    WatchlistDao::new(&state.storage).add(req.type_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_watchlist(State(state): State<Arc<AppState>>, AxumPath(type_id): AxumPath<u32>) -> Result<StatusCode, ApiError> {
    WatchlistDao::new(&state.storage).remove(type_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct SetAlertRequest {
    metric: Option<AlertMetric>,
    threshold: Option<f64>,
}

async fn set_alert(
    State(state): State<Arc<AppState>>,
    AxumPath(type_id): AxumPath<u32>,
    Json(req): Json<SetAlertRequest>,
) -> Result<StatusCode, ApiError> {
    WatchlistDao::new(&state.storage).set_alert(type_id, req.metric, req.threshold).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_config(State(state): State<Arc<AppState>>) -> Result<Json<Config>, ApiError> {
    let config = ConfigDao::new(&state.storage).load().await?;
    Ok(Json(config))
}

async fn put_config(State(state): State<Arc<AppState>>, Json(config): Json<Config>) -> Result<StatusCode, ApiError> {
    ConfigDao::new(&state.storage).save(config).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Accepts a session the upstream OAuth flow has already produced
/// out-of-band — this process never runs the authorization-code exchange
/// itself, only consumes its result (SPEC_FULL.md §1, Non-goals).
async fn accept_session(State(state): State<Arc<AppState>>, Json(token): Json<SessionToken>) -> Result<StatusCode, ApiError> {
    state.client.set_session(token.clone());
    let mut config = ConfigDao::new(&state.storage).load().await?;
    config.access_token = Some(token.access_token);
    config.refresh_token = Some(token.refresh_token);
    config.token_expires_at = Some(token.expires_at);
    ConfigDao::new(&state.storage).save(config).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_characters(State(state): State<Arc<AppState>>) -> Result<Json<Vec<flipper_storage::Character>>, ApiError> {
    let characters = FillsDao::new(&state.storage).characters().await?;
    Ok(Json(characters))
}

#[derive(Debug, Deserialize)]
struct AddCharacterRequest {
    character_id: u64,
    name: String,
}

async fn add_character(State(state): State<Arc<AppState>>, Json(req): Json<AddCharacterRequest>) -> Result<StatusCode, ApiError> {
    FillsDao::new(&state.storage).add_character(req.character_id, req.name).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct RecordFillRequest {
    type_id: u32,
    is_buy: bool,
    price: f64,
    quantity: i64,
}

async fn record_fill(
    State(state): State<Arc<AppState>>,
    AxumPath(character_id): AxumPath<u64>,
    Json(req): Json<RecordFillRequest>,
) -> Result<StatusCode, ApiError> {
    FillsDao::new(&state.storage)
        .record_fill(character_id, req.type_id, req.is_buy, req.price, req.quantity)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Portfolio summary for a character's realized fill history: FIFO-matched
/// trades, the resulting drawdown from the realized-P&L curve, and
/// Sharpe/VaR/ES over the daily realized-P&L series (SPEC_FULL.md §4.6).
/// This is read-only computed state, not a streamed scan, since it has no
/// progress phases.
#[derive(Debug, serde::Serialize)]
struct PortfolioSummary {
    character_id: u64,
    trade_count: usize,
    total_realized_pnl: f64,
    drawdown_fraction: f64,
    sharpe_ratio: Option<f64>,
    value_at_risk_95: Option<f64>,
    expected_shortfall_95: Option<f64>,
}

async fn character_portfolio(
    State(state): State<Arc<AppState>>,
    AxumPath(character_id): AxumPath<u64>,
) -> Result<Json<PortfolioSummary>, ApiError> {
    let fills = FillsDao::new(&state.storage).fills_for_character(character_id).await?;

    let mut matcher = FifoMatcher::new();
    let mut drawdown = DrawdownTracker::new();
    let mut daily: std::collections::BTreeMap<chrono::NaiveDate, Decimal> = std::collections::BTreeMap::new();
    let mut realized = Vec::new();
    for fill in &fills {
        for trade in matcher.apply(fill) {
            drawdown.record_pnl(character_id, trade.realized_pnl);
            *daily.entry(fill.filled_at.date_naive()).or_insert(Decimal::ZERO) += trade.realized_pnl;
            realized.push(trade);
        }
    }

    let daily_returns: Vec<Decimal> = daily.into_values().collect();
    let sharpe = SharpeRatio::from_returns(Decimal::ZERO, &daily_returns).and_then(|s| s.value.to_f64());
    let var_95 = historical_var(&daily_returns, Decimal::from_f64_retain(0.95).unwrap_or(Decimal::ZERO))
        .ok()
        .and_then(|v| v.to_f64());
    let es_95 = historical_es(&daily_returns, Decimal::from_f64_retain(0.95).unwrap_or(Decimal::ZERO))
        .ok()
        .and_then(|v| v.to_f64());

    Ok(Json(PortfolioSummary {
        character_id,
        trade_count: realized.len(),
        total_realized_pnl: realized.iter().map(|t| t.realized_pnl).sum::<Decimal>().to_f64().unwrap_or(0.0),
        drawdown_fraction: drawdown.drawdown(character_id).to_f64().unwrap_or(0.0),
        sharpe_ratio: sharpe,
        value_at_risk_95: var_95,
        expected_shortfall_95: es_95,
    }))
}

/// Thin wrapper translating orchestrator/storage errors to HTTP statuses
/// without leaking internal error detail into every handler signature.
struct ApiError(crate::error::OrchestratorError);

impl From<flipper_storage::StorageError> for ApiError {
    fn from(err: flipper_storage::StorageError) -> Self {
        Self(crate::error::OrchestratorError::Storage(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()).into_response()
    }
}
