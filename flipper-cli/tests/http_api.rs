use std::sync::Arc;
use std::time::Duration;

use flipper_cli::http;
use flipper_cli::state::AppState;
use flipper_client::{ClientConfig, UpstreamClient};
use flipper_storage::Storage;
use flipper_universe::{StaticCatalog, UniverseGraph};

/// Boots the orchestrator's HTTP surface over an in-memory store and an
/// empty universe/catalog, on an OS-assigned port, and returns its base
/// URL. Mirrors the router construction in `main.rs` without touching a
/// real upstream client or persisted config.
async fn spawn_app() -> String {
    let storage = Storage::open_in_memory().expect("open in-memory storage");
    let graph = UniverseGraph::new(Vec::new(), &[]);
    let catalog = StaticCatalog::new(Vec::new(), Vec::new());
    let client = UpstreamClient::new(ClientConfig::default());

    let state = AppState {
        storage: Arc::new(storage),
        graph: Arc::new(graph),
        catalog: Arc::new(catalog),
        client: Arc::new(client),
        alert_cooldown: Duration::from_secs(3600),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let app = http::router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    format!("http://{addr}")
}

#[tokio::test]
async fn watchlist_and_config_round_trip_over_http() {
    let base = spawn_app().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{base}/watchlist"))
        .json(&serde_json::json!({ "type_id": 34 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 204);

    let listed: Vec<flipper_storage::WatchlistItem> = client
        .get(format!("{base}/watchlist"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].type_id, 34);

    let res = client
        .put(format!("{base}/watchlist/34/alert"))
        .json(&serde_json::json!({ "metric": "total_profit", "threshold": 1_000_000.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 204);

    let res = client.delete(format!("{base}/watchlist/34")).send().await.unwrap();
    assert_eq!(res.status(), 204);

    let listed_after: Vec<flipper_storage::WatchlistItem> =
        client.get(format!("{base}/watchlist")).send().await.unwrap().json().await.unwrap();
    assert!(listed_after.is_empty());

    let config: flipper_storage::Config = client.get(format!("{base}/config")).send().await.unwrap().json().await.unwrap();
    assert_eq!(config, flipper_storage::Config::default());

    let mut updated = config.clone();
    updated.rate_per_sec = 7.5;
    let res = client.put(format!("{base}/config")).json(&updated).send().await.unwrap();
    assert_eq!(res.status(), 204);

    let reloaded: flipper_storage::Config = client.get(format!("{base}/config")).send().await.unwrap().json().await.unwrap();
    assert_eq!(reloaded.rate_per_sec, 7.5);
}

#[tokio::test]
async fn character_portfolio_reflects_fifo_realized_pnl() {
    let base = spawn_app().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{base}/characters"))
        .json(&serde_json::json!({ "character_id": 1, "name": "Test Pilot" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 204);

    let res = client
        .post(format!("{base}/characters/1/fills"))
        .json(&serde_json::json!({ "type_id": 34, "is_buy": true, "price": 5.0, "quantity": 1000 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 204);

    let res = client
        .post(format!("{base}/characters/1/fills"))
        .json(&serde_json::json!({ "type_id": 34, "is_buy": false, "price": 6.0, "quantity": 400 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 204);

    let portfolio: serde_json::Value = client
        .get(format!("{base}/characters/1/portfolio"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(portfolio["character_id"], 1);
    assert_eq!(portfolio["trade_count"], 1);
    assert_eq!(portfolio["total_realized_pnl"], 400.0);
    assert_eq!(portfolio["drawdown_fraction"], 0.0);
}

#[tokio::test]
async fn radius_flip_scan_streams_an_error_for_an_unknown_origin() {
    let base = spawn_app().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{base}/scans/radius-flip"))
        .json(&serde_json::json!({
            "origin_system_id": 999,
            "buy_radius_jumps": 2,
            "sell_radius_jumps": 2,
            "cargo_m3": 500.0,
        }))
        .send()
        .await
        .unwrap();

    assert!(res.status().is_success());
    let body = res.text().await.unwrap();
    assert!(body.contains("\"kind\":\"error\""), "expected an error event in the stream, got: {body}");
    assert!(body.contains("unknown origin system 999"));
}
