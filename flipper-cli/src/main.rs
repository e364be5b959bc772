use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use flipper_cli::cli::Cli;
use flipper_cli::http;
use flipper_cli::state::AppState;
use flipper_client::{ClientConfig, UpstreamClient};
use flipper_storage::Storage;
use flipper_universe::{StaticCatalog, UniverseGraph};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let storage = Storage::open(&cli.db_path)?;
    if flipper_storage::legacy_import::import_if_present(&storage, &cli.legacy_config).await? {
        tracing::info!(path = %cli.legacy_config.display(), "imported legacy configuration");
    }
    let catalog = StaticCatalog::load_from_file(&cli.cache_dir.join("catalog.json"))?;
    let graph = UniverseGraph::load_from_file(&cli.cache_dir.join("universe.json"))?;

    let config = flipper_storage::dao::ConfigDao::new(&storage).load().await?;
    let mut client_config = ClientConfig::default();
    client_config.user_agent = config.client_user_agent.clone();
    client_config.rate_per_sec = config.rate_per_sec;
    client_config.burst = config.burst;
    let client = UpstreamClient::new(client_config);
    if let (Some(access_token), Some(refresh_token), Some(expires_at)) =
        (config.access_token.clone(), config.refresh_token.clone(), config.token_expires_at)
    {
        client.set_session(flipper_client::SessionToken { access_token, refresh_token, expires_at });
    }

    let state = AppState {
        storage: Arc::new(storage),
        graph: Arc::new(graph),
        catalog: Arc::new(catalog),
        client: Arc::new(client),
        alert_cooldown: Duration::from_secs(config.alert_cooldown_seconds.max(0) as u64),
    };

    let app = http::router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", cli.port)).await?;
    tracing::info!(port = cli.port, "flipper orchestrator listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
