use std::path::PathBuf;

use clap::Parser;

/// Orchestrator binary: one HTTP surface over the universe, client,
/// engine, storage, and alert crates (SPEC_FULL.md §4.5, component C9).
#[derive(Parser, Debug)]
#[command(name = "flipper", about = "Arbitrage scanner orchestrator")]
pub struct Cli {
    /// Port the HTTP surface listens on.
    #[arg(long, default_value_t = 13370)]
    pub port: u16,

    /// Path to the embedded SQLite store.
    #[arg(long, default_value = "flipper.db")]
    pub db_path: PathBuf,

    /// Directory holding the static universe/item-type catalog dump.
    #[arg(long, default_value = "cache")]
    pub cache_dir: PathBuf,

    /// Legacy on-disk JSON config to import once on first startup, if present.
    #[arg(long, default_value = "flipper-legacy-config.json")]
    pub legacy_config: PathBuf,

    /// Emit structured JSON logs instead of the default human-readable format.
    #[arg(long, default_value_t = false)]
    pub log_json: bool,
}
