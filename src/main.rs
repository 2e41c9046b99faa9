mod api;
mod config;
mod db;
mod engine;
mod error;
mod fetcher;
mod lifecycle;
mod scheduler;
mod sheet;
mod state;
mod types;

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::db::{RecordStore, SqliteRecordStore};
use crate::error::Result;
use crate::fetcher::HttpPageSource;
use crate::scheduler::CycleScheduler;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Record store ---
    let store = Arc::new(SqliteRecordStore::connect(&cfg.db_path).await?);

    // --- Seed import: the only place records are created ---
    if let Some(path) = &cfg.seed_csv {
        let records = sheet::read_seed_file(path)?;
        let added = store.seed(&records).await?;
        info!(
            path = %path,
            rows = records.len(),
            added,
            "Seed import: {added} new listings from {} rows",
            records.len(),
        );
    }

    let tracked = store.load_all().await?;
    if tracked.is_empty() {
        warn!("No listings tracked yet. Set SEED_CSV to a sheet or a list of listing URLs.");
    } else {
        info!(
            "Tracking {} listings ({} sold)",
            tracked.len(),
            tracked.iter().filter(|r| r.is_terminal()).count(),
        );
    }

    // --- Shared state ---
    let health = Arc::new(HealthState::new());
    let latency = Arc::new(LatencyStats::new());
    let source = Arc::new(HttpPageSource::new(&cfg, Arc::clone(&latency))?);

    // --- Reconciliation cycles (background, every CYCLE_INTERVAL_SECS) ---
    let scheduler = CycleScheduler::new(&cfg, store.clone(), source, Arc::clone(&health));
    tokio::spawn(async move { scheduler.run().await });

    // --- HTTP API server ---
    let api_state = ApiState { store, health, latency };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
