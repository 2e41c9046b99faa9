use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::api::health::HealthState;
use crate::config::Config;
use crate::db::RecordStore;
use crate::engine::{run_cycle, CycleOptions};
use crate::fetcher::PageSource;
use crate::lifecycle::SystemClock;

/// Re-runs the reconciliation cycle on a fixed interval. Each cycle is
/// independent: a failure is logged and the next tick starts from whatever
/// the store last persisted.
pub struct CycleScheduler {
    store: Arc<dyn RecordStore>,
    source: Arc<dyn PageSource>,
    health: Arc<HealthState>,
    interval_secs: u64,
    opts: CycleOptions,
}

impl CycleScheduler {
    pub fn new(
        cfg: &Config,
        store: Arc<dyn RecordStore>,
        source: Arc<dyn PageSource>,
        health: Arc<HealthState>,
    ) -> Self {
        Self {
            store,
            source,
            health,
            interval_secs: cfg.cycle_interval_secs,
            opts: CycleOptions {
                fetch_concurrency: cfg.fetch_concurrency,
                export_path: cfg.export_csv.as_ref().map(PathBuf::from),
            },
        }
    }

    pub async fn run(self) {
        let mut ticker = interval(Duration::from_secs(self.interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await; // first tick fires immediately
            self.run_once().await;
            info!("Next cycle in {}s", self.interval_secs);
        }
    }

    async fn run_once(&self) {
        self.health.cycle_started();
        match run_cycle(self.store.as_ref(), self.source.as_ref(), &SystemClock, &self.opts).await {
            Ok(stats) => self.health.cycle_succeeded(stats),
            Err(e) => {
                error!("Reconciliation cycle failed: {e}");
                self.health.cycle_failed(e.to_string());
            }
        }
    }
}
