//! Shared cycle state for the /health endpoint.
//! Updated by the scheduler loop, read by the API.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::types::CycleStats;

#[derive(Default)]
pub struct HealthState {
    /// True while a reconciliation cycle is running.
    pub cycle_running: AtomicBool,
    pub cycles_completed: AtomicU64,
    pub cycles_failed: AtomicU64,
    last_cycle: Mutex<Option<CycleStats>>,
    last_error: Mutex<Option<String>>,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cycle_started(&self) {
        self.cycle_running.store(true, Ordering::Relaxed);
    }

    pub fn cycle_succeeded(&self, stats: CycleStats) {
        self.cycle_running.store(false, Ordering::Relaxed);
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_cycle.lock() {
            *last = Some(stats);
        }
    }

    pub fn cycle_failed(&self, error: String) {
        self.cycle_running.store(false, Ordering::Relaxed);
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_error.lock() {
            *last = Some(error);
        }
    }

    pub fn cycle_running(&self) -> bool {
        self.cycle_running.load(Ordering::Relaxed)
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed.load(Ordering::Relaxed)
    }

    pub fn cycles_failed(&self) -> u64 {
        self.cycles_failed.load(Ordering::Relaxed)
    }

    pub fn last_cycle(&self) -> Option<CycleStats> {
        self.last_cycle.lock().ok().and_then(|l| l.clone())
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|l| l.clone())
    }
}
