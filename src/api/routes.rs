use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::db::RecordStore;
use crate::error::AppError;
use crate::types::{CycleStats, LifecycleStatus, ListingRecord};

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn RecordStore>,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/listings", get(get_listings))
        .route("/listings/pending", get(get_pending_listings))
        .route("/health", get(get_health))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ListingsQuery {
    /// for_sale | pending | off_market | sold
    pub status: Option<LifecycleStatus>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ListingResponse {
    pub row: usize,
    pub status: Option<LifecycleStatus>,
    #[serde(flatten)]
    pub record: ListingRecord,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub cycle_running: bool,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub last_cycle: Option<CycleStats>,
    pub last_error: Option<String>,
    pub fetch_samples: u64,
    pub fetch_p50_ms: Option<u64>,
    pub fetch_p95_ms: Option<u64>,
    pub fetch_p99_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_listings(
    State(state): State<ApiState>,
    Query(params): Query<ListingsQuery>,
) -> Result<Json<Vec<ListingResponse>>, AppError> {
    let records = state.store.load_all().await?;
    let listings = to_responses(records)
        .filter(|l| params.status.map_or(true, |s| l.status == Some(s)))
        .collect();
    Ok(Json(listings))
}

async fn get_pending_listings(
    State(state): State<ApiState>,
) -> Result<Json<Vec<ListingResponse>>, AppError> {
    let records = state.store.load_all().await?;
    let listings = to_responses(records)
        .filter(|l| !l.record.is_terminal())
        .collect();
    Ok(Json(listings))
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let (p50, p95, p99) = state.latency.percentiles();
    Json(HealthResponse {
        cycle_running: state.health.cycle_running(),
        cycles_completed: state.health.cycles_completed(),
        cycles_failed: state.health.cycles_failed(),
        last_cycle: state.health.last_cycle(),
        last_error: state.health.last_error(),
        fetch_samples: state.latency.len(),
        fetch_p50_ms: p50,
        fetch_p95_ms: p95,
        fetch_p99_ms: p99,
    })
}

fn to_responses(records: Vec<ListingRecord>) -> impl Iterator<Item = ListingResponse> {
    records
        .into_iter()
        .enumerate()
        .map(|(i, record)| ListingResponse {
            row: crate::state::listing_table::sheet_row(i),
            status: record.lifecycle(),
            record,
        })
}
