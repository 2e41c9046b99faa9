use std::path::PathBuf;
use std::time::Instant;

use futures_util::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::config::FETCH_CONCURRENCY;
use crate::db::RecordStore;
use crate::engine::{apply_observation, select_pending};
use crate::error::Result;
use crate::fetcher::PageSource;
use crate::lifecycle::{classify, Clock};
use crate::sheet;
use crate::state::ListingTable;
use crate::types::{ApplyOutcome, CandidateUpdate, CycleStats};

#[derive(Debug, Clone)]
pub struct CycleOptions {
    pub fetch_concurrency: usize,
    /// Write the sheet here after a successful flush.
    pub export_path: Option<PathBuf>,
}

impl Default for CycleOptions {
    fn default() -> Self {
        Self {
            fetch_concurrency: FETCH_CONCURRENCY,
            export_path: None,
        }
    }
}

/// One reconciliation cycle: load the store, observe every pending listing,
/// apply observations one at a time, then flush the whole table once.
///
/// Nothing is persisted unless the cycle reaches the flush. A fetch failure
/// only skips that listing; an unknown listing or a store error aborts.
pub async fn run_cycle(
    store: &dyn RecordStore,
    source: &dyn PageSource,
    clock: &dyn Clock,
    opts: &CycleOptions,
) -> Result<CycleStats> {
    let started = Instant::now();
    let today = clock.today();

    let mut table = ListingTable::from_records(store.load_all().await?);
    let pending: Vec<String> = select_pending(&table).map(str::to_owned).collect();

    let mut stats = CycleStats {
        selected: pending.len(),
        ..CycleStats::default()
    };
    info!(
        total = table.len(),
        pending = pending.len(),
        sold = table.sold_count(),
        %today,
        "Cycle started: {} of {} listings pending",
        pending.len(),
        table.len(),
    );

    let mut observations = stream::iter(pending.into_iter().map(|url| async move {
        let result = source.fetch(&url).await;
        (url, result)
    }))
    .buffer_unordered(opts.fetch_concurrency.max(1));

    while let Some((url, result)) = observations.next().await {
        let snapshot = match result {
            Ok(s) => s,
            Err(e) => {
                warn!(url = %url, "Fetch failed, listing stays pending: {e}");
                stats.fetch_failed += 1;
                continue;
            }
        };

        let candidate = classify(&snapshot, today);
        if let CandidateUpdate::Unrecognized { label } = &candidate {
            warn!(url = %url, label = ?label, "Unrecognized listing status, dates left untouched");
        }

        match apply_observation(&mut table, &url, &candidate, snapshot.picture_url.as_deref())? {
            ApplyOutcome::Applied => {
                info!(url = %url, status = ?candidate.status(), "Recorded new lifecycle state");
                stats.applied += 1;
            }
            ApplyOutcome::AlreadyRecorded => stats.already_recorded += 1,
            ApplyOutcome::NothingToRecord => stats.nothing_to_record += 1,
            ApplyOutcome::Ignored => stats.ignored += 1,
        }
    }
    drop(observations);

    store.replace_all(table.records()).await?;
    stats.flushed_rows = table.len();
    stats.finished_at = chrono::Utc::now().timestamp();

    if let Some(path) = &opts.export_path {
        match sheet::write_sheet_file(path, table.records()) {
            Ok(()) => info!(path = %path.display(), rows = table.len(), "Sheet exported"),
            Err(e) => warn!(path = %path.display(), "Sheet export failed: {e}"),
        }
    }

    info!(
        selected = stats.selected,
        applied = stats.applied,
        already_recorded = stats.already_recorded,
        nothing_to_record = stats.nothing_to_record,
        ignored = stats.ignored,
        fetch_failed = stats.fetch_failed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Cycle complete: {} applied, {} unchanged, {} ignored, {} failed",
        stats.applied,
        stats.already_recorded + stats.nothing_to_record,
        stats.ignored,
        stats.fetch_failed,
    );

    Ok(stats)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use super::*;
    use crate::db::store::tests::memory_store;
    use crate::db::SqliteRecordStore;
    use crate::error::AppError;
    use crate::lifecycle::FixedClock;
    use crate::types::{ListingRecord, PageSnapshot};

    /// Serves canned snapshots and remembers which URLs were requested.
    #[derive(Default)]
    struct FakeSource {
        pages: Mutex<HashMap<String, PageSnapshot>>,
        requested: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn set(&self, url: &str, snapshot: PageSnapshot) {
            self.pages.lock().unwrap().insert(url.to_string(), snapshot);
        }

        fn requested(&self) -> Vec<String> {
            let mut r = self.requested.lock().unwrap().clone();
            r.sort();
            r
        }
    }

    #[async_trait]
    impl PageSource for FakeSource {
        async fn fetch(&self, url: &str) -> Result<PageSnapshot> {
            self.requested.lock().unwrap().push(url.to_string());
            self.pages
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .ok_or_else(|| AppError::HttpStatus { status: 404, url: url.to_string() })
        }
    }

    /// Delegates to SQLite but can be told to fail the flush.
    struct FlakyStore {
        inner: SqliteRecordStore,
        fail_flush: AtomicBool,
    }

    #[async_trait]
    impl RecordStore for FlakyStore {
        async fn load_all(&self) -> Result<Vec<ListingRecord>> {
            self.inner.load_all().await
        }

        async fn replace_all(&self, records: &[ListingRecord]) -> Result<()> {
            if self.fail_flush.load(Ordering::Relaxed) {
                return Err(AppError::Io(std::io::Error::other("store unavailable")));
            }
            self.inner.replace_all(records).await
        }

        async fn seed(&self, records: &[ListingRecord]) -> Result<usize> {
            self.inner.seed(records).await
        }
    }

    fn clock(y: i32, m: u32, d: u32) -> FixedClock {
        FixedClock(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn page(status: &str, days: Option<u32>) -> PageSnapshot {
        PageSnapshot {
            status: Some(status.to_string()),
            address: Some("12 Elm St".to_string()),
            city_state: Some("Austin, TX 78701".to_string()),
            price: Some("$450,000".to_string()),
            days_on_site: days,
            sold_date_text: Some("Mar 01, 2024".to_string()),
            picture_url: Some("https://img.example/a.jpg".to_string()),
        }
    }

    async fn seeded(urls: &[&str]) -> SqliteRecordStore {
        let store = memory_store().await;
        let records: Vec<ListingRecord> = urls.iter().map(|u| ListingRecord::new(*u)).collect();
        store.seed(&records).await.unwrap();
        store
    }

    #[tokio::test]
    async fn list_date_is_kept_across_cycles() {
        let store = seeded(&["A"]).await;
        let source = FakeSource::default();
        let opts = CycleOptions::default();

        source.set("A", page("FOR SALE", Some(5)));
        let stats = run_cycle(&store, &source, &clock(2024, 1, 10), &opts).await.unwrap();
        assert_eq!(stats.applied, 1);
        let a = &store.load_all().await.unwrap()[0];
        assert_eq!(a.list_date.as_deref(), Some("01/05/2024"));
        assert_eq!(a.derived.days_before_pending_formula.as_deref(), Some("=MINUS(G2,F2)"));

        source.set("A", page("FOR SALE", Some(2)));
        let stats = run_cycle(&store, &source, &clock(2024, 1, 12), &opts).await.unwrap();
        assert_eq!(stats.already_recorded, 1);
        let a = &store.load_all().await.unwrap()[0];
        assert_eq!(a.list_date.as_deref(), Some("01/05/2024"));
    }

    #[tokio::test]
    async fn sold_listings_are_not_fetched() {
        let store = seeded(&["A", "B"]).await;
        let source = FakeSource::default();
        source.set("A", page("SOLD", None));
        source.set("B", page("PENDING", None));
        let opts = CycleOptions::default();

        run_cycle(&store, &source, &clock(2024, 3, 15), &opts).await.unwrap();
        let records = store.load_all().await.unwrap();
        assert_eq!(records[0].sold_date.as_deref(), Some("03/01/2024"));
        assert_eq!(records[0].sold_record_date.as_deref(), Some("03/15/2024"));
        assert_eq!(records[1].pending_date.as_deref(), Some("03/15/2024"));

        let second = FakeSource::default();
        second.set("B", page("SOLD", None));
        let stats = run_cycle(&store, &second, &clock(2024, 3, 20), &opts).await.unwrap();
        assert_eq!(stats.selected, 1);
        assert_eq!(second.requested(), vec!["B"]);
    }

    #[tokio::test]
    async fn open_sold_group_without_new_fields_is_counted_separately() {
        let store = seeded(&["A"]).await;
        let source = FakeSource::default();
        let mut sold = page("SOLD", None);
        sold.sold_date_text = Some("NEW".to_string());
        source.set("A", sold);
        let opts = CycleOptions::default();

        let stats = run_cycle(&store, &source, &clock(2024, 3, 15), &opts).await.unwrap();
        assert_eq!(stats.applied, 1);

        let stats = run_cycle(&store, &source, &clock(2024, 3, 16), &opts).await.unwrap();
        assert_eq!(stats.selected, 1);
        assert_eq!(stats.nothing_to_record, 1);
        assert_eq!(stats.already_recorded, 0);
        let a = &store.load_all().await.unwrap()[0];
        assert_eq!(a.sold_date, None);
        assert_eq!(a.sold_record_date.as_deref(), Some("03/15/2024"));
    }

    #[tokio::test]
    async fn fetch_failure_skips_only_that_listing() {
        let store = seeded(&["A", "B"]).await;
        let source = FakeSource::default();
        source.set("A", page("PENDING", None));
        let opts = CycleOptions::default();

        let stats = run_cycle(&store, &source, &clock(2024, 3, 15), &opts).await.unwrap();
        assert_eq!(stats.fetch_failed, 1);
        assert_eq!(stats.applied, 1);
        assert_eq!(stats.flushed_rows, 2);
        let records = store.load_all().await.unwrap();
        assert_eq!(records[1], ListingRecord::new("B"));
    }

    #[tokio::test]
    async fn unrecognized_status_refreshes_formulas_only() {
        let store = seeded(&["A"]).await;
        let source = FakeSource::default();
        source.set("A", page("COMING SOON", Some(3)));

        let stats = run_cycle(&store, &source, &clock(2024, 3, 15), &CycleOptions::default())
            .await
            .unwrap();
        assert_eq!(stats.ignored, 1);
        let a = &store.load_all().await.unwrap()[0];
        assert_eq!(a.list_date, None);
        assert_eq!(a.address, None);
        assert_eq!(a.derived.list_sold_delta_formula.as_deref(), Some("=MINUS(L2,E2)"));
        assert_eq!(a.derived.picture_formula.as_deref(), Some("=IMAGE(\"https://img.example/a.jpg\")"));
    }

    #[tokio::test]
    async fn failed_flush_leaves_previous_state() {
        let store = FlakyStore {
            inner: seeded(&["A"]).await,
            fail_flush: AtomicBool::new(true),
        };
        let source = FakeSource::default();
        source.set("A", page("FOR SALE", Some(5)));

        let result = run_cycle(&store, &source, &clock(2024, 1, 10), &CycleOptions::default()).await;
        assert!(result.is_err());
        assert_eq!(store.load_all().await.unwrap()[0], ListingRecord::new("A"));

        store.fail_flush.store(false, Ordering::Relaxed);
        run_cycle(&store, &source, &clock(2024, 1, 10), &CycleOptions::default())
            .await
            .unwrap();
        assert_eq!(store.load_all().await.unwrap()[0].list_date.as_deref(), Some("01/05/2024"));
    }

    #[tokio::test]
    async fn export_writes_sheet_after_flush() {
        let store = seeded(&["A"]).await;
        let source = FakeSource::default();
        source.set("A", page("FOR SALE", Some(5)));
        let path = std::env::temp_dir().join(format!("listing-export-{}.csv", std::process::id()));
        let opts = CycleOptions {
            export_path: Some(path.clone()),
            ..CycleOptions::default()
        };

        run_cycle(&store, &source, &clock(2024, 1, 10), &opts).await.unwrap();
        let exported = sheet::read_seed_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(exported, store.load_all().await.unwrap());
    }
}
