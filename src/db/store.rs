use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

use crate::db::models::ListingRow;
use crate::error::Result;
use crate::types::ListingRecord;

/// Durable table of listing records keyed by URL.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every record, in row order.
    async fn load_all(&self) -> Result<Vec<ListingRecord>>;

    /// Replace the whole table with `records` in one all-or-nothing write.
    async fn replace_all(&self, records: &[ListingRecord]) -> Result<()>;

    /// Append records whose URL is not tracked yet. Returns how many were added.
    async fn seed(&self, records: &[ListingRecord]) -> Result<usize>;
}

const SELECT_ALL: &str = r#"
    SELECT url, picture, address, city_state, list_price, list_date,
           pending_date, pending_price_estimate, off_market_date, off_market_price_estimate,
           sold_date, sold_price, sold_record_date,
           days_before_pending, days_to_close, list_estimate_delta, list_sold_delta
    FROM listings
    ORDER BY row_index ASC
"#;

const INSERT: &str = r#"
    INSERT OR IGNORE INTO listings (
        row_index, url, picture, address, city_state, list_price, list_date,
        pending_date, pending_price_estimate, off_market_date, off_market_price_estimate,
        sold_date, sold_price, sold_record_date,
        days_before_pending, days_to_close, list_estimate_delta, list_sold_delta
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Wrap an existing pool. Migrations are expected to have run.
    #[cfg(test)]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database file and run migrations.
    pub async fn connect(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database ready at {db_path}");
        Ok(Self { pool })
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn load_all(&self) -> Result<Vec<ListingRecord>> {
        let rows: Vec<ListingRow> = sqlx::query_as(SELECT_ALL).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(ListingRecord::from).collect())
    }

    async fn replace_all(&self, records: &[ListingRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM listings").execute(&mut *tx).await?;
        for (i, record) in records.iter().enumerate() {
            insert(&mut tx, i as i64, record).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn seed(&self, records: &[ListingRecord]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(row_index) FROM listings")
            .fetch_one(&mut *tx)
            .await?;
        let mut next = max.map_or(0, |m| m + 1);
        let mut added = 0usize;
        for record in records {
            if insert(&mut tx, next, record).await? {
                next += 1;
                added += 1;
            }
        }
        tx.commit().await?;
        Ok(added)
    }
}

/// Insert one record at `row_index`. Returns false if the URL already exists.
async fn insert(
    tx: &mut Transaction<'_, Sqlite>,
    row_index: i64,
    r: &ListingRecord,
) -> Result<bool> {
    let result = sqlx::query(INSERT)
        .bind(row_index)
        .bind(r.url.as_str())
        .bind(r.derived.picture_formula.as_deref())
        .bind(r.address.as_deref())
        .bind(r.city_state.as_deref())
        .bind(r.list_price.as_deref())
        .bind(r.list_date.as_deref())
        .bind(r.pending_date.as_deref())
        .bind(r.pending_price_estimate.as_deref())
        .bind(r.off_market_date.as_deref())
        .bind(r.off_market_price_estimate.as_deref())
        .bind(r.sold_date.as_deref())
        .bind(r.sold_price.as_deref())
        .bind(r.sold_record_date.as_deref())
        .bind(r.derived.days_before_pending_formula.as_deref())
        .bind(r.derived.days_to_close_formula.as_deref())
        .bind(r.derived.list_estimate_delta_formula.as_deref())
        .bind(r.derived.list_sold_delta_formula.as_deref())
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// One connection only: every `sqlite::memory:` connection is its own database.
    pub(crate) async fn memory_store() -> SqliteRecordStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        SqliteRecordStore::new(pool)
    }

    fn record(url: &str) -> ListingRecord {
        ListingRecord::new(url)
    }

    #[tokio::test]
    async fn seed_skips_existing_urls_and_appends_rows() {
        let store = memory_store().await;
        assert_eq!(store.seed(&[record("A"), record("B")]).await.unwrap(), 2);
        assert_eq!(store.seed(&[record("B"), record("C")]).await.unwrap(), 1);

        let urls: Vec<String> = store.load_all().await.unwrap().into_iter().map(|r| r.url).collect();
        assert_eq!(urls, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn replace_all_round_trips_fields_and_empties() {
        let store = memory_store().await;
        store.seed(&[record("A"), record("B")]).await.unwrap();

        let mut records = store.load_all().await.unwrap();
        records[1].list_date = Some("01/05/2024".to_string());
        records[1].derived.days_before_pending_formula = Some("=MINUS(G3,F3)".to_string());
        store.replace_all(&records).await.unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded, records);
        assert_eq!(loaded[0].list_date, None);
    }

    #[tokio::test]
    async fn empty_strings_load_as_empty() {
        let store = memory_store().await;
        sqlx::query("INSERT INTO listings (row_index, url, sold_date) VALUES (0, 'A', '')")
            .execute(&store.pool)
            .await
            .unwrap();
        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded[0].sold_date, None);
        assert!(!loaded[0].is_terminal());
    }
}
