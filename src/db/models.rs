//! Row type for the `listings` table, selected in `row_index` order (see migrations/0001_create_listings.sql).
//! `NULL` is the store's empty marker; it maps to `None` on both sides.

use crate::types::{DerivedFields, ListingRecord};

#[derive(Debug, sqlx::FromRow)]
pub struct ListingRow {
    pub url: String,
    pub picture: Option<String>,
    pub address: Option<String>,
    pub city_state: Option<String>,
    pub list_price: Option<String>,
    pub list_date: Option<String>,
    pub pending_date: Option<String>,
    pub pending_price_estimate: Option<String>,
    pub off_market_date: Option<String>,
    pub off_market_price_estimate: Option<String>,
    pub sold_date: Option<String>,
    pub sold_price: Option<String>,
    pub sold_record_date: Option<String>,
    pub days_before_pending: Option<String>,
    pub days_to_close: Option<String>,
    pub list_estimate_delta: Option<String>,
    pub list_sold_delta: Option<String>,
}

/// Empty strings written by older tools count as empty.
fn cell(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

impl From<ListingRow> for ListingRecord {
    fn from(r: ListingRow) -> Self {
        ListingRecord {
            url: r.url,
            address: cell(r.address),
            city_state: cell(r.city_state),
            list_price: cell(r.list_price),
            list_date: cell(r.list_date),
            pending_price_estimate: cell(r.pending_price_estimate),
            pending_date: cell(r.pending_date),
            off_market_price_estimate: cell(r.off_market_price_estimate),
            off_market_date: cell(r.off_market_date),
            sold_price: cell(r.sold_price),
            sold_date: cell(r.sold_date),
            sold_record_date: cell(r.sold_record_date),
            derived: DerivedFields {
                picture_formula: cell(r.picture),
                days_before_pending_formula: cell(r.days_before_pending),
                days_to_close_formula: cell(r.days_to_close),
                list_estimate_delta_formula: cell(r.list_estimate_delta),
                list_sold_delta_formula: cell(r.list_sold_delta),
            },
        }
    }
}
