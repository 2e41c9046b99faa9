use tracing::debug;

use crate::error::{AppError, Result};
use crate::state::formulas;
use crate::state::ListingTable;
use crate::types::{ApplyOutcome, CandidateUpdate};

/// Listings that still need observation: everything without a sold date.
pub fn select_pending(table: &ListingTable) -> impl Iterator<Item = &str> + '_ {
    table.pending_urls()
}

/// Apply one classified observation to the table.
///
/// The state group is only considered while its guard date is empty, and then
/// only empty fields are filled. Derived formulas are rebuilt for the record's
/// row regardless of the outcome. The URL must already exist in the table.
pub fn apply_observation(
    table: &mut ListingTable,
    url: &str,
    candidate: &CandidateUpdate,
    picture_url: Option<&str>,
) -> Result<ApplyOutcome> {
    let (record, row) = table
        .get_mut_with_row(url)
        .ok_or_else(|| AppError::UnknownListing(url.to_string()))?;

    let outcome = match candidate {
        CandidateUpdate::ForSale { list_price, list_date, address, city_state } => {
            if record.list_date.is_some() {
                ApplyOutcome::AlreadyRecorded
            } else {
                let mut wrote = fill(&mut record.address, address);
                wrote |= fill(&mut record.city_state, city_state);
                wrote |= fill(&mut record.list_price, list_price);
                wrote |= fill(&mut record.list_date, list_date);
                written(wrote)
            }
        }
        CandidateUpdate::Pending { price_estimate, date } => {
            if record.pending_date.is_some() {
                ApplyOutcome::AlreadyRecorded
            } else {
                fill(&mut record.pending_price_estimate, price_estimate);
                record.pending_date = Some(date.clone());
                ApplyOutcome::Applied
            }
        }
        CandidateUpdate::OffMarket { price_estimate, date } => {
            if record.off_market_date.is_some() {
                ApplyOutcome::AlreadyRecorded
            } else {
                fill(&mut record.off_market_price_estimate, price_estimate);
                record.off_market_date = Some(date.clone());
                ApplyOutcome::Applied
            }
        }
        CandidateUpdate::Sold { sold_price, sold_date, record_date } => {
            if record.sold_date.is_some() {
                ApplyOutcome::AlreadyRecorded
            } else {
                let mut wrote = fill(&mut record.sold_price, sold_price);
                wrote |= fill(&mut record.sold_date, sold_date);
                wrote |= fill(&mut record.sold_record_date, &Some(record_date.clone()));
                written(wrote)
            }
        }
        CandidateUpdate::Unrecognized { .. } => ApplyOutcome::Ignored,
    };

    formulas::recompute(&mut record.derived, row, picture_url);

    debug!(url, row, outcome = ?outcome, "Observation applied");
    Ok(outcome)
}

/// Write `value` into `slot` only when the slot is empty and there is a value.
fn fill(slot: &mut Option<String>, value: &Option<String>) -> bool {
    match (slot.as_ref(), value) {
        (None, Some(v)) => {
            *slot = Some(v.clone());
            true
        }
        _ => false,
    }
}

fn written(wrote: bool) -> ApplyOutcome {
    if wrote {
        ApplyOutcome::Applied
    } else {
        ApplyOutcome::NothingToRecord
    }
}
