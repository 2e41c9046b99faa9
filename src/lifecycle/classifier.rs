use chrono::NaiveDate;

use crate::lifecycle::dates::{format_date, infer_from_elapsed, parse_absolute};
use crate::types::{CandidateUpdate, LifecycleStatus, PageSnapshot};

/// Map a page snapshot to the write-once field group its status implies.
/// Pure: the same snapshot and `today` always give the same update.
pub fn classify(snapshot: &PageSnapshot, today: NaiveDate) -> CandidateUpdate {
    let status = snapshot.status.as_deref().and_then(LifecycleStatus::from_label);

    let Some(status) = status else {
        return CandidateUpdate::Unrecognized {
            label: snapshot.status.clone(),
        };
    };

    match status {
        LifecycleStatus::ForSale => CandidateUpdate::ForSale {
            list_price: snapshot.price.clone(),
            list_date: snapshot
                .days_on_site
                .and_then(|days| infer_from_elapsed(days, today)),
            address: snapshot.address.clone(),
            city_state: snapshot.city_state.clone(),
        },
        LifecycleStatus::Pending => CandidateUpdate::Pending {
            price_estimate: snapshot.price.clone(),
            date: format_date(today),
        },
        LifecycleStatus::OffMarket => CandidateUpdate::OffMarket {
            price_estimate: snapshot.price.clone(),
            date: format_date(today),
        },
        LifecycleStatus::Sold => CandidateUpdate::Sold {
            sold_price: snapshot.price.clone(),
            sold_date: snapshot.sold_date_text.as_deref().and_then(parse_absolute),
            record_date: format_date(today),
        },
    }
}
