//! Spreadsheet formulas for the derived columns.
//!
//! Formulas reference sibling cells on the same row by column letter, so they
//! are only valid for the row they were built for.

use crate::types::{Column, DerivedFields};

/// `=MINUS(<a><row>,<b><row>)`
pub fn minus(a: Column, b: Column, row: usize) -> String {
    format!("=MINUS({}{row},{}{row})", a.letter(), b.letter())
}

/// `=IMAGE("<url>")`, with embedded quotes doubled.
pub fn image(url: &str) -> String {
    format!("=IMAGE(\"{}\")", url.replace('"', "\"\""))
}

/// Rebuild every derived field for `row`. The picture keeps its previous value
/// when the page offered no image.
pub fn recompute(derived: &mut DerivedFields, row: usize, picture_url: Option<&str>) {
    if let Some(url) = picture_url {
        derived.picture_formula = Some(image(url));
    }
    derived.days_before_pending_formula =
        Some(minus(Column::PendingDate, Column::ListDate, row));
    derived.days_to_close_formula = Some(minus(Column::OffMarketDate, Column::ListDate, row));
    derived.list_estimate_delta_formula =
        Some(minus(Column::PendingPriceEstimate, Column::ListPrice, row));
    derived.list_sold_delta_formula = Some(minus(Column::SoldPrice, Column::ListPrice, row));
}
