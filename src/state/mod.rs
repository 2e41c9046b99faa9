pub mod formulas;
pub mod listing_table;

pub use listing_table::ListingTable;
