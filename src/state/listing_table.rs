use std::collections::HashMap;

use tracing::warn;

use crate::config::FIRST_DATA_ROW;
use crate::types::ListingRecord;

// ---------------------------------------------------------------------------
// ListingTable
// ---------------------------------------------------------------------------

/// The single mutable in-memory copy of the record store for one cycle.
///
/// Row order is the store's order and is what formula row addressing is based
/// on: `rows[i]` lives on sheet row `i + FIRST_DATA_ROW`.
#[derive(Debug, Default, Clone)]
pub struct ListingTable {
    rows: Vec<ListingRecord>,
    /// url → position in `rows`
    index: HashMap<String, usize>,
}

impl ListingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from records in store order. A duplicate URL keeps its
    /// first occurrence.
    pub fn from_records(records: Vec<ListingRecord>) -> Self {
        let mut table = Self::new();
        for record in records {
            if table.index.contains_key(&record.url) {
                warn!(url = %record.url, "Duplicate listing URL in store, keeping first row");
                continue;
            }
            table.index.insert(record.url.clone(), table.rows.len());
            table.rows.push(record);
        }
        table
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn records(&self) -> &[ListingRecord] {
        &self.rows
    }

    #[cfg(test)]
    pub fn get(&self, url: &str) -> Option<&ListingRecord> {
        let &pos = self.index.get(url)?;
        self.rows.get(pos)
    }

    /// Mutable record together with its sheet row.
    pub fn get_mut_with_row(&mut self, url: &str) -> Option<(&mut ListingRecord, usize)> {
        let &pos = self.index.get(url)?;
        self.rows.get_mut(pos).map(|r| (r, sheet_row(pos)))
    }

    /// Sheet row (1-based, after the header) of a listing.
    #[cfg(test)]
    pub fn sheet_row(&self, url: &str) -> Option<usize> {
        self.index.get(url).map(|&pos| sheet_row(pos))
    }

    /// URLs still awaiting observation, i.e. without a sold date. Borrowed
    /// from the current contents; call again to restart.
    pub fn pending_urls(&self) -> impl Iterator<Item = &str> + '_ {
        self.rows
            .iter()
            .filter(|r| !r.is_terminal())
            .map(|r| r.url.as_str())
    }

    /// Count of terminal (sold) listings.
    pub fn sold_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_terminal()).count()
    }
}

/// Table position → sheet row.
pub fn sheet_row(position: usize) -> usize {
    position + FIRST_DATA_ROW
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str, sold_date: Option<&str>) -> ListingRecord {
        ListingRecord {
            sold_date: sold_date.map(str::to_string),
            ..ListingRecord::new(url)
        }
    }

    #[test]
    fn pending_excludes_sold_listings() {
        let table = ListingTable::from_records(vec![
            record("A", None),
            record("B", Some("03/01/2024")),
            record("C", None),
        ]);
        let pending: Vec<&str> = table.pending_urls().collect();
        assert_eq!(pending, vec!["A", "C"]);
        assert_eq!(table.sold_count(), 1);
    }

    #[test]
    fn pending_is_restartable() {
        let table = ListingTable::from_records(vec![record("A", None), record("B", None)]);
        let first: Vec<&str> = table.pending_urls().collect();
        let second: Vec<&str> = table.pending_urls().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn pending_reflects_current_contents() {
        let mut table = ListingTable::from_records(vec![record("A", None)]);
        assert_eq!(table.pending_urls().count(), 1);
        let (r, _) = table.get_mut_with_row("A").unwrap();
        r.sold_date = Some("03/01/2024".to_string());
        assert_eq!(table.pending_urls().count(), 0);
    }

    #[test]
    fn rows_are_addressed_after_the_header() {
        let table = ListingTable::from_records(vec![record("A", None), record("B", None)]);
        assert_eq!(table.sheet_row("A"), Some(2));
        assert_eq!(table.sheet_row("B"), Some(3));
        assert_eq!(table.sheet_row("missing"), None);
    }

    #[test]
    fn duplicate_urls_keep_first_row() {
        let mut dup = record("A", None);
        dup.address = Some("second".to_string());
        let table = ListingTable::from_records(vec![record("A", None), dup, record("B", None)]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("A").unwrap().address, None);
        assert_eq!(table.sheet_row("B"), Some(3));
    }
}
