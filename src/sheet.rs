//! CSV form of the listing sheet.
//!
//! Import accepts either a sheet with a header row using the column layout
//! names (only "URL" is required, unknown columns are ignored) or a bare list
//! of URLs, one per line. Export always writes the full layout, empty cells as
//! `""` and formulas as text so a spreadsheet evaluates them on load.

use std::io::{Read, Write};
use std::path::Path;

use crate::error::Result;
use crate::types::{non_blank, Column, ListingRecord};

pub fn read_seed_file(path: impl AsRef<Path>) -> Result<Vec<ListingRecord>> {
    let file = std::fs::File::open(path)?;
    read_seed(file)
}

pub fn read_seed<R: Read>(reader: R) -> Result<Vec<ListingRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = rdr.records();
    let Some(first) = rows.next().transpose()? else {
        return Ok(Vec::new());
    };

    let header: Vec<Option<Column>> = first.iter().map(Column::from_header).collect();
    let mut records = Vec::new();

    if let Some(url_idx) = header.iter().position(|c| *c == Some(Column::Url)) {
        for row in rows {
            let row = row?;
            let Some(url) = row.get(url_idx).and_then(non_blank) else {
                continue;
            };
            let mut record = ListingRecord::new(url);
            for (cell, column) in row.iter().zip(header.iter()) {
                if let Some(column) = column {
                    record.set(*column, cell);
                }
            }
            records.push(record);
        }
    } else {
        for row in std::iter::once(Ok(first)).chain(rows) {
            let row = row?;
            if let Some(url) = row.get(0).and_then(non_blank) {
                records.push(ListingRecord::new(url));
            }
        }
    }

    Ok(records)
}

pub fn write_sheet_file(path: impl AsRef<Path>, records: &[ListingRecord]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_sheet(file, records)
}

pub fn write_sheet<W: Write>(writer: W, records: &[ListingRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(Column::ALL.iter().map(|c| c.header()))?;
    for record in records {
        wtr.write_record(Column::ALL.iter().map(|&c| record.get(c).unwrap_or("")))?;
    }
    wtr.flush()?;
    Ok(())
}
