//! Date inference for listing pages.
//!
//! Pages carry dates in two shapes: a relative "N days on site" feature and an
//! absolute "Mon DD, YYYY" tag. Both normalize to `MM/DD/YYYY`. A value that
//! cannot be interpreted is simply absent; it never fails the observation.

use chrono::{Days, Local, NaiveDate};

use crate::config::date_formats;

/// Source of "today" for inference and for dates stamped at observation time.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local calendar date of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock pinned to one date.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

#[cfg(test)]
impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(date_formats::OUTPUT).to_string()
}

/// `today - elapsed_days`. `None` only if the subtraction leaves chrono's range.
pub fn infer_from_elapsed(elapsed_days: u32, today: NaiveDate) -> Option<String> {
    today
        .checked_sub_days(Days::new(u64::from(elapsed_days)))
        .map(format_date)
}

/// Strict parse of a "Mar 01, 2024" style tag. Anything else (the same tag
/// slot also shows "NEW" on fresh listings) yields `None`.
pub fn parse_absolute(text: &str) -> Option<String> {
    NaiveDate::parse_from_str(text.trim(), date_formats::SOLD_TAG)
        .ok()
        .map(format_date)
}
