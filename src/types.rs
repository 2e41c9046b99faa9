use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Column layout
// ---------------------------------------------------------------------------

/// Fixed sheet layout. Derived formulas reference siblings by letter, so the
/// order of this enum is part of the storage contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Url,
    Picture,
    Address,
    CityState,
    ListPrice,
    ListDate,
    PendingDate,
    PendingPriceEstimate,
    OffMarketDate,
    OffMarketPriceEstimate,
    SoldDate,
    SoldPrice,
    SoldRecordDate,
    DaysBeforePending,
    DaysToClose,
    ListEstimateDelta,
    ListSoldDelta,
}

impl Column {
    pub const ALL: [Column; 17] = [
        Column::Url,
        Column::Picture,
        Column::Address,
        Column::CityState,
        Column::ListPrice,
        Column::ListDate,
        Column::PendingDate,
        Column::PendingPriceEstimate,
        Column::OffMarketDate,
        Column::OffMarketPriceEstimate,
        Column::SoldDate,
        Column::SoldPrice,
        Column::SoldRecordDate,
        Column::DaysBeforePending,
        Column::DaysToClose,
        Column::ListEstimateDelta,
        Column::ListSoldDelta,
    ];

    /// Spreadsheet column letter (A..Q).
    pub fn letter(self) -> char {
        (b'A' + self as u8) as char
    }

    /// Header text as it appears in row 1 of the sheet.
    pub fn header(self) -> &'static str {
        match self {
            Column::Url => "URL",
            Column::Picture => "Picture",
            Column::Address => "Address",
            Column::CityState => "City, State, Zip",
            Column::ListPrice => "List Price",
            Column::ListDate => "List Date",
            Column::PendingDate => "Pending Date",
            Column::PendingPriceEstimate => "Pending Price Estimate",
            Column::OffMarketDate => "Off Market Date",
            Column::OffMarketPriceEstimate => "Off Market Price Estimate",
            Column::SoldDate => "Sold Date",
            Column::SoldPrice => "Sold Price",
            Column::SoldRecordDate => "Sold Public Record Date",
            Column::DaysBeforePending => "Days before pending",
            Column::DaysToClose => "Days to close",
            Column::ListEstimateDelta => "Difference in List & Estimate Price",
            Column::ListSoldDelta => "Difference in List & Sold Price",
        }
    }

    pub fn from_header(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|c| c.header().eq_ignore_ascii_case(s))
    }
}

// ---------------------------------------------------------------------------
// ListingRecord
// ---------------------------------------------------------------------------

/// One tracked property. `None` is the in-memory empty marker; the store maps
/// it to its own empty representation on flush.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub url: String,
    pub address: Option<String>,
    pub city_state: Option<String>,
    pub list_price: Option<String>,
    pub list_date: Option<String>,
    pub pending_price_estimate: Option<String>,
    pub pending_date: Option<String>,
    pub off_market_price_estimate: Option<String>,
    pub off_market_date: Option<String>,
    pub sold_price: Option<String>,
    pub sold_date: Option<String>,
    pub sold_record_date: Option<String>,
    #[serde(flatten)]
    pub derived: DerivedFields,
}

/// Presentation fields recomputed on every observation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedFields {
    pub picture_formula: Option<String>,
    pub days_before_pending_formula: Option<String>,
    pub days_to_close_formula: Option<String>,
    pub list_estimate_delta_formula: Option<String>,
    pub list_sold_delta_formula: Option<String>,
}

impl ListingRecord {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Sold listings are never fetched again.
    pub fn is_terminal(&self) -> bool {
        self.sold_date.is_some()
    }

    /// Most advanced lifecycle state this record has been observed in.
    pub fn lifecycle(&self) -> Option<LifecycleStatus> {
        if self.sold_date.is_some() || self.sold_record_date.is_some() {
            Some(LifecycleStatus::Sold)
        } else if self.off_market_date.is_some() {
            Some(LifecycleStatus::OffMarket)
        } else if self.pending_date.is_some() {
            Some(LifecycleStatus::Pending)
        } else if self.list_date.is_some() || self.list_price.is_some() {
            Some(LifecycleStatus::ForSale)
        } else {
            None
        }
    }

    pub fn get(&self, column: Column) -> Option<&str> {
        let value = match column {
            Column::Url => return Some(self.url.as_str()),
            Column::Picture => &self.derived.picture_formula,
            Column::Address => &self.address,
            Column::CityState => &self.city_state,
            Column::ListPrice => &self.list_price,
            Column::ListDate => &self.list_date,
            Column::PendingDate => &self.pending_date,
            Column::PendingPriceEstimate => &self.pending_price_estimate,
            Column::OffMarketDate => &self.off_market_date,
            Column::OffMarketPriceEstimate => &self.off_market_price_estimate,
            Column::SoldDate => &self.sold_date,
            Column::SoldPrice => &self.sold_price,
            Column::SoldRecordDate => &self.sold_record_date,
            Column::DaysBeforePending => &self.derived.days_before_pending_formula,
            Column::DaysToClose => &self.derived.days_to_close_formula,
            Column::ListEstimateDelta => &self.derived.list_estimate_delta_formula,
            Column::ListSoldDelta => &self.derived.list_sold_delta_formula,
        };
        value.as_deref()
    }

    /// Column-addressed setter used by seed import only. Blank strings become `None`.
    /// The URL column is ignored: identity is fixed at construction.
    pub fn set(&mut self, column: Column, value: &str) {
        let value = non_blank(value);
        let slot = match column {
            Column::Url => return,
            Column::Picture => &mut self.derived.picture_formula,
            Column::Address => &mut self.address,
            Column::CityState => &mut self.city_state,
            Column::ListPrice => &mut self.list_price,
            Column::ListDate => &mut self.list_date,
            Column::PendingDate => &mut self.pending_date,
            Column::PendingPriceEstimate => &mut self.pending_price_estimate,
            Column::OffMarketDate => &mut self.off_market_date,
            Column::OffMarketPriceEstimate => &mut self.off_market_price_estimate,
            Column::SoldDate => &mut self.sold_date,
            Column::SoldPrice => &mut self.sold_price,
            Column::SoldRecordDate => &mut self.sold_record_date,
            Column::DaysBeforePending => &mut self.derived.days_before_pending_formula,
            Column::DaysToClose => &mut self.derived.days_to_close_formula,
            Column::ListEstimateDelta => &mut self.derived.list_estimate_delta_formula,
            Column::ListSoldDelta => &mut self.derived.list_sold_delta_formula,
        };
        *slot = value;
    }
}

/// Trim and map whitespace-only text to `None`.
pub fn non_blank(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    ForSale,
    Pending,
    OffMarket,
    Sold,
}

impl LifecycleStatus {
    /// Match the status tag text shown on the listing page.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        if label.eq_ignore_ascii_case("FOR SALE") {
            Some(LifecycleStatus::ForSale)
        } else if label.eq_ignore_ascii_case("PENDING") {
            Some(LifecycleStatus::Pending)
        } else if label.eq_ignore_ascii_case("OFF MARKET") {
            Some(LifecycleStatus::OffMarket)
        } else if label.eq_ignore_ascii_case("SOLD") {
            Some(LifecycleStatus::Sold)
        } else {
            None
        }
    }
}

impl std::fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LifecycleStatus::ForSale => "for_sale",
            LifecycleStatus::Pending => "pending",
            LifecycleStatus::OffMarket => "off_market",
            LifecycleStatus::Sold => "sold",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Page snapshot — output of the page parser, input of the classifier
// ---------------------------------------------------------------------------

/// Raw fields extracted from one listing page. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSnapshot {
    pub status: Option<String>,
    pub address: Option<String>,
    pub city_state: Option<String>,
    pub price: Option<String>,
    /// "N Days on <site>" feature, N parsed.
    pub days_on_site: Option<u32>,
    /// Text of the secondary hero tag; a date like "Mar 01, 2024" on sold pages.
    pub sold_date_text: Option<String>,
    pub picture_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Candidate updates — output of the classifier
// ---------------------------------------------------------------------------

/// Write-once field group the classifier wants applied. Each variant's guard
/// date decides whether the whole group is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateUpdate {
    ForSale {
        list_price: Option<String>,
        list_date: Option<String>,
        address: Option<String>,
        city_state: Option<String>,
    },
    Pending {
        price_estimate: Option<String>,
        date: String,
    },
    OffMarket {
        price_estimate: Option<String>,
        date: String,
    },
    Sold {
        sold_price: Option<String>,
        sold_date: Option<String>,
        record_date: String,
    },
    Unrecognized {
        label: Option<String>,
    },
}

impl CandidateUpdate {
    pub fn status(&self) -> Option<LifecycleStatus> {
        match self {
            CandidateUpdate::ForSale { .. } => Some(LifecycleStatus::ForSale),
            CandidateUpdate::Pending { .. } => Some(LifecycleStatus::Pending),
            CandidateUpdate::OffMarket { .. } => Some(LifecycleStatus::OffMarket),
            CandidateUpdate::Sold { .. } => Some(LifecycleStatus::Sold),
            CandidateUpdate::Unrecognized { .. } => None,
        }
    }
}

/// Result of applying one observation to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The state group was empty and has been written.
    Applied,
    /// The guard date was already populated; only derived fields were refreshed.
    AlreadyRecorded,
    /// The group is still open but every field the page offered is either
    /// absent or already filled. The listing is observed again next cycle.
    NothingToRecord,
    /// Unrecognized status; only derived fields were refreshed.
    Ignored,
}

// ---------------------------------------------------------------------------
// Cycle summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleStats {
    pub selected: usize,
    pub applied: usize,
    pub already_recorded: usize,
    pub nothing_to_record: usize,
    pub ignored: usize,
    pub fetch_failed: usize,
    pub flushed_rows: usize,
    /// Unix seconds when the cycle finished.
    pub finished_at: i64,
}
