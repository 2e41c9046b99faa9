use std::str::FromStr;

use crate::error::{AppError, Result};

/// How often a full reconciliation cycle runs (seconds). Six hours by default.
pub const CYCLE_INTERVAL_SECS: u64 = 6 * 3600;

/// Maximum listing pages fetched concurrently within one cycle.
pub const FETCH_CONCURRENCY: usize = 4;

/// Per-request timeout for listing page fetches (seconds).
pub const FETCH_TIMEOUT_SECS: u64 = 30;

/// Browser-like user agent; listing sites serve a stripped page to unknown agents.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Date formats shared by inference, classification and export.
pub mod date_formats {
    /// Normalized output format for every stored date.
    pub const OUTPUT: &str = "%m/%d/%Y";
    /// The only accepted format for an absolute sold date on the page ("Mar 01, 2024").
    pub const SOLD_TAG: &str = "%b %d, %Y";
}

/// Sheet rows are 1-based and row 1 holds the header, so table index 0 lives on row 2.
pub const FIRST_DATA_ROW: usize = 2;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Seconds between reconciliation cycles (CYCLE_INTERVAL_SECS)
    pub cycle_interval_secs: u64,
    /// Concurrent page fetches per cycle (FETCH_CONCURRENCY)
    pub fetch_concurrency: usize,
    /// Per-request timeout (FETCH_TIMEOUT_SECS)
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
    /// Sheet or URL list imported once at startup (SEED_CSV)
    pub seed_csv: Option<String>,
    /// Sheet written after every successful flush (EXPORT_CSV)
    pub export_csv: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "listings.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            cycle_interval_secs: positive_var(
                "CYCLE_INTERVAL_SECS",
                non_empty_var("CYCLE_INTERVAL_SECS"),
                CYCLE_INTERVAL_SECS,
            )?,
            fetch_concurrency: positive_var(
                "FETCH_CONCURRENCY",
                non_empty_var("FETCH_CONCURRENCY"),
                FETCH_CONCURRENCY,
            )?,
            fetch_timeout_secs: positive_var(
                "FETCH_TIMEOUT_SECS",
                non_empty_var("FETCH_TIMEOUT_SECS"),
                FETCH_TIMEOUT_SECS,
            )?,
            user_agent: std::env::var("USER_AGENT").unwrap_or_else(|_| USER_AGENT.to_string()),
            seed_csv: non_empty_var("SEED_CSV"),
            export_csv: non_empty_var("EXPORT_CSV"),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse a positive integer setting, falling back to `default` when unset.
/// A value that is set but not a positive integer is a configuration error.
fn positive_var<T>(name: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr + PartialOrd + Default,
{
    let Some(raw) = raw else {
        return Ok(default);
    };
    raw.parse::<T>()
        .ok()
        .filter(|v| *v > T::default())
        .ok_or_else(|| AppError::Config(format!("{name} must be a positive integer, got {raw:?}")))
}
