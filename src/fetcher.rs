use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use crate::api::latency::LatencyStats;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::types::{non_blank, PageSnapshot};

/// Produces a snapshot of one listing page.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PageSnapshot>;
}

// ---------------------------------------------------------------------------
// HTTP page source
// ---------------------------------------------------------------------------

pub struct HttpPageSource {
    client: reqwest::Client,
    latency: Arc<LatencyStats>,
}

impl HttpPageSource {
    pub fn new(cfg: &Config, latency: Arc<LatencyStats>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.fetch_timeout_secs))
            .user_agent(cfg.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client, latency })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch(&self, url: &str) -> Result<PageSnapshot> {
        let started = Instant::now();
        let resp = self.client.get(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = resp.text().await?;
        self.latency.record(started.elapsed());
        debug!(url, bytes = body.len(), elapsed_ms = started.elapsed().as_millis() as u64, "Fetched listing page");

        Ok(parse_snapshot(&body))
    }
}

// ---------------------------------------------------------------------------
// Page parsing
// ---------------------------------------------------------------------------

/// CSS selectors for the listing detail page.
mod selectors {
    pub const ADDRESS: &str = "span[data-testid='home-details-summary-headline']";
    pub const CITY_STATE: &str = "span[data-testid='home-details-summary-city-state']";
    pub const PRICE: &str = "div[data-testid='home-details-sm-lg-xl-price-details'] h3 div";
    pub const STATUS_TAG: &str = "span[data-testid='hero-image-property-tag-0'] span";
    pub const SOLD_DATE_TAG: &str = "span[data-testid='hero-image-property-tag-1'] span";
    pub const FEATURES: &str = "ul[data-testid='home-features'] li";
    pub const PICTURE: &str = "div[data-testid='hdp-hero-img-tile'] picture source";
}

fn days_on_site_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+)\+? (?:Day|Days) on Trulia").expect("valid days-on-site regex")
    })
}

/// Extract a snapshot from listing page HTML. Missing elements are `None`;
/// parsing never fails.
pub fn parse_snapshot(html: &str) -> PageSnapshot {
    let doc = Html::parse_document(html);

    PageSnapshot {
        status: first_text(&doc, selectors::STATUS_TAG),
        address: first_text(&doc, selectors::ADDRESS),
        city_state: first_text(&doc, selectors::CITY_STATE),
        price: first_text(&doc, selectors::PRICE),
        days_on_site: days_on_site(&doc),
        sold_date_text: first_text(&doc, selectors::SOLD_DATE_TAG),
        picture_url: first_attr(&doc, selectors::PICTURE, "srcset"),
    }
}

/// Direct text children of the first matching element, trimmed. Text of
/// nested elements (badges, unit suffixes) is not included.
fn first_text(doc: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    let el = doc.select(&sel).next()?;
    let own: String = el
        .children()
        .filter_map(|node| node.value().as_text())
        .map(|text| &**text)
        .collect();
    non_blank(&own)
}

fn first_attr(doc: &Html, selector: &str, attr: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel)
        .next()
        .and_then(|el| el.value().attr(attr))
        .and_then(non_blank)
}

fn days_on_site(doc: &Html) -> Option<u32> {
    let sel = Selector::parse(selectors::FEATURES).ok()?;
    doc.select(&sel).find_map(|li| {
        let text = li.text().collect::<String>();
        days_on_site_re()
            .captures(&text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
    })
}
