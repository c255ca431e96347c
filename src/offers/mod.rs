//! Offer discovery.
//!
//! An [`OfferSource`] produces the raw offers the publisher works with. Both
//! sources fail soft: transport and parse errors are logged and yield an
//! empty list.

/// Offers from the CSV product feed.
pub mod csv_feed;
/// Offers scraped from the listing page.
pub mod scraper;
#[cfg(test)]
mod tests;

use async_trait::async_trait;
use mockall::automock;
use reqwest::{Client, StatusCode, header::HeaderMap};
use thiserror::Error;

pub use csv_feed::CsvFeedSource;
pub use scraper::HtmlScraperSource;

/// Why a source produced no offers. Only logged, see [`OfferSource::fetch`].
#[derive(Debug, Error)]
pub enum OfferSourceError {
    /// Transport failure.
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Non-2xx response.
    #[error("Upstream responded with HTTP {0}")]
    HttpStatus(StatusCode),
    /// The feed is not valid CSV.
    #[error("Malformed CSV feed: {0}")]
    Csv(#[from] csv::Error),
    /// A required column is absent from the feed header.
    #[error("CSV feed has no '{0}' column")]
    MissingColumn(&'static str),
}

type Result<T> = std::result::Result<T, OfferSourceError>;

/// A product listing discovered by an [`OfferSource`].
#[derive(Debug, Clone, PartialEq)]
pub struct Offer {
    /// Source-defined identifier, unique per product.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Price in the source currency. `None` when it could not be read.
    pub price: Option<f64>,
    /// Product page, without affiliate parameters.
    pub url: String,
    /// Product image, if the source has one.
    pub image_url: Option<String>,
}

/// Produces the current batch of offers.
#[automock]
#[async_trait]
pub trait OfferSource: Send + Sync {
    /// Fetches offers. Never fails: errors are logged and an empty list is
    /// returned.
    async fn fetch(&self) -> Vec<Offer>;
}

/// Which [`OfferSource`] implementation the bot runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OfferSourceKind {
    /// [`CsvFeedSource`], selected with `csv` or `feed`.
    #[default]
    CsvFeed,
    /// [`HtmlScraperSource`], selected with `html` or `scraper`.
    HtmlScraper,
}

impl std::str::FromStr for OfferSourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" | "feed" => Ok(Self::CsvFeed),
            "html" | "scraper" => Ok(Self::HtmlScraper),
            other => Err(format!("unknown offer source '{other}', expected 'csv' or 'html'")),
        }
    }
}

/// GETs `url` and returns the body, treating non-2xx statuses as errors.
async fn fetch_body(client: &Client, url: &str, headers: HeaderMap) -> Result<String> {
    let resp = client.get(url).headers(headers).send().await?;
    if !resp.status().is_success() {
        return Err(OfferSourceError::HttpStatus(resp.status()));
    }
    Ok(resp.text().await?)
}
