use async_trait::async_trait;
use csv::{ReaderBuilder, StringRecord};
use reqwest::{Client, header::HeaderMap};

use super::{Offer, OfferSource, OfferSourceError, Result, fetch_body};

const ID_COLUMNS: &[&str] = &["id"];
const NAME_COLUMNS: &[&str] = &["name", "title"];
const PRICE_COLUMNS: &[&str] = &["final_price", "price"];
const URL_COLUMNS: &[&str] = &["url", "link"];
const IMAGE_COLUMNS: &[&str] = &["image", "image_url", "image_link"];

/// Reads offers from the storefront's CSV product feed.
pub struct CsvFeedSource {
    client: Client,
    feed_url: String,
}

impl CsvFeedSource {
    /// Creates a source reading `feed_url`.
    pub fn new(client: Client, feed_url: &str) -> Self {
        Self { client, feed_url: feed_url.to_string() }
    }

    async fn try_fetch(&self) -> Result<Vec<Offer>> {
        let body = fetch_body(&self.client, &self.feed_url, HeaderMap::new()).await?;
        parse_feed(&body)
    }
}

#[async_trait]
impl OfferSource for CsvFeedSource {
    async fn fetch(&self) -> Vec<Offer> {
        tracing::debug!("Fetching CSV feed from {}", self.feed_url);

        match self.try_fetch().await {
            Ok(offers) => {
                tracing::info!("CSV feed returned {} usable offers", offers.len());
                offers
            }
            Err(e) => {
                tracing::error!("Failed to read CSV feed {}: {e}", self.feed_url);
                Vec::new()
            }
        }
    }
}

/// Column positions resolved from the header row.
struct Columns {
    id: usize,
    name: Option<usize>,
    price: usize,
    url: usize,
    image: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let find = |names: &[&str]| {
            headers.iter().position(|h| {
                let h = h.trim().trim_start_matches('\u{feff}');
                names.iter().any(|n| h.eq_ignore_ascii_case(n))
            })
        };

        Ok(Self {
            id: find(ID_COLUMNS).ok_or(OfferSourceError::MissingColumn("id"))?,
            name: find(NAME_COLUMNS),
            price: find(PRICE_COLUMNS).ok_or(OfferSourceError::MissingColumn("final_price"))?,
            url: find(URL_COLUMNS).ok_or(OfferSourceError::MissingColumn("url"))?,
            image: find(IMAGE_COLUMNS),
        })
    }
}

/// Parses a CSV feed body.
///
/// Rows without an id, url or numeric price are dropped, as are rows whose
/// id spans several lines. A malformed row does not affect the rest of the
/// feed.
pub fn parse_feed(body: &str) -> Result<Vec<Offer>> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(body.as_bytes());
    let columns = Columns::from_headers(reader.headers()?)?;

    let mut offers = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!("Skipping malformed feed row {}: {e}", line + 1);
                continue;
            }
        };

        let field = |idx: usize| record.get(idx).map(str::trim).filter(|v| !v.is_empty());

        let (Some(id), Some(url)) = (field(columns.id), field(columns.url)) else {
            tracing::debug!("Skipping feed row {} without id or url", line + 1);
            continue;
        };

        // The ledger stores one id per line.
        if id.contains(['\r', '\n']) {
            tracing::debug!("Skipping feed row {} with a multi-line id", line + 1);
            continue;
        }

        let Some(price) = field(columns.price)
            .and_then(|p| p.parse::<f64>().ok())
            .filter(|p| p.is_finite())
        else {
            tracing::debug!("Skipping feed row {id} with missing or invalid price");
            continue;
        };

        offers.push(Offer {
            id: id.to_string(),
            name: columns.name.and_then(field).unwrap_or(id).to_string(),
            price: Some(price),
            url: url.to_string(),
            image_url: columns.image.and_then(field).map(str::to_string),
        });
    }

    Ok(offers)
}
