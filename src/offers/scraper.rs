use std::collections::HashMap;

use async_trait::async_trait;
use lazy_static::lazy_static;
use reqwest::{
    Client,
    header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT},
};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use url::Url;

use super::{Offer, OfferSource, Result, fetch_body};
use crate::pricing::parse_price_text;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                                  (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

// Tried in order; the first selector matching anything defines the cards.
const CARD_SELECTORS: &[&str] = &[
    r#"[data-testid="product-card"]"#,
    r#"div[class*="ProductCard"]"#,
    r#"div[class*="product-card"]"#,
    r#"article[class*="product"]"#,
    r#"li[class*="product"]"#,
];

lazy_static! {
    static ref CARDS: Vec<Selector> = CARD_SELECTORS.iter().map(|s| selector(s)).collect();
    static ref NAME: Selector =
        selector(r#"[class*="title"], [class*="Title"], [class*="name"], [class*="Name"], h2, h3"#);
    static ref PRICE: Selector =
        selector(r#"[data-testid*="price"], [class*="price"], [class*="Price"]"#);
    static ref LINK: Selector = selector("a[href]");
    static ref IMAGE: Selector = selector("img");
    static ref LD_JSON: Selector = selector(r#"script[type="application/ld+json"]"#);
}

/// Panics on an invalid selector. Only called with the constants above.
fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("Invalid CSS selector")
}

/// Scrapes offers from the storefront's listing page.
///
/// The page structure is not under our control, so everything here is a
/// best-effort heuristic kept behind [`OfferSource`].
pub struct HtmlScraperSource {
    client: Client,
    listing_url: Url,
}

impl HtmlScraperSource {
    /// Creates a source scraping `listing_url`.
    pub fn new(client: Client, listing_url: Url) -> Self {
        Self { client, listing_url }
    }

    async fn try_fetch(&self) -> Result<Vec<Offer>> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("pt-BR,pt;q=0.9,en;q=0.8"));

        let body = fetch_body(&self.client, self.listing_url.as_str(), headers).await?;
        Ok(parse_listing(&body, &self.listing_url))
    }
}

#[async_trait]
impl OfferSource for HtmlScraperSource {
    async fn fetch(&self) -> Vec<Offer> {
        tracing::debug!("Scraping listing page {}", self.listing_url);

        match self.try_fetch().await {
            Ok(offers) => {
                tracing::info!("Listing page yielded {} product cards", offers.len());
                offers
            }
            Err(e) => {
                tracing::error!("Failed to scrape listing page {}: {e}", self.listing_url);
                Vec::new()
            }
        }
    }
}

/// Extracts offers from a listing page.
///
/// Missing sub-elements leave the corresponding field empty. Cards without
/// a link are skipped since the link path is the offer id. Prices missing
/// from the markup are looked up in the page's JSON-LD blocks.
pub fn parse_listing(html: &str, base: &Url) -> Vec<Offer> {
    let document = Html::parse_document(html);

    let Some(cards) =
        CARDS.iter().map(|s| document.select(s).collect::<Vec<_>>()).find(|c| !c.is_empty())
    else {
        tracing::warn!("No product cards found on {base}");
        return Vec::new();
    };

    let structured = StructuredPrices::from_document(&document, base);

    cards
        .into_iter()
        .filter_map(|card| parse_card(card, base))
        .map(|mut offer| {
            if offer.price.is_none() {
                offer.price = structured.lookup(&offer);
            }
            offer
        })
        .collect()
}

fn parse_card(card: ElementRef<'_>, base: &Url) -> Option<Offer> {
    let href = card
        .value()
        .attr("href")
        .or_else(|| card.select(&LINK).next().and_then(|a| a.value().attr("href")))?;
    let url = base.join(href.trim()).ok()?;

    let image = card.select(&IMAGE).next();
    let name = card
        .select(&NAME)
        .map(element_text)
        .find(|t| !t.is_empty())
        .or_else(|| image.and_then(|img| img.value().attr("alt")).map(|a| a.trim().to_string()))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| url.path().trim_matches('/').to_string());

    // Discounted cards show the old price too; the current one is the lowest.
    let price = card
        .select(&PRICE)
        .filter_map(|p| parse_price_text(&element_text(p)))
        .filter(|p| *p > 0.0)
        .reduce(f64::min);

    let image_url = image
        .and_then(|img| {
            let value = img.value();
            value
                .attr("src")
                .filter(|s| !s.starts_with("data:"))
                .or_else(|| value.attr("data-src"))
                .or_else(|| value.attr("srcset").and_then(|s| s.split_whitespace().next()))
        })
        .and_then(|src| base.join(src.trim()).ok())
        .map(String::from);

    Some(Offer { id: url.path().to_string(), name, price, url: url.to_string(), image_url })
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Prices advertised in the page's structured data, keyed by URL path and
/// by lowercased product name.
#[derive(Debug, Default)]
struct StructuredPrices {
    by_path: HashMap<String, f64>,
    by_name: HashMap<String, f64>,
}

impl StructuredPrices {
    fn from_document(document: &Html, base: &Url) -> Self {
        let mut prices = Self::default();
        for script in document.select(&LD_JSON) {
            let text = script.text().collect::<String>();
            match serde_json::from_str::<Value>(&text) {
                Ok(value) => prices.collect(&value, base),
                Err(e) => tracing::debug!("Ignoring unparsable JSON-LD block: {e}"),
            }
        }
        prices
    }

    fn collect(&mut self, value: &Value, base: &Url) {
        match value {
            Value::Array(items) => items.iter().for_each(|v| self.collect(v, base)),
            Value::Object(map) => {
                if is_product(value) {
                    if let Some(price) = map.get("offers").and_then(offer_price) {
                        if let Some(path) =
                            map.get("url").and_then(Value::as_str).and_then(|u| base.join(u).ok())
                        {
                            self.by_path.insert(path.path().to_string(), price);
                        }
                        if let Some(name) = map.get("name").and_then(Value::as_str) {
                            self.by_name.insert(name.trim().to_lowercase(), price);
                        }
                    }
                }
                map.values().for_each(|v| self.collect(v, base));
            }
            _ => {}
        }
    }

    fn lookup(&self, offer: &Offer) -> Option<f64> {
        let path = Url::parse(&offer.url).ok().map(|u| u.path().to_string());
        path.and_then(|p| self.by_path.get(&p))
            .or_else(|| self.by_name.get(&offer.name.to_lowercase()))
            .copied()
    }
}

fn is_product(value: &Value) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => t == "Product",
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("Product")),
        _ => false,
    }
}

/// Reads `price` or `lowPrice` from an `offers` object or array.
fn offer_price(offers: &Value) -> Option<f64> {
    match offers {
        Value::Array(items) => items.iter().filter_map(offer_price).reduce(f64::min),
        Value::Object(map) => ["price", "lowPrice"]
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(|v| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => parse_price_text(s),
                _ => None,
            })
            .filter(|p| *p > 0.0),
        _ => None,
    }
}
