#[cfg(test)]
mod tests;

use std::collections::HashMap;

use async_trait::async_trait;
use mockall::automock;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

/// Why the current exchange rate could not be obtained.
#[derive(Debug, Error)]
pub enum ExchangeRateError {
    /// Transport failure.
    #[error("Exchange rate request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Non-2xx response.
    #[error("Exchange rate API responded with HTTP {0}")]
    HttpStatus(StatusCode),
    /// The body is not the expected JSON.
    #[error("Malformed exchange rate response: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The target currency is not in the response.
    #[error("Currency {0} is missing from the exchange rate response")]
    MissingCurrency(String),
    /// The rate is zero, negative or not finite.
    #[error("Exchange rate {0} is not a positive number")]
    InvalidRate(f64),
}

type Result<T> = std::result::Result<T, ExchangeRateError>;

/// Source of the source-to-local currency exchange rate.
#[automock]
#[async_trait]
pub trait ExchangeRateClient: Send + Sync {
    /// Fetches the current rate, expressed as local units per source unit.
    async fn fetch_rate(&self) -> Result<f64>;
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    rates: HashMap<String, f64>,
}

/// Exchange rate client backed by a public `latest/<base>` rates endpoint.
pub struct HttpExchangeRateClient {
    client: Client,
    url: String,
    target_currency: String,
}

impl HttpExchangeRateClient {
    /// Creates a client for `url`, reading the `target_currency` rate.
    pub fn new(client: Client, url: &str, target_currency: &str) -> Self {
        Self { client, url: url.to_string(), target_currency: target_currency.to_uppercase() }
    }
}

#[async_trait]
impl ExchangeRateClient for HttpExchangeRateClient {
    async fn fetch_rate(&self) -> Result<f64> {
        tracing::debug!("Fetching exchange rate from {}", self.url);

        let resp = self.client.get(&self.url).send().await?;
        if !resp.status().is_success() {
            return Err(ExchangeRateError::HttpStatus(resp.status()));
        }

        let body = resp.text().await?;
        parse_rate_response(&body, &self.target_currency)
    }
}

/// Extracts the rate for `currency` from a `{"rates": {...}}` JSON body.
pub fn parse_rate_response(body: &str, currency: &str) -> Result<f64> {
    let response: RatesResponse = serde_json::from_str(body)?;
    let rate = response
        .rates
        .get(currency)
        .copied()
        .ok_or_else(|| ExchangeRateError::MissingCurrency(currency.to_string()))?;

    if !rate.is_finite() || rate <= 0.0 {
        return Err(ExchangeRateError::InvalidRate(rate));
    }

    Ok(rate)
}

/// The rate used for one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExchangeRate {
    /// Local units per source unit.
    pub value: f64,
    /// Set when the fetch failed and the configured fallback was used.
    pub is_fallback: bool,
}

/// Fetches the current rate once, substituting `fallback` on any failure.
pub async fn rate_or_fallback(client: &dyn ExchangeRateClient, fallback: f64) -> ExchangeRate {
    match client.fetch_rate().await {
        Ok(value) => {
            tracing::info!("Exchange rate obtained: {value:.4}");
            ExchangeRate { value, is_fallback: false }
        }
        Err(e) => {
            tracing::warn!("Could not fetch exchange rate, using fallback {fallback:.2}: {e}");
            ExchangeRate { value: fallback, is_fallback: true }
        }
    }
}

/// Converts a source-currency price into local currency.
pub fn to_local(price: f64, rate: f64) -> f64 {
    price * rate
}

/// Formats a local-currency amount the pt-BR way, e.g. `1.149,90`.
pub fn format_local_price(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let integer = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}{grouped},{fraction:02}")
}

/// Parses a human-written price such as `$12.34`, `R$ 1.149,90` or
/// `1,299.00`.
///
/// Currency symbols and whitespace are ignored. When both `,` and `.` appear
/// the last one is the decimal separator. A lone separator is decimal only
/// when it occurs once and is followed by one or two digits.
pub fn parse_price_text(text: &str) -> Option<f64> {
    let cleaned: String =
        text.chars().filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.').collect();

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let decimal_sep = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) => Some(if comma > dot { ',' } else { '.' }),
        (Some(pos), None) | (None, Some(pos)) => {
            let sep = cleaned[pos..].chars().next()?;
            let digits_after = cleaned.len() - pos - 1;
            (cleaned.matches(sep).count() == 1 && (1..=2).contains(&digits_after)).then_some(sep)
        }
        (None, None) => None,
    };

    let normalized: String = cleaned
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_digit() => Some(c),
            c if Some(c) == decimal_sep => Some('.'),
            _ => None,
        })
        .collect();

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses a local price typed by an administrator, such as `R$ 149,90`.
/// Anything besides the currency symbol, digits and separators is rejected,
/// and only positive amounts are accepted.
pub fn parse_local_price(text: &str) -> Option<f64> {
    let amount = text.trim().trim_start_matches("R$").trim();
    if amount.is_empty() || !amount.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '.') {
        return None;
    }
    parse_price_text(amount).filter(|v| *v > 0.0)
}
