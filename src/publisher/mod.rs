
use std::{collections::HashSet, sync::Arc};

use teloxide::types::Recipient;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{
    ledger::{LedgerError, SentLedger},
    messaging::{MessagingService, OfferFormatter, OfferPost, PricedOffer},
    offers::{Offer, OfferSource},
    pricing::{ExchangeRate, ExchangeRateClient, rate_or_fallback, to_local},
};

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PublisherError {
    /// The ledger could not be read.
    #[error("Failed to access the sent offers ledger: {0}")]
    Ledger(#[from] LedgerError),
}

type Result<T> = std::result::Result<T, PublisherError>;

/// Tunables of the delivery pipeline.
#[derive(Debug, Clone, Copy)]
pub struct PublisherSettings {
    /// Rate used when the exchange rate cannot be fetched.
    pub fallback_rate: f64,
    /// Offers above this local-currency price are not posted.
    pub max_local_price: f64,
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PublishReport {
    /// Offers returned by the source.
    pub discovered: usize,
    /// Offers that passed the price and ledger filters.
    pub eligible: usize,
    /// Offers delivered.
    pub sent: usize,
    /// Offers whose delivery failed. They are retried next run.
    pub failed: usize,
    /// Rate the run priced offers with.
    pub rate: ExchangeRate,
}

/// Discovers fresh offers and posts them to the destination chat.
pub struct DealPublisher {
    source: Arc<dyn OfferSource>,
    rate_client: Arc<dyn ExchangeRateClient>,
    ledger: Arc<dyn SentLedger>,
    messaging_service: Arc<dyn MessagingService>,
    formatter: OfferFormatter,
    destination: Recipient,
    settings: PublisherSettings,
    // Manual and scheduled runs must not interleave.
    run_lock: Mutex<()>,
}

impl DealPublisher {
    /// Creates a publisher posting to `destination`.
    pub fn new(
        source: Arc<dyn OfferSource>,
        rate_client: Arc<dyn ExchangeRateClient>,
        ledger: Arc<dyn SentLedger>,
        messaging_service: Arc<dyn MessagingService>,
        formatter: OfferFormatter,
        destination: Recipient,
        settings: PublisherSettings,
    ) -> Self {
        Self {
            source,
            rate_client,
            ledger,
            messaging_service,
            formatter,
            destination,
            settings,
            run_lock: Mutex::new(()),
        }
    }

    /// Posts up to `limit` fresh offers.
    pub async fn publish(&self, limit: Option<usize>) -> Result<PublishReport> {
        let _guard = self.run_lock.lock().await;
        self.run(None, limit).await
    }

    /// Posts `preamble` followed by up to `limit` fresh offers. Nothing is
    /// posted when there are no fresh offers.
    pub async fn publish_scheduled(
        &self,
        preamble: Option<&str>,
        limit: usize,
    ) -> Result<PublishReport> {
        let _guard = self.run_lock.lock().await;
        self.run(preamble, Some(limit)).await
    }

    async fn run(&self, preamble: Option<&str>, limit: Option<usize>) -> Result<PublishReport> {
        tracing::debug!("Starting offer run (limit: {limit:?})");

        let (offers, rate) = futures::join!(
            self.source.fetch(),
            rate_or_fallback(self.rate_client.as_ref(), self.settings.fallback_rate)
        );
        let sent_ids = self.ledger.load().await?;

        let discovered = offers.len();
        let eligible = Self::select_offers(
            offers,
            rate.value,
            self.settings.max_local_price,
            &sent_ids,
            limit,
        );

        let mut report =
            PublishReport { discovered, eligible: eligible.len(), sent: 0, failed: 0, rate };

        if eligible.is_empty() {
            tracing::info!("No new offers matching the filters ({discovered} discovered)");
            return Ok(report);
        }
        tracing::info!("{} new offers to send", eligible.len());

        if let Some(preamble) = preamble {
            if let Err(e) =
                self.messaging_service.send_text(self.destination.clone(), preamble.to_string()).await
            {
                tracing::warn!("Failed to send preamble message: {e}");
            }
        }

        let mut delivered = Vec::with_capacity(eligible.len());
        for priced in eligible {
            let post = self.formatter.format_discovered(&priced);
            if self.deliver(post).await {
                tracing::info!("Offer '{}' sent", priced.offer.name);
                delivered.push(priced.offer.id);
            } else {
                report.failed += 1;
            }
        }
        report.sent = delivered.len();

        // Failed offers stay out of the ledger and are retried next run.
        if !delivered.is_empty() {
            match self.ledger.record(&delivered).await {
                Ok(()) => tracing::debug!("Ledger updated with {} new ids", delivered.len()),
                Err(e) => tracing::error!("Offers were sent but the ledger update failed: {e}"),
            }
        }

        Ok(report)
    }

    /// Sends one post. A rejected photo post is retried once as text.
    async fn deliver(&self, post: OfferPost) -> bool {
        let post = if post.image_url.is_some() {
            match self
                .messaging_service
                .send_offer_photo(self.destination.clone(), post.clone())
                .await
            {
                Ok(()) => return true,
                Err(e) => {
                    tracing::warn!("Photo post failed, retrying as text: {e}");
                    post.text_fallback()
                }
            }
        } else {
            post
        };

        match self.messaging_service.send_offer(self.destination.clone(), post).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to send offer message: {e}. Will be retried next run");
                false
            }
        }
    }

    /// Prices offers and keeps the ones worth posting: a positive price,
    /// within the local price cap, not sent before and not repeated in the
    /// batch.
    fn select_offers(
        offers: Vec<Offer>,
        rate: f64,
        max_local_price: f64,
        sent_ids: &HashSet<String>,
        limit: Option<usize>,
    ) -> Vec<PricedOffer> {
        let mut seen = HashSet::new();

        offers
            .into_iter()
            .filter_map(|offer| {
                let Some(source_price) = offer.price.filter(|p| p.is_finite() && *p > 0.0) else {
                    tracing::debug!("Skipping offer {} without a usable price", offer.id);
                    return None;
                };

                let local_price = to_local(source_price, rate);
                let within_cap =
                    local_price.is_finite() && local_price > 0.0 && local_price <= max_local_price;
                if !within_cap {
                    return None;
                }
                if sent_ids.contains(&offer.id) || !seen.insert(offer.id.clone()) {
                    return None;
                }

                Some(PricedOffer { offer, source_price, local_price, rate })
            })
            .take(limit.unwrap_or(usize::MAX))
            .collect()
    }
}
