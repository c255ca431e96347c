#![warn(missing_docs)]
//! A Telegram bot that posts affiliate-tagged game deals to a channel.
//!
//! Offers come from the store's CSV feed or its listing page, are priced in
//! local currency and posted at fixed times of day. The administrator can
//! also post links and hand-picked offers through bot commands.

/// Rewrites store links into affiliate links.
pub mod affiliate;
/// The main handler for the bot's commands.
pub mod bot_handler;
/// The configuration for the application.
pub mod config;
/// The dispatcher for routing updates to the correct handlers.
pub mod dispatcher;
/// Record of the offers already posted.
pub mod ledger;
/// Post formatting and the service for sending messages.
pub mod messaging;
/// Sources of store offers.
pub mod offers;
/// Exchange rates and price formatting.
pub mod pricing;
/// The pipeline that turns fresh offers into channel posts.
pub mod publisher;
/// Daily posting schedule.
pub mod scheduler;
#[cfg(test)]
mod test_helpers;

use std::{sync::Arc, time::Duration};

use chrono::TimeDelta;
use reqwest::Client;
use teloxide::{prelude::*, utils::command::BotCommands};

use crate::{
    affiliate::AffiliateLinker,
    bot_handler::{AccessSettings, BotHandler, Command},
    config::Config,
    ledger::FileLedger,
    messaging::{OfferFormatter, TelegramMessagingService},
    offers::{CsvFeedSource, HtmlScraperSource, OfferSource, OfferSourceKind},
    pricing::HttpExchangeRateClient,
    publisher::{DealPublisher, PublisherSettings},
    scheduler::{DealScheduler, SchedulerSettings},
};

/// Runs the bot.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let bot = Bot::new(config.telegram_bot_token.clone());
    let http_client =
        Client::builder().timeout(Duration::from_secs(config.http_timeout_secs)).build()?;

    let source: Arc<dyn OfferSource> = match config.offer_source {
        OfferSourceKind::CsvFeed => {
            Arc::new(CsvFeedSource::new(http_client.clone(), &config.feed_url))
        }
        OfferSourceKind::HtmlScraper => {
            Arc::new(HtmlScraperSource::new(http_client.clone(), config.listing_url.clone()))
        }
    };
    tracing::debug!("Offer source: {:?}", config.offer_source);

    let rate_client = Arc::new(HttpExchangeRateClient::new(
        http_client.clone(),
        &config.exchange_rate_url,
        &config.target_currency,
    ));
    let ledger = Arc::new(FileLedger::new(config.ledger_path.clone()));
    let messaging_service = Arc::new(TelegramMessagingService::new(bot.clone()));
    let formatter =
        OfferFormatter::new(AffiliateLinker::new(&config.affiliate_id), &config.store_name);

    let publisher = match &config.destination {
        Some(destination) => Some(Arc::new(DealPublisher::new(
            source,
            rate_client,
            ledger,
            messaging_service.clone(),
            formatter.clone(),
            destination.clone(),
            PublisherSettings {
                fallback_rate: config.fallback_rate,
                max_local_price: config.max_local_price,
            },
        ))),
        None => {
            tracing::error!("CHAT_ID is not configured, scheduled and manual posting are disabled");
            None
        }
    };

    // Spawn the daily scheduler.
    if let Some(publisher) = &publisher {
        let scheduler = DealScheduler::new(
            publisher.clone(),
            config.schedule.clone(),
            SchedulerSettings {
                utc_offset: config.utc_offset,
                tick_interval: Duration::from_secs(config.scheduler_tick_secs),
                grace: TimeDelta::seconds(config.scheduler_grace_secs.min(86_400) as i64),
            },
        );
        tokio::spawn(async move { scheduler.run().await });
    }

    if config.admin_user_id.is_none() {
        tracing::warn!("ADMIN_USER_ID is not configured, posting commands are disabled");
    }

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        tracing::warn!("Failed to register the command list: {e}");
    }

    let handler = Arc::new(BotHandler::new(
        messaging_service,
        publisher,
        formatter,
        AccessSettings {
            destination: config.destination.clone(),
            admin_user_id: config.admin_user_id,
            store_domain: config.store_domain.clone(),
        },
    ));
    let mut dispatcher = dispatcher::BotDispatcher::new(handler).build(bot);
    tracing::info!("Bot started, listening for commands");

    dispatcher.dispatch().await;

    Ok(())
}
