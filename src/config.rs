use std::{env, path::PathBuf, str::FromStr};

use chrono::FixedOffset;
use teloxide::types::{ChatId, Recipient, UserId};
use thiserror::Error;
use url::Url;

use crate::{
    offers::OfferSourceKind,
    scheduler::{ScheduleEntry, ScheduleError, parse_schedule},
};

const DEFAULT_AFFILIATE_ID: &str = "WiillzeraTV";
const DEFAULT_FEED_URL: &str = "https://www.eneba.com/rss/products.csv?version=3";
const DEFAULT_LISTING_URL: &str = "https://www.eneba.com/store/all?sortBy=POPULARITY_DESC";
const DEFAULT_EXCHANGE_RATE_URL: &str = "https://api.exchangerate-api.com/v4/latest/USD";
const DEFAULT_TARGET_CURRENCY: &str = "BRL";
const DEFAULT_FALLBACK_RATE: f64 = 5.0;
const DEFAULT_MAX_LOCAL_PRICE: f64 = 150.0;
const DEFAULT_LEDGER_PATH: &str = "sent_offers_ids.txt";
const DEFAULT_SCHEDULE: &str = "09:00=3,13:00=3,19:00=5";
const DEFAULT_UTC_OFFSET_HOURS: i32 = -3;
const DEFAULT_SCHEDULER_TICK_SECS: u64 = 20;
const DEFAULT_SCHEDULER_GRACE_SECS: u64 = 120;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_STORE_NAME: &str = "Eneba";
const DEFAULT_STORE_DOMAIN: &str = "eneba.com";

/// Configuration that prevents the bot from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither `TELOXIDE_TOKEN` nor `BOT_TOKEN` is set.
    #[error("Telegram bot token is missing, set TELOXIDE_TOKEN or BOT_TOKEN")]
    MissingToken,
    /// `SCHEDULE` is set but cannot be parsed.
    #[error("Invalid SCHEDULE: {0}")]
    Schedule(#[from] ScheduleError),
}

/// Represents the application configuration.
#[derive(Debug)]
pub struct Config {
    /// The Telegram bot token.
    pub telegram_bot_token: String,
    /// Chat the offers are posted to. Posting is disabled without it.
    pub destination: Option<Recipient>,
    /// The only user allowed to run posting commands.
    pub admin_user_id: Option<UserId>,
    /// Affiliate identifier appended to every store link.
    pub affiliate_id: String,
    /// Which offer source to run with.
    pub offer_source: OfferSourceKind,
    /// The URL of the CSV product feed.
    pub feed_url: String,
    /// The URL of the listing page scraped for offers.
    pub listing_url: Url,
    /// The URL of the exchange rate API.
    pub exchange_rate_url: String,
    /// Currency the prices are converted to.
    pub target_currency: String,
    /// Rate used when the exchange rate API is unavailable.
    pub fallback_rate: f64,
    /// Offers above this converted price are not posted.
    pub max_local_price: f64,
    /// The path of the sent offers ledger.
    pub ledger_path: PathBuf,
    /// Daily posting slots.
    pub schedule: Vec<ScheduleEntry>,
    /// The UTC offset the schedule is expressed in.
    pub utc_offset: FixedOffset,
    /// The interval in seconds between scheduler checks.
    pub scheduler_tick_secs: u64,
    /// How late in seconds a slot may still fire.
    pub scheduler_grace_secs: u64,
    /// Timeout in seconds for outgoing HTTP requests.
    pub http_timeout_secs: u64,
    /// Display name of the store.
    pub store_name: String,
    /// Domain manual offer links must belong to.
    pub store_domain: String,
}

impl Config {
    /// Creates a new `Config` instance from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let telegram_bot_token = env::var("TELOXIDE_TOKEN")
            .or_else(|_| env::var("BOT_TOKEN"))
            .ok()
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let affiliate_id =
            env::var("AFFILIATE_ID").unwrap_or_else(|_| DEFAULT_AFFILIATE_ID.to_string());
        let feed_url = env::var("FEED_URL")
            .unwrap_or_else(|_| format!("{DEFAULT_FEED_URL}&influencer_id={affiliate_id}"));
        let schedule =
            parse_schedule(&env::var("SCHEDULE").unwrap_or_else(|_| DEFAULT_SCHEDULE.to_string()))?;

        let scheduler_tick_secs =
            parse_var("SCHEDULER_TICK_SECS", DEFAULT_SCHEDULER_TICK_SECS).max(1);
        let mut scheduler_grace_secs =
            parse_var("SCHEDULER_GRACE_SECS", DEFAULT_SCHEDULER_GRACE_SECS);
        // A slot must stay open for at least one tick or it can be missed.
        if scheduler_grace_secs < scheduler_tick_secs {
            tracing::warn!(
                "SCHEDULER_GRACE_SECS {scheduler_grace_secs} is shorter than the \
                 {scheduler_tick_secs}s tick, raising it to the tick"
            );
            scheduler_grace_secs = scheduler_tick_secs;
        }

        Ok(Self {
            telegram_bot_token,
            destination: env::var("CHAT_ID").ok().and_then(|v| parse_recipient(&v)),
            admin_user_id: env::var("ADMIN_USER_ID").ok().and_then(|v| parse_user_id(&v)),
            offer_source: parse_var("OFFER_SOURCE", OfferSourceKind::default()),
            feed_url,
            listing_url: env::var("LISTING_URL")
                .ok()
                .and_then(|v| Url::parse(&v).ok())
                .unwrap_or_else(default_listing_url),
            exchange_rate_url: env::var("EXCHANGE_RATE_URL")
                .unwrap_or_else(|_| DEFAULT_EXCHANGE_RATE_URL.to_string()),
            target_currency: env::var("TARGET_CURRENCY")
                .unwrap_or_else(|_| DEFAULT_TARGET_CURRENCY.to_string()),
            fallback_rate: parse_amount("FALLBACK_RATE", DEFAULT_FALLBACK_RATE),
            max_local_price: parse_amount("MAX_LOCAL_PRICE", DEFAULT_MAX_LOCAL_PRICE),
            ledger_path: env::var("LEDGER_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_LEDGER_PATH)),
            schedule,
            utc_offset: parse_utc_offset(
                parse_var("SCHEDULE_UTC_OFFSET", DEFAULT_UTC_OFFSET_HOURS),
            ),
            scheduler_tick_secs,
            scheduler_grace_secs,
            http_timeout_secs: parse_var("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS).max(1),
            store_name: env::var("STORE_NAME").unwrap_or_else(|_| DEFAULT_STORE_NAME.to_string()),
            store_domain: env::var("STORE_DOMAIN")
                .unwrap_or_else(|_| DEFAULT_STORE_DOMAIN.to_string()),
            affiliate_id,
        })
    }
}

/// Reads and parses an optional variable, falling back to `default` when it
/// is absent or invalid.
fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    env::var(name).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Reads an amount that must be a finite positive number, falling back to
/// `default` otherwise.
fn parse_amount(name: &str, default: f64) -> f64 {
    let value = parse_var(name, default);
    if value.is_finite() && value > 0.0 {
        return value;
    }
    tracing::warn!("{name} must be a positive number, using {default}");
    default
}

fn default_listing_url() -> Url {
    Url::parse(DEFAULT_LISTING_URL).expect("default listing URL is valid")
}

/// Parses a numeric chat id or an `@channel` username.
fn parse_recipient(value: &str) -> Option<Recipient> {
    let value = value.trim();
    if value.starts_with('@') && value.len() > 1 {
        return Some(Recipient::ChannelUsername(value.to_string()));
    }

    match value.parse::<i64>() {
        Ok(id) => Some(Recipient::Id(ChatId(id))),
        Err(_) => {
            tracing::error!("CHAT_ID '{value}' is neither a numeric id nor an @channel");
            None
        }
    }
}

fn parse_user_id(value: &str) -> Option<UserId> {
    match value.trim().parse::<u64>() {
        Ok(id) => Some(UserId(id)),
        Err(_) => {
            tracing::error!("ADMIN_USER_ID '{value}' is not a numeric user id");
            None
        }
    }
}

fn parse_utc_offset(hours: i32) -> FixedOffset {
    hours.checked_mul(3600).and_then(FixedOffset::east_opt).unwrap_or_else(|| {
        tracing::warn!("SCHEDULE_UTC_OFFSET {hours} is out of range, using {DEFAULT_UTC_OFFSET_HOURS}");
        FixedOffset::east_opt(DEFAULT_UTC_OFFSET_HOURS * 3600).expect("default offset is valid")
    })
}
