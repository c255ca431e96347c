mod format;

use async_trait::async_trait;
use mockall::automock;
use teloxide::{
    prelude::*,
    types::{InputFile, ParseMode, Recipient},
};
use thiserror::Error;

pub use format::{BuyButton, OfferFormatter, OfferPost, PricedOffer};

/// Errors from the messaging service.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// The Telegram API rejected the request or could not be reached.
    #[error("Teloxide API request failed: {0}")]
    TeloxideRequest(#[from] teloxide::RequestError),
}

type Result<T> = std::result::Result<T, MessagingError>;

/// Trait for sending messages through the bot.
#[automock]
#[async_trait]
pub trait MessagingService: Send + Sync {
    /// Sends an HTML text message.
    async fn send_text(&self, recipient: Recipient, text: String) -> Result<()>;

    /// Sends an offer as a text message with its buy button.
    async fn send_offer(&self, recipient: Recipient, post: OfferPost) -> Result<()>;

    /// Sends an offer as a photo with the caption and buy button. Posts
    /// without an image are sent as text.
    async fn send_offer_photo(&self, recipient: Recipient, post: OfferPost) -> Result<()>;
}

/// Telegram messaging service.
pub struct TelegramMessagingService {
    bot: Bot,
}

impl TelegramMessagingService {
    /// Creates a service sending through `bot`.
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MessagingService for TelegramMessagingService {
    async fn send_text(&self, recipient: Recipient, text: String) -> Result<()> {
        self.bot
            .send_message(recipient, text)
            .parse_mode(ParseMode::Html)
            .await
            .map(|_| ())
            .map_err(MessagingError::TeloxideRequest)
    }

    async fn send_offer(&self, recipient: Recipient, post: OfferPost) -> Result<()> {
        let keyboard = post.keyboard();
        let mut request = self.bot.send_message(recipient, post.caption).parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(keyboard);
        }

        request.await.map(|_| ()).map_err(MessagingError::TeloxideRequest)
    }

    async fn send_offer_photo(&self, recipient: Recipient, post: OfferPost) -> Result<()> {
        let Some(image_url) = post.image_url.clone() else {
            return self.send_offer(recipient, post).await;
        };

        let keyboard = post.keyboard();
        let mut request = self
            .bot
            .send_photo(recipient, InputFile::url(image_url))
            .caption(post.caption)
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(keyboard);
        }

        request.await.map(|_| ()).map_err(MessagingError::TeloxideRequest)
    }
}
