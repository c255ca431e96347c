pub mod deals;
pub mod help;
pub mod offer;
pub mod promo;
pub mod start;

use teloxide::types::{ChatId, UserId};

use crate::bot_handler::BotHandler;

/// Groups the data needed by all command handlers.
pub struct CommandContext<'a> {
    pub handler: &'a BotHandler,
    /// Chat the command was sent in. Replies go here.
    pub chat_id: ChatId,
    pub sender: Option<UserId>,
}
