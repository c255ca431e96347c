use std::sync::Arc;

use teloxide::{
    dispatching::{DefaultKey, UpdateHandler},
    dptree::deps,
    error_handlers::LoggingErrorHandler,
    prelude::*,
};

use crate::bot_handler::{BotHandler, BotHandlerError, Command};

/// Encapsulates the dispatcher logic for the bot.
pub struct BotDispatcher {
    handler: Arc<BotHandler>,
}

impl BotDispatcher {
    /// Creates a new `BotDispatcher`.
    pub fn new(handler: Arc<BotHandler>) -> Self {
        Self { handler }
    }

    /// Builds the dispatcher using the provided `bot` instance.
    #[must_use = "This function returns a Dispatcher that should not be ignored"]
    pub fn build(&self, bot: Bot) -> Dispatcher<Bot, BotHandlerError, DefaultKey> {
        Dispatcher::builder(bot, dptree::entry().branch(self.build_commands_branch()))
            .dependencies(deps![self.handler.clone()])
            // Plain messages and channel posts are not for us.
            .default_handler(|_| std::future::ready(()))
            .error_handler(LoggingErrorHandler::with_custom_text(
                "An error occurred while handling a command",
            ))
            .enable_ctrlc_handler()
            .build()
    }

    /// Builds the branch for handling text commands.
    fn build_commands_branch(&self) -> UpdateHandler<BotHandlerError> {
        Update::filter_message().filter_command::<Command>().endpoint(
            |msg: Message, cmd: Command, handler: Arc<BotHandler>| async move {
                let sender = msg.from.as_ref().map(|user| user.id);
                handler.handle_command(msg.chat.id, sender, cmd).await
            },
        )
    }
}
