use teloxide::utils::{command::BotCommands, html};

use crate::bot_handler::{BotHandlerResult, Command, commands::CommandContext};

pub async fn handle(ctx: CommandContext<'_>) -> BotHandlerResult<()> {
    let text = html::escape(&Command::descriptions().to_string());
    ctx.handler.reply(ctx.chat_id, text).await
}
