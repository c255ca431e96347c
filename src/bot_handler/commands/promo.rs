use teloxide::utils::html;

use crate::bot_handler::{BotHandlerResult, commands::CommandContext};

pub async fn handle(ctx: CommandContext<'_>, args: &str) -> BotHandlerResult<()> {
    let link = args.trim();
    if link.is_empty() {
        return ctx
            .handler
            .reply(ctx.chat_id, "❌ Use /promo &lt;link do produto&gt; para enviar uma oferta!")
            .await;
    }

    let Some(destination) = ctx.handler.destination(ctx.chat_id).await? else {
        return Ok(());
    };

    let post = ctx.handler.formatter.format_promo(link);
    let affiliate_link = post.link.clone();

    match ctx.handler.messaging_service.send_offer(destination.clone(), post).await {
        Ok(()) => {
            tracing::info!("Promo link posted: {affiliate_link}");
            ctx.handler.reply(ctx.chat_id, "✅ Oferta enviada com sucesso!").await
        }
        Err(e) => {
            tracing::error!("Failed to post promo link: {e}");
            ctx.handler
                .reply(
                    ctx.chat_id,
                    format!(
                        "❌ Falha ao enviar para o canal. O link gerado foi: {}",
                        html::escape(&affiliate_link)
                    ),
                )
                .await
        }
    }
}
