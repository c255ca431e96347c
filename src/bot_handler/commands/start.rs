use teloxide::utils::html;

use crate::bot_handler::{BotHandlerResult, commands::CommandContext};

pub async fn handle(ctx: CommandContext<'_>) -> BotHandlerResult<()> {
    let domain = html::escape(&ctx.handler.access.store_domain);
    let text = format!(
        "Olá! 👋\n\nEste é o bot de ofertas com link de afiliado.\n\n<b>Modo de uso \
         (admin):</b>\n<code>/oferta &lt;link&gt; | &lt;Nome do Jogo&gt; | &lt;Preço em \
         BRL&gt;</code>\n\nExemplo:\n<code>/oferta https://www.{domain}/game | God of War \
         Ragnarok | 149,90</code>\n\n/promo &lt;link&gt; envia um link com botão de \
         compra.\n/ofertas [N] publica agora até N ofertas novas.\n\nAs ofertas também são \
         publicadas automaticamente ao longo do dia."
    );

    ctx.handler.reply(ctx.chat_id, text).await
}
