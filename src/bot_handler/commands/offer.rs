use teloxide::utils::html;
use thiserror::Error;

use crate::{
    bot_handler::{BotHandlerResult, commands::CommandContext, describe_recipient},
    pricing::{format_local_price, parse_local_price},
};

/// An offer typed by the admin as `<link> | <name> | <price>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualOffer {
    /// Product link on the store.
    pub url: String,
    /// Game name as typed.
    pub name: String,
    /// Price in local currency.
    pub price: f64,
}

/// Why a manual offer was rejected. The messages are shown to the admin.
#[derive(Debug, Error, PartialEq)]
pub enum ManualOfferError {
    /// No arguments.
    #[error(
        "❌ Comando incompleto. Use: <code>/oferta &lt;link&gt; | &lt;Nome do Jogo&gt; | \
         &lt;Preço em BRL&gt;</code>"
    )]
    Empty,
    /// Not exactly three `|`-separated parts.
    #[error(
        "❌ Formato inválido. Use exatamente duas barras | para separar Link, Nome e Preço.\nExemplo: \
         <code>/oferta https://www.eneba.com/game | God of War Ragnarok | 149,90</code>"
    )]
    WrongFormat,
    /// Not an http(s) link on the store domain held here.
    #[error("❌ Link inválido. Por favor, cole uma URL completa da loja ({0}).")]
    InvalidLink(String),
    /// Blank name.
    #[error("❌ Informe o nome do jogo.")]
    MissingName,
    /// The price text, which is not a positive amount.
    #[error(
        "❌ Preço inválido: <code>{0}</code>. Certifique-se de que é um número válido (ex: 149,90)."
    )]
    InvalidPrice(String),
}

/// Parses `<link> | <name> | <price>`. The link must be an http(s) URL on
/// `store_domain`.
pub fn parse_manual_offer(args: &str, store_domain: &str) -> Result<ManualOffer, ManualOfferError> {
    if args.trim().is_empty() {
        return Err(ManualOfferError::Empty);
    }

    let parts: Vec<&str> = args.splitn(3, '|').map(str::trim).collect();
    let [url, name, price] = parts[..] else {
        return Err(ManualOfferError::WrongFormat);
    };

    if !url.starts_with("http") || !url.contains(store_domain) {
        return Err(ManualOfferError::InvalidLink(html::escape(store_domain)));
    }
    if name.is_empty() {
        return Err(ManualOfferError::MissingName);
    }
    let price =
        parse_local_price(price).ok_or_else(|| ManualOfferError::InvalidPrice(html::escape(price)))?;

    Ok(ManualOffer { url: url.to_string(), name: name.to_string(), price })
}

pub async fn handle(ctx: CommandContext<'_>, args: &str) -> BotHandlerResult<()> {
    let offer = match parse_manual_offer(args, &ctx.handler.access.store_domain) {
        Ok(offer) => offer,
        Err(e) => {
            tracing::debug!("Rejected manual offer '{args}': {e:?}");
            return ctx.handler.reply(ctx.chat_id, e.to_string()).await;
        }
    };

    let Some(destination) = ctx.handler.destination(ctx.chat_id).await? else {
        return Ok(());
    };

    ctx.handler
        .reply(
            ctx.chat_id,
            format!("Processando oferta manual para: {}...", html::escape(&offer.name)),
        )
        .await?;

    let post = ctx.handler.formatter.format_manual(&offer.url, &offer.name, offer.price);
    let affiliate_link = post.link.clone();

    match ctx.handler.messaging_service.send_offer(destination.clone(), post).await {
        Ok(()) => {
            tracing::info!(
                "Manual offer '{}' posted at R$ {}",
                offer.name,
                format_local_price(offer.price)
            );
            ctx.handler
                .reply(
                    ctx.chat_id,
                    format!(
                        "✅ Oferta enviada com sucesso para o canal: {}",
                        describe_recipient(destination)
                    ),
                )
                .await
        }
        Err(e) => {
            tracing::error!("Failed to post manual offer to {destination:?}: {e}");
            ctx.handler
                .reply(
                    ctx.chat_id,
                    format!(
                        "❌ ERRO CRÍTICO ao enviar para o canal. Verifique permissões/ID. O link \
                         gerado foi: {}",
                        html::escape(&affiliate_link)
                    ),
                )
                .await
        }
    }
}
