mod commands;

use std::sync::Arc;

use teloxide::{
    types::{ChatId, Recipient, UserId},
    utils::{command::BotCommands, html},
};
use thiserror::Error;

pub use commands::offer::{ManualOffer, ManualOfferError, parse_manual_offer};
use crate::{
    bot_handler::commands::CommandContext,
    messaging::{MessagingError, MessagingService, OfferFormatter},
    publisher::{DealPublisher, PublisherError},
};

/// Comandos disponíveis:
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    /// Mostra a mensagem de boas-vindas.
    Start,
    /// Mostra esta ajuda.
    Help,
    /// Envia um link da loja com botão de compra: /promo <link>
    Promo(String),
    /// Envia uma oferta manual: /oferta <link> | <nome> | <preço>
    Oferta(String),
    /// Publica agora até N ofertas novas: /ofertas [N]
    Ofertas(String),
}

/// Errors raised while handling a command.
#[derive(Debug, Error)]
pub enum BotHandlerError {
    /// A reply or post could not be sent.
    #[error("Failed to send message: {0}")]
    SendError(#[from] MessagingError),

    /// An `/ofertas` run failed.
    #[error("Failed to publish offers: {0}")]
    Publisher(#[from] PublisherError),
}

/// Result of a command handler.
pub type BotHandlerResult<T> = Result<T, BotHandlerError>;

/// Access rules for privileged commands.
#[derive(Debug, Clone, Default)]
pub struct AccessSettings {
    /// Chat that manual offers are posted to.
    pub destination: Option<Recipient>,
    /// The only user allowed to post.
    pub admin_user_id: Option<UserId>,
    /// Domain manual offer links must belong to.
    pub store_domain: String,
}

/// Handles the commands sent to the bot.
pub struct BotHandler {
    messaging_service: Arc<dyn MessagingService>,
    publisher: Option<Arc<DealPublisher>>,
    formatter: OfferFormatter,
    access: AccessSettings,
}

impl BotHandler {
    /// Creates a new `BotHandler` instance.
    pub fn new(
        messaging_service: Arc<dyn MessagingService>,
        publisher: Option<Arc<DealPublisher>>,
        formatter: OfferFormatter,
        access: AccessSettings,
    ) -> Self {
        Self { messaging_service, publisher, formatter, access }
    }

    /// Dispatches the incoming command to the appropriate handler.
    pub async fn handle_command(
        &self,
        chat_id: ChatId,
        sender: Option<UserId>,
        cmd: Command,
    ) -> BotHandlerResult<()> {
        tracing::debug!("Handling {cmd:?} in chat {} from {sender:?}", chat_id.0);
        let ctx = CommandContext { handler: self, chat_id, sender };

        match cmd {
            Command::Start => commands::start::handle(ctx).await,
            Command::Help => commands::help::handle(ctx).await,
            Command::Promo(args) => {
                if self.authorize(&ctx).await? {
                    commands::promo::handle(ctx, &args).await?;
                }
                Ok(())
            }
            Command::Oferta(args) => {
                if self.authorize(&ctx).await? {
                    commands::offer::handle(ctx, &args).await?;
                }
                Ok(())
            }
            Command::Ofertas(args) => {
                if self.authorize(&ctx).await? {
                    commands::deals::handle(ctx, &args).await?;
                }
                Ok(())
            }
        }
    }

    /// Checks that the sender is the admin, replying when they are not.
    async fn authorize(&self, ctx: &CommandContext<'_>) -> BotHandlerResult<bool> {
        let Some(admin) = self.access.admin_user_id else {
            tracing::warn!("Privileged command rejected: ADMIN_USER_ID is not configured");
            self.reply(ctx.chat_id, "🚫 Administração desativada: ADMIN_USER_ID não configurado.")
                .await?;
            return Ok(false);
        };

        if ctx.sender == Some(admin) {
            return Ok(true);
        }

        tracing::warn!("Privileged command rejected for user {:?}", ctx.sender);
        self.reply(
            ctx.chat_id,
            "🚫 Acesso negado. Esta funcionalidade é apenas para o administrador.",
        )
        .await?;
        Ok(false)
    }

    /// Returns the destination chat, replying with a configuration error
    /// when it is missing.
    async fn destination(&self, chat_id: ChatId) -> BotHandlerResult<Option<&Recipient>> {
        if self.access.destination.is_none() {
            self.reply(
                chat_id,
                "❌ Canal de destino não configurado. Defina CHAT_ID e reinicie o bot.",
            )
            .await?;
        }
        Ok(self.access.destination.as_ref())
    }

    async fn reply(&self, chat_id: ChatId, text: impl Into<String>) -> BotHandlerResult<()> {
        self.messaging_service.send_text(Recipient::Id(chat_id), text.into()).await?;
        Ok(())
    }
}

/// Human readable name of a chat, for replies.
fn describe_recipient(recipient: &Recipient) -> String {
    match recipient {
        Recipient::Id(id) => id.0.to_string(),
        Recipient::ChannelUsername(name) => html::escape(name),
    }
}
