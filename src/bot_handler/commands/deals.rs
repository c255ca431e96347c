use crate::{
    bot_handler::{BotHandlerResult, commands::CommandContext},
    publisher::PublishReport,
};

const DEFAULT_LIMIT: usize = 5;

/// Parses the optional offer count of `/ofertas`.
pub fn parse_limit(args: &str) -> Option<usize> {
    let args = args.trim();
    if args.is_empty() {
        return Some(DEFAULT_LIMIT);
    }
    args.parse::<usize>().ok().filter(|n| *n > 0)
}

pub async fn handle(ctx: CommandContext<'_>, args: &str) -> BotHandlerResult<()> {
    let Some(limit) = parse_limit(args) else {
        return ctx
            .handler
            .reply(ctx.chat_id, "❌ Use /ofertas [N], onde N é um número maior que zero.")
            .await;
    };

    let Some(publisher) = ctx.handler.publisher.as_ref() else {
        tracing::error!("/ofertas requested but no destination chat is configured");
        return ctx
            .handler
            .reply(
                ctx.chat_id,
                "❌ Canal de destino não configurado. Defina CHAT_ID e reinicie o bot.",
            )
            .await;
    };

    ctx.handler.reply(ctx.chat_id, format!("⏳ Buscando até {limit} ofertas novas...")).await?;

    match publisher.publish(Some(limit)).await {
        Ok(report) => ctx.handler.reply(ctx.chat_id, report_text(&report)).await,
        Err(e) => {
            tracing::error!("Manual publish failed: {e}");
            ctx.handler
                .reply(ctx.chat_id, "❌ Falha ao ler o histórico de ofertas enviadas. Nada foi enviado.")
                .await
        }
    }
}

fn report_text(report: &PublishReport) -> String {
    if report.eligible == 0 {
        return format!(
            "ℹ️ Nenhuma oferta nova encontrada ({} verificadas).",
            report.discovered
        );
    }

    let rate_note = if report.rate.is_fallback { " (câmbio padrão)" } else { "" };
    format!(
        "✅ {} ofertas enviadas, {} falharam.\n{} encontradas, {} novas. Câmbio: {:.4}{rate_note}",
        report.sent, report.failed, report.discovered, report.eligible, report.rate.value
    )
}
