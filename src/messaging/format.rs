use teloxide::{
    types::{InlineKeyboardButton, InlineKeyboardMarkup},
    utils::html,
};
use url::Url;

use crate::{affiliate::AffiliateLinker, offers::Offer, pricing::format_local_price};

/// An offer with its price converted to local currency.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedOffer {
    /// The offer as discovered.
    pub offer: Offer,
    /// Price in the source currency.
    pub source_price: f64,
    /// Price converted to local currency.
    pub local_price: f64,
    /// Rate used for the conversion.
    pub rate: f64,
}

/// Inline "buy" control attached to a post.
#[derive(Debug, Clone, PartialEq)]
pub struct BuyButton {
    /// Button text.
    pub label: String,
    /// Affiliate link the button opens.
    pub url: Url,
}

/// A rendered channel post. The caption is Telegram HTML.
#[derive(Debug, Clone, PartialEq)]
pub struct OfferPost {
    /// Message text, or the photo caption.
    pub caption: String,
    /// Product image. Posts without one are sent as text.
    pub image_url: Option<Url>,
    /// `None` when the link went into the caption instead.
    pub button: Option<BuyButton>,
    /// The affiliate link the post points to.
    pub link: String,
}

impl OfferPost {
    /// Inline keyboard holding the buy button, if any.
    pub fn keyboard(&self) -> Option<InlineKeyboardMarkup> {
        self.button.as_ref().map(|button| {
            InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url(
                button.label.clone(),
                button.url.clone(),
            )]])
        })
    }

    /// Text-only variant with the link written into the caption, used when
    /// a photo post is rejected. A post without a button already carries
    /// the link inline.
    pub fn text_fallback(&self) -> OfferPost {
        let caption = match self.button {
            Some(_) => with_inline_link(&self.caption, &self.link),
            None => self.caption.clone(),
        };

        OfferPost {
            caption,
            image_url: None,
            button: None,
            link: self.link.clone(),
        }
    }
}

fn with_inline_link(caption: &str, link: &str) -> String {
    format!("{caption}\n\n{}", html::link(link, "🛒 COMPRE AQUI! 🛒"))
}

/// Renders offers into channel posts carrying affiliate links.
#[derive(Debug, Clone)]
pub struct OfferFormatter {
    linker: AffiliateLinker,
    store_name: String,
}

impl OfferFormatter {
    /// Creates a formatter tagging links with `linker`.
    pub fn new(linker: AffiliateLinker, store_name: &str) -> Self {
        Self { linker, store_name: store_name.to_uppercase() }
    }

    /// The affiliate linker used for every post.
    pub fn linker(&self) -> &AffiliateLinker {
        &self.linker
    }

    /// Post for an offer found by the publisher.
    pub fn format_discovered(&self, priced: &PricedOffer) -> OfferPost {
        let caption = format!(
            "🔥 <b>NOVA OFERTA!</b> 🔥\n\n🏷️ Jogo: <b>{}</b>\n💸 Preço Estimado: <b>R$ {}</b>\n<i>Preço \
             em USD: ${:.2} | Câmbio: {:.4}</i>\n\n👇 Clique no botão abaixo para comprar!",
            html::escape(&priced.offer.name),
            format_local_price(priced.local_price),
            priced.source_price,
            priced.rate,
        );
        let image_url = priced.offer.image_url.as_deref().and_then(|u| Url::parse(u).ok());

        self.build(caption, &priced.offer.url, image_url, "🛒 COMPRE AQUI! 🛒")
    }

    /// Post for an offer entered by hand, priced directly in local currency.
    pub fn format_manual(&self, url: &str, name: &str, local_price: f64) -> OfferPost {
        let caption = format!(
            "🚨 <b>OFERTA QUENTE NA {}!</b> 🚨\n\n🎮 <b>{}</b>\n💰 Preço: <b>R$ {}</b>\n\n🔗 Link do \
             Produto: {}\n\nSeu código de afiliado: {}",
            html::escape(&self.store_name),
            html::escape(name),
            format_local_price(local_price),
            html::escape(url),
            html::code_inline(self.linker.affiliate_id()),
        );

        self.build(caption, url, None, "🔥 COMPRE AQUI E APOIE O CANAL! 🔥")
    }

    /// Bare promotion of a product link.
    pub fn format_promo(&self, url: &str) -> OfferPost {
        let caption = format!(
            "🔥 <b>OFERTA {}</b> 🔥\n\nClique no botão abaixo para comprar:",
            html::escape(&self.store_name)
        );

        self.build(caption, url, None, "🛒 COMPRE AQUI")
    }

    fn build(
        &self,
        caption: String,
        product_url: &str,
        image_url: Option<Url>,
        label: &str,
    ) -> OfferPost {
        let link = self.linker.rewrite(product_url);

        match Url::parse(&link) {
            Ok(url) => OfferPost {
                caption,
                image_url,
                button: Some(BuyButton { label: label.to_string(), url }),
                link,
            },
            // Telegram rejects buttons with invalid URLs, so the link goes
            // into the text instead.
            Err(_) => OfferPost {
                caption: with_inline_link(&caption, &link),
                image_url,
                button: None,
                link,
            },
        }
    }
}
