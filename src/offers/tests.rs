use reqwest::Client;
use url::Url;

use super::{
    CsvFeedSource, HtmlScraperSource, Offer, OfferSource, OfferSourceError, OfferSourceKind,
    csv_feed::parse_feed, scraper::parse_listing,
};
use crate::test_helpers::{serve, unreachable_url};

fn base_url() -> Url {
    Url::parse("https://www.eneba.com/br/store/games").unwrap()
}

#[test]
fn test_parse_feed() {
    let body = "\
id,name,final_price,url,image
42,Elden Ring,10.00,https://www.eneba.com/steam-elden-ring,https://img.eneba.com/er.jpg
43,Hades,4.5,https://www.eneba.com/steam-hades,
";
    let offers = parse_feed(body).unwrap();

    assert_eq!(
        offers,
        vec![
            Offer {
                id: "42".to_string(),
                name: "Elden Ring".to_string(),
                price: Some(10.0),
                url: "https://www.eneba.com/steam-elden-ring".to_string(),
                image_url: Some("https://img.eneba.com/er.jpg".to_string()),
            },
            Offer {
                id: "43".to_string(),
                name: "Hades".to_string(),
                price: Some(4.5),
                url: "https://www.eneba.com/steam-hades".to_string(),
                image_url: None,
            },
        ]
    );
}

#[test]
fn test_parse_feed_drops_incomplete_rows() {
    let body = "\
id,name,price,url
,No Id,1.00,https://www.eneba.com/no-id
2,No Price,,https://www.eneba.com/no-price
3,Bad Price,abc,https://www.eneba.com/bad-price
4,Not A Number,NaN,https://www.eneba.com/nan
5,Short Row
6,Good,2.50,https://www.eneba.com/good
";
    let offers = parse_feed(body).unwrap();

    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].id, "6");
    assert_eq!(offers[0].price, Some(2.5));
}

#[test]
fn test_parse_feed_drops_multi_line_ids() {
    let body = "id,name,final_price,url\n\"a\nb\",Split,1.0,https://www.eneba.com/split\n\
                c,Whole,1.0,https://www.eneba.com/whole\n";
    let offers = parse_feed(body).unwrap();

    let ids: Vec<_> = offers.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["c"]);
}

#[test]
fn test_parse_feed_ignores_extra_columns_and_bom() {
    let body = "\u{feff}sku,id,name,final_price,currency,url\nX,7,Celeste,3.99,USD,https://www.eneba.com/celeste\n";
    let offers = parse_feed(body).unwrap();

    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].id, "7");
    assert_eq!(offers[0].name, "Celeste");
}

#[test]
fn test_parse_feed_missing_column() {
    let body = "id,name,url\n1,Game,https://www.eneba.com/game\n";
    assert!(matches!(parse_feed(body), Err(OfferSourceError::MissingColumn("final_price"))));
}

#[test]
fn test_parse_feed_empty_body() {
    assert!(matches!(parse_feed(""), Err(OfferSourceError::MissingColumn(_))));
}

#[test]
fn test_parse_listing() {
    let html = r#"
        <html><body>
          <div class="ProductCard_wrapper">
            <a href="/steam-elden-ring-pc-steam-key-global">
              <img src="https://img.eneba.com/er.jpg" alt="Elden Ring">
              <span class="ProductCard_title">Elden Ring  Steam Key</span>
            </a>
            <span class="ProductCard_oldPrice">$59.99</span>
            <span class="ProductCard_price">$29.99</span>
          </div>
          <div class="ProductCard_wrapper">
            <a href="https://www.eneba.com/steam-hades?x=1">
              <img data-src="/img/hades.jpg" alt="Hades">
            </a>
            <span class="ProductCard_price">R$ 1.299,90</span>
          </div>
        </body></html>
    "#;

    let offers = parse_listing(html, &base_url());

    assert_eq!(offers.len(), 2);

    assert_eq!(offers[0].id, "/steam-elden-ring-pc-steam-key-global");
    assert_eq!(offers[0].name, "Elden Ring Steam Key");
    assert_eq!(offers[0].price, Some(29.99));
    assert_eq!(offers[0].url, "https://www.eneba.com/steam-elden-ring-pc-steam-key-global");
    assert_eq!(offers[0].image_url.as_deref(), Some("https://img.eneba.com/er.jpg"));

    assert_eq!(offers[1].id, "/steam-hades");
    assert_eq!(offers[1].name, "Hades");
    assert_eq!(offers[1].price, Some(1299.9));
    assert_eq!(offers[1].image_url.as_deref(), Some("https://www.eneba.com/img/hades.jpg"));
}

#[test]
fn test_parse_listing_missing_fields_are_empty() {
    let html = r#"
        <ul>
          <li class="product-item"><a href="/steam-mystery-game">?</a></li>
          <li class="product-item"><span class="price">$5.00</span></li>
        </ul>
    "#;

    let offers = parse_listing(html, &base_url());

    // The second card has no link and therefore no id.
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].id, "/steam-mystery-game");
    assert_eq!(offers[0].name, "steam-mystery-game");
    assert_eq!(offers[0].price, None);
    assert_eq!(offers[0].image_url, None);
}

#[test]
fn test_parse_listing_unparsable_price_is_none() {
    let html = r#"
        <article class="product">
          <a href="/steam-free-game"><h3>Free Game</h3></a>
          <span class="price">Grátis</span>
        </article>
    "#;

    let offers = parse_listing(html, &base_url());

    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].name, "Free Game");
    assert_eq!(offers[0].price, None);
}

#[test]
fn test_parse_listing_uses_structured_data_price() {
    let html = r#"
        <html><head>
          <script type="application/ld+json">
            {"@context":"https://schema.org","@type":"ItemList","itemListElement":[
              {"@type":"ListItem","position":1,"item":{
                "@type":"Product","name":"Hollow Knight",
                "url":"https://www.eneba.com/steam-hollow-knight",
                "offers":{"@type":"Offer","price":"7.49","priceCurrency":"USD"}}},
              {"@type":"ListItem","position":2,"item":{
                "@type":"Product","name":"Celeste",
                "offers":[{"@type":"Offer","price":3.99},{"@type":"Offer","price":4.99}]}}
            ]}
          </script>
          <script type="application/ld+json">not json</script>
        </head><body>
          <div data-testid="product-card">
            <a href="/steam-hollow-knight"><h3>Hollow Knight</h3></a>
          </div>
          <div data-testid="product-card">
            <a href="/steam-celeste"><h3>Celeste</h3></a>
          </div>
          <div data-testid="product-card">
            <a href="/steam-unknown"><h3>Unknown</h3></a>
          </div>
        </body></html>
    "#;

    let offers = parse_listing(html, &base_url());

    assert_eq!(offers.len(), 3);
    assert_eq!(offers[0].price, Some(7.49));
    assert_eq!(offers[1].price, Some(3.99));
    assert_eq!(offers[2].price, None);
}

#[test]
fn test_parse_listing_no_cards() {
    let html = "<html><body><div class=\"banner\">Maintenance</div></body></html>";
    assert!(parse_listing(html, &base_url()).is_empty());
}

#[test]
fn test_offer_source_kind_from_str() {
    assert_eq!("csv".parse::<OfferSourceKind>(), Ok(OfferSourceKind::CsvFeed));
    assert_eq!(" HTML ".parse::<OfferSourceKind>(), Ok(OfferSourceKind::HtmlScraper));
    assert!("rss".parse::<OfferSourceKind>().is_err());
}

#[tokio::test]
async fn test_csv_feed_fetch() {
    let base = serve(
        "200 OK",
        "id,name,final_price,url\n1,Hades,4.5,https://www.eneba.com/steam-hades\n",
    )
    .await;
    let source = CsvFeedSource::new(Client::new(), &format!("{base}/feed.csv"));

    let offers = source.fetch().await;

    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].name, "Hades");
}

#[tokio::test]
async fn test_csv_feed_server_error_yields_no_offers() {
    let base = serve("500 Internal Server Error", "id,name,final_price,url\n").await;
    let source = CsvFeedSource::new(Client::new(), &format!("{base}/feed.csv"));

    assert!(source.fetch().await.is_empty());
}

#[tokio::test]
async fn test_csv_feed_unreachable_yields_no_offers() {
    let source = CsvFeedSource::new(Client::new(), &unreachable_url().await);

    assert!(source.fetch().await.is_empty());
}

#[tokio::test]
async fn test_scraper_server_error_yields_no_offers() {
    let base = serve("503 Service Unavailable", "<html></html>").await;
    let source = HtmlScraperSource::new(Client::new(), Url::parse(&base).unwrap());

    assert!(source.fetch().await.is_empty());
}

#[tokio::test]
async fn test_scraper_unreachable_yields_no_offers() {
    let url = Url::parse(&unreachable_url().await).unwrap();
    let source = HtmlScraperSource::new(Client::new(), url);

    assert!(source.fetch().await.is_empty());
}
