use super::*;
use crate::test_helpers::{serve, unreachable_url};

#[test]
fn test_parse_rate_response() {
    let body = r#"{"base":"USD","rates":{"USD":1,"BRL":5.4321,"EUR":0.92}}"#;
    let rate = parse_rate_response(body, "BRL").unwrap();
    assert!((rate - 5.4321).abs() < f64::EPSILON);
}

#[test]
fn test_parse_rate_response_missing_currency() {
    let body = r#"{"rates":{"USD":1}}"#;
    let result = parse_rate_response(body, "BRL");
    assert!(matches!(result, Err(ExchangeRateError::MissingCurrency(c)) if c == "BRL"));
}

#[test]
fn test_parse_rate_response_malformed() {
    assert!(matches!(
        parse_rate_response("<html>oops</html>", "BRL"),
        Err(ExchangeRateError::Malformed(_))
    ));
    assert!(matches!(
        parse_rate_response(r#"{"rates":{"BRL":0}}"#, "BRL"),
        Err(ExchangeRateError::InvalidRate(_))
    ));
}

#[tokio::test]
async fn test_rate_or_fallback_uses_fetched_rate() {
    let mut client = MockExchangeRateClient::new();
    client.expect_fetch_rate().times(1).returning(|| Ok(5.0));

    let rate = rate_or_fallback(&client, 4.0).await;

    assert_eq!(rate, ExchangeRate { value: 5.0, is_fallback: false });
}

#[tokio::test]
async fn test_rate_or_fallback_on_server_error() {
    let mut client = MockExchangeRateClient::new();
    client
        .expect_fetch_rate()
        .times(1)
        .returning(|| Err(ExchangeRateError::HttpStatus(StatusCode::INTERNAL_SERVER_ERROR)));

    let rate = rate_or_fallback(&client, 5.0).await;

    assert_eq!(rate, ExchangeRate { value: 5.0, is_fallback: true });
}

#[test]
fn test_to_local() {
    assert!((to_local(10.0, 5.0) - 50.0).abs() < f64::EPSILON);
}

#[test]
fn test_format_local_price() {
    assert_eq!(format_local_price(50.0), "50,00");
    assert_eq!(format_local_price(149.9), "149,90");
    assert_eq!(format_local_price(1149.904), "1.149,90");
    assert_eq!(format_local_price(1234567.5), "1.234.567,50");
    assert_eq!(format_local_price(-3.2), "-3,20");
}

#[test]
fn test_parse_price_text() {
    assert_eq!(parse_price_text("$12.34"), Some(12.34));
    assert_eq!(parse_price_text("R$ 149,90"), Some(149.90));
    assert_eq!(parse_price_text("1,299.00 USD"), Some(1299.0));
    assert_eq!(parse_price_text("R$ 1.299,00"), Some(1299.0));
    assert_eq!(parse_price_text("€1.299"), Some(1299.0));
    assert_eq!(parse_price_text("1,299"), Some(1299.0));
    assert_eq!(parse_price_text("15"), Some(15.0));
}

#[test]
fn test_parse_price_text_invalid() {
    assert_eq!(parse_price_text(""), None);
    assert_eq!(parse_price_text("Free"), None);
    assert_eq!(parse_price_text("R$ ,"), None);
}

#[test]
fn test_parse_local_price_rejects_zero() {
    assert_eq!(parse_local_price("R$ 0,00"), None);
    assert_eq!(parse_local_price("R$ 149,90"), Some(149.90));
}

#[test]
fn test_parse_local_price_rejects_text() {
    assert_eq!(parse_local_price("149.90"), Some(149.90));
    assert_eq!(parse_local_price("R$1.149,90"), Some(1149.90));
    assert_eq!(parse_local_price("cento e dez"), None);
    assert_eq!(parse_local_price("War | 10"), None);
    assert_eq!(parse_local_price("-10"), None);
}

#[tokio::test]
async fn test_http_client_fetch_rate() {
    let base = serve("200 OK", r#"{"rates":{"USD":1,"BRL":5.25}}"#).await;
    let client = HttpExchangeRateClient::new(Client::new(), &base, "brl");

    assert_eq!(client.fetch_rate().await.unwrap(), 5.25);
}

#[tokio::test]
async fn test_http_client_server_error() {
    let base = serve("500 Internal Server Error", "").await;
    let client = HttpExchangeRateClient::new(Client::new(), &base, "BRL");

    let result = client.fetch_rate().await;

    assert!(matches!(
        result,
        Err(ExchangeRateError::HttpStatus(status)) if status == StatusCode::INTERNAL_SERVER_ERROR
    ));
    assert_eq!(rate_or_fallback(&client, 5.0).await, ExchangeRate { value: 5.0, is_fallback: true });
}

#[tokio::test]
async fn test_http_client_unreachable() {
    let client = HttpExchangeRateClient::new(Client::new(), &unreachable_url().await, "BRL");

    assert!(matches!(client.fetch_rate().await, Err(ExchangeRateError::Request(_))));
    assert!(rate_or_fallback(&client, 5.0).await.is_fallback);
}
