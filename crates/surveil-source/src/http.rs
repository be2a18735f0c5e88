//! REST market data provider.
//!
//! Issues `GET {base_url}/quote/{symbol}` and decodes a JSON quote body:
//!
//! ```json
//! {"symbol": "AAPL", "price": "187.20", "volume": "1200", "bid": "187.19",
//!  "ask": "187.21", "timestamp": "2024-05-01T14:30:00Z"}
//! ```
//!
//! Numbers may be JSON strings or numbers. `timestamp` is optional and
//! defaults to the receive time.
//!
//! `GET {base_url}/history/{symbol}?limit=N` returns an array of quote
//! bodies, each with a timestamp. `GET {base_url}/book/{symbol}?depth=N`
//! returns `{"bids": [[price, size], ...], "asks": [...]}`.

use crate::error::{SourceError, SourceResult};
use crate::provider::{BoxFuture, DataKind, FetchOutcome, QuoteProvider};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use surveil_core::{BookLevel, OrderBook, Snapshot, Symbol};
use tracing::debug;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Quote body returned by the endpoint.
#[derive(Debug, Deserialize)]
struct QuoteBody {
    #[serde(default)]
    symbol: Option<String>,
    price: Decimal,
    volume: Decimal,
    #[serde(default)]
    bid: Option<Decimal>,
    #[serde(default)]
    ask: Option<Decimal>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct BookBody {
    #[serde(default)]
    symbol: Option<String>,
    bids: Vec<(Decimal, Decimal)>,
    asks: Vec<(Decimal, Decimal)>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

/// Map a non-success HTTP status to an outcome; `None` means read the body.
fn classify_status<T>(status: StatusCode) -> Option<FetchOutcome<T>> {
    match status {
        StatusCode::TOO_MANY_REQUESTS => Some(FetchOutcome::RateLimited),
        StatusCode::NOT_FOUND => Some(FetchOutcome::NotFound),
        s if !s.is_success() => Some(FetchOutcome::Transient(format!("HTTP {s}"))),
        _ => None,
    }
}

/// Provider backed by a REST market data endpoint.
pub struct HttpQuoteProvider {
    id: String,
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpQuoteProvider {
    /// Create a new HTTP provider.
    ///
    /// # Arguments
    /// * `base_url` - Endpoint root, without trailing `/quote`
    pub fn new(
        id: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> SourceResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| SourceError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            id: id.into(),
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url(&self, path: &str, symbol: &Symbol) -> String {
        format!("{}/{path}/{}", self.base_url, symbol)
    }

    fn quote_url(&self, symbol: &Symbol) -> String {
        self.url("quote", symbol)
    }

    /// GET `url` and decode a successful body with `parse`.
    async fn get<T>(
        &self,
        url: String,
        query: Vec<(&'static str, String)>,
        parse: impl FnOnce(&[u8]) -> Result<T, String>,
    ) -> FetchOutcome<T> {
        let mut request = self.client.get(url).query(&query);
        if let Some(key) = &self.api_key {
            request = request.query(&[("apikey", key)]);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => return FetchOutcome::Transient(format!("HTTP request failed: {e}")),
        };

        if let Some(outcome) = classify_status(response.status()) {
            return outcome;
        }

        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => return FetchOutcome::Transient(format!("Failed to read body: {e}")),
        };

        match parse(&bytes) {
            Ok(value) => FetchOutcome::Success(value),
            Err(reason) => FetchOutcome::Malformed(reason),
        }
    }

    async fn fetch_inner(&self, symbol: &Symbol) -> FetchOutcome {
        let outcome = self
            .get(self.quote_url(symbol), Vec::new(), |b| parse_quote(b, symbol, &self.id))
            .await;
        if let FetchOutcome::Success(snapshot) = &outcome {
            debug!(provider = %self.id, symbol = %symbol, price = %snapshot.price, "Quote received");
        }
        outcome
    }
}

impl QuoteProvider for HttpQuoteProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn supports(&self, _kind: DataKind) -> bool {
        true
    }

    fn fetch<'a>(&'a self, symbol: &'a Symbol) -> BoxFuture<'a, FetchOutcome> {
        Box::pin(self.fetch_inner(symbol))
    }

    fn fetch_history<'a>(
        &'a self,
        symbol: &'a Symbol,
        limit: usize,
    ) -> BoxFuture<'a, FetchOutcome<Vec<Snapshot>>> {
        Box::pin(self.get(
            self.url("history", symbol),
            vec![("limit", limit.to_string())],
            move |b| parse_history(b, symbol, &self.id),
        ))
    }

    fn fetch_order_book<'a>(
        &'a self,
        symbol: &'a Symbol,
        depth: usize,
    ) -> BoxFuture<'a, FetchOutcome<OrderBook>> {
        Box::pin(self.get(
            self.url("book", symbol),
            vec![("depth", depth.to_string())],
            move |b| parse_book(b, symbol, &self.id),
        ))
    }
}

fn check_symbol(reported: Option<&str>, requested: &Symbol) -> Result<(), String> {
    if let Some(reported) = reported {
        let reported = Symbol::new(reported);
        if &reported != requested {
            return Err(format!("symbol mismatch: asked {requested}, got {reported}"));
        }
    }
    Ok(())
}

/// Decode a quote body into a snapshot attributed to `source`.
fn parse_quote(bytes: &[u8], requested: &Symbol, source: &str) -> Result<Snapshot, String> {
    let body: QuoteBody =
        serde_json::from_slice(bytes).map_err(|e| format!("Failed to parse response: {e}"))?;

    check_symbol(body.symbol.as_deref(), requested)?;

    let mut snapshot = Snapshot::new(
        requested.clone(),
        body.timestamp.unwrap_or_else(Utc::now),
        body.price,
        body.volume,
        source,
    );
    snapshot.bid = body.bid;
    snapshot.ask = body.ask;
    snapshot.validate().map_err(|e| e.to_string())?;
    Ok(snapshot)
}

/// Decode a history array. Every point must carry its own timestamp.
fn parse_history(bytes: &[u8], requested: &Symbol, source: &str) -> Result<Vec<Snapshot>, String> {
    let bodies: Vec<QuoteBody> =
        serde_json::from_slice(bytes).map_err(|e| format!("Failed to parse response: {e}"))?;

    bodies
        .into_iter()
        .map(|body| {
            check_symbol(body.symbol.as_deref(), requested)?;
            let timestamp = body
                .timestamp
                .ok_or_else(|| "history point without timestamp".to_string())?;
            let mut snapshot =
                Snapshot::new(requested.clone(), timestamp, body.price, body.volume, source);
            snapshot.bid = body.bid;
            snapshot.ask = body.ask;
            Ok(snapshot)
        })
        .collect()
}

fn parse_book(bytes: &[u8], requested: &Symbol, source: &str) -> Result<OrderBook, String> {
    let body: BookBody =
        serde_json::from_slice(bytes).map_err(|e| format!("Failed to parse response: {e}"))?;
    check_symbol(body.symbol.as_deref(), requested)?;

    let levels = |side: Vec<(Decimal, Decimal)>| {
        side.into_iter()
            .map(|(price, size)| BookLevel::new(price, size))
            .collect()
    };
    Ok(OrderBook::new(
        requested.clone(),
        body.timestamp.unwrap_or_else(Utc::now),
        levels(body.bids),
        levels(body.asks),
        source,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_quote_string_numbers() {
        let body = br#"{"symbol":"aapl","price":"187.20","volume":"1200","bid":"187.19","ask":"187.21","timestamp":"2024-05-01T14:30:00Z"}"#;
        let snap = parse_quote(body, &Symbol::new("AAPL"), "http-a").unwrap();
        assert_eq!(snap.price, dec!(187.20));
        assert_eq!(snap.volume, dec!(1200));
        assert_eq!(snap.bid, Some(dec!(187.19)));
        assert_eq!(snap.source, "http-a");
    }

    #[test]
    fn test_parse_quote_plain_numbers_without_quote() {
        let body = br#"{"price":10.5,"volume":300}"#;
        let snap = parse_quote(body, &Symbol::new("XYZ"), "http-a").unwrap();
        assert_eq!(snap.price, dec!(10.5));
        assert_eq!(snap.bid, None);
    }

    #[test]
    fn test_parse_quote_rejects_symbol_mismatch() {
        let body = br#"{"symbol":"MSFT","price":"1","volume":"1"}"#;
        assert!(parse_quote(body, &Symbol::new("AAPL"), "p").is_err());
    }

    #[test]
    fn test_parse_quote_rejects_invalid_values() {
        let negative = br#"{"price":"-1","volume":"1"}"#;
        assert!(parse_quote(negative, &Symbol::new("AAPL"), "p").is_err());

        let garbage = b"<html>oops</html>";
        assert!(parse_quote(garbage, &Symbol::new("AAPL"), "p").is_err());
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(
            classify_status::<Snapshot>(StatusCode::TOO_MANY_REQUESTS),
            Some(FetchOutcome::RateLimited)
        );
        assert_eq!(
            classify_status::<Snapshot>(StatusCode::NOT_FOUND),
            Some(FetchOutcome::NotFound)
        );
        assert_eq!(
            classify_status::<Snapshot>(StatusCode::INTERNAL_SERVER_ERROR),
            Some(FetchOutcome::Transient(
                "HTTP 500 Internal Server Error".to_string()
            ))
        );
        assert!(matches!(
            classify_status::<Snapshot>(StatusCode::SERVICE_UNAVAILABLE),
            Some(FetchOutcome::Transient(_))
        ));
        assert_eq!(classify_status::<Snapshot>(StatusCode::OK), None);
    }

    #[test]
    fn test_parse_history_requires_timestamps() {
        let body = br#"[{"price":"10","volume":"1","timestamp":"2024-05-01T14:30:00Z"},
                        {"price":"10.5","volume":"2","timestamp":"2024-05-01T14:31:00Z"}]"#;
        let history = parse_history(body, &Symbol::new("XYZ"), "p").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].price, dec!(10.5));

        let untimed = br#"[{"price":"10","volume":"1"}]"#;
        assert!(parse_history(untimed, &Symbol::new("XYZ"), "p").is_err());
    }

    #[test]
    fn test_parse_book() {
        let body = br#"{"bids":[["99","5"],["99.5",3]],"asks":[["100.5","4"]]}"#;
        let book = parse_book(body, &Symbol::new("XYZ"), "p").unwrap();
        assert_eq!(book.best_bid(), Some(dec!(99.5)));
        assert_eq!(book.best_ask(), Some(dec!(100.5)));
        assert!(book.validate().is_ok());

        let wrong = br#"{"symbol":"ABC","bids":[],"asks":[]}"#;
        assert!(parse_book(wrong, &Symbol::new("XYZ"), "p").is_err());
    }

    #[test]
    fn test_quote_url() {
        let p = HttpQuoteProvider::new("p", "https://quotes.example/v1/", None).unwrap();
        assert_eq!(
            p.quote_url(&Symbol::new("brk.b")),
            "https://quotes.example/v1/quote/BRK.B"
        );
    }
}
