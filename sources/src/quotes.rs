//! Yahoo Finance quotes

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, SourceError};
use crate::http::{self, check_status};

pub const DEFAULT_ENDPOINT: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";

/// Price lookups for a set of ticker symbols.
///
/// The result is keyed by symbol, each value shaped `{ "price": { ... } }`.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn quotes(&self, symbols: &[String]) -> Result<Map<String, Value>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    quote_summary: QuoteSummary,
}

#[derive(Debug, Deserialize)]
struct QuoteSummary {
    #[serde(default)]
    result: Option<Vec<Value>>,
    #[serde(default)]
    error: Option<Value>,
}

pub struct YahooQuotes {
    http: reqwest::Client,
    endpoint: String,
}

impl YahooQuotes {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: http::client(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    /// The quoteSummary URL for `symbol`, carried as one encoded path segment
    fn url(&self, symbol: &str) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| SourceError::InvalidInput(format!("quotes endpoint {}: {e}", self.endpoint)))?;
        url.path_segments_mut()
            .map_err(|()| SourceError::InvalidInput(format!("quotes endpoint {} has no path", self.endpoint)))?
            .pop_if_empty()
            .push(symbol);
        Ok(url)
    }

    async fn price(&self, symbol: &str) -> Result<Value> {
        let response = self
            .http
            .get(self.url(symbol)?)
            .query(&[("modules", "price")])
            .send()
            .await?;
        let envelope: Envelope = check_status("quotes", response)?.json().await?;

        if let Some(error) = envelope.quote_summary.error.filter(|e| !e.is_null()) {
            let message = error
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(SourceError::Api {
                source_name: "quotes",
                message,
            });
        }

        envelope
            .quote_summary
            .result
            .and_then(|results| results.into_iter().next())
            .and_then(|mut first| first.get_mut("price").map(Value::take))
            .ok_or_else(|| SourceError::Parse(format!("no price module for {symbol}")))
    }
}

impl Default for YahooQuotes {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

#[async_trait]
impl QuoteSource for YahooQuotes {
    async fn quotes(&self, symbols: &[String]) -> Result<Map<String, Value>> {
        let mut quotes = Map::new();
        for symbol in symbols {
            debug!(symbol = %symbol, "fetching quote");
            let price = self.price(symbol).await?;
            let mut entry = Map::new();
            entry.insert("price".to_string(), price);
            quotes.insert(symbol.clone(), Value::Object(entry));
        }
        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_quotes_keyed_by_symbol() {
        let mut server = mockito::Server::new_async().await;
        for (symbol, price) in [("AAPL", 189.5), ("EQNR.OL", 301.2)] {
            server
                .mock("GET", format!("/{symbol}").as_str())
                .match_query(Matcher::UrlEncoded("modules".into(), "price".into()))
                .with_status(200)
                .with_body(format!(
                    r#"{{"quoteSummary":{{"result":[{{"price":{{"symbol":"{symbol}","regularMarketPrice":{{"raw":{price},"fmt":"{price}"}}}}}}],"error":null}}}}"#
                ))
                .create_async()
                .await;
        }

        let quotes = YahooQuotes::new(server.url())
            .quotes(&["AAPL".to_string(), "EQNR.OL".to_string()])
            .await
            .unwrap();

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes["AAPL"]["price"]["symbol"], "AAPL");
        assert_eq!(quotes["EQNR.OL"]["price"]["regularMarketPrice"]["raw"], 301.2);
    }

    #[tokio::test]
    async fn test_unknown_symbol_fails_the_whole_request() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/AAPL")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"quoteSummary":{"result":[{"price":{"symbol":"AAPL"}}],"error":null}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/NOPE")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"quoteSummary":{"result":null,"error":{"code":"Not Found","description":"Quote not found for ticker symbol: NOPE"}}}"#)
            .create_async()
            .await;

        let result = YahooQuotes::new(server.url())
            .quotes(&["AAPL".to_string(), "NOPE".to_string()])
            .await;
        match result {
            Err(SourceError::Api { message, .. }) => assert!(message.contains("NOPE")),
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_symbol_cannot_rewrite_the_query() {
        let mut server = mockito::Server::new_async().await;
        let lookup = server
            .mock("GET", Matcher::Regex(r"^/AAPL(%3F|\?)modules=assetProfile&$".to_string()))
            .match_query(Matcher::Regex("^modules=price$".to_string()))
            .with_status(200)
            .with_body(r#"{"quoteSummary":{"result":null,"error":{"description":"Quote not found"}}}"#)
            .expect(1)
            .create_async()
            .await;

        let result = YahooQuotes::new(server.url())
            .quotes(&["AAPL?modules=assetProfile&".to_string()])
            .await;

        lookup.assert_async().await;
        assert!(matches!(result, Err(SourceError::Api { .. })));
    }

    #[test]
    fn test_symbol_is_one_path_segment() {
        let quotes = YahooQuotes::new("https://query2.finance.yahoo.com/v10/finance/quoteSummary/");
        assert_eq!(
            quotes.url("EQNR.OL").unwrap().as_str(),
            "https://query2.finance.yahoo.com/v10/finance/quoteSummary/EQNR.OL"
        );
        assert_eq!(
            quotes.url("../x#y").unwrap().as_str(),
            "https://query2.finance.yahoo.com/v10/finance/quoteSummary/..%2Fx%23y"
        );
    }

    #[test]
    fn test_unparseable_endpoint_is_invalid_input() {
        assert!(matches!(
            YahooQuotes::new("not a url").url("AAPL"),
            Err(SourceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_no_symbols_is_empty() {
        let quotes = YahooQuotes::new("http://127.0.0.1:1").quotes(&[]).await.unwrap();
        assert!(quotes.is_empty());
    }
}
