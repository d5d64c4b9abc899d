use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default public REST endpoint
pub const DEFAULT_BINANCE_API_URL: &str = "https://api.binance.com";

/// Default ticker symbol (Bitcoin quoted in Tether)
pub const DEFAULT_TICKER_SYMBOL: &str = "BTCUSDT";

/// Default request timeout
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum TickerError {
    #[error("Ticker request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected ticker response: {0}")]
    UnexpectedShape(String),

    #[error("Ticker returned {actual}, expected {expected}")]
    UnexpectedSymbol { expected: String, actual: String },

    #[error("Invalid price {raw:?}: {source}")]
    InvalidPrice {
        raw: String,
        #[source]
        source: rust_decimal::Error,
    },
}

/// Anything that can quote the current BTC/USD price
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_price(&self) -> Result<Decimal, TickerError>;
}

/// `GET /api/v3/ticker/price` response body
#[derive(Debug, Deserialize)]
struct TickerPrice {
    symbol: String,
    price: Value,
}

impl TickerPrice {
    /// Binance quotes prices as strings; plain JSON numbers are accepted too
    fn to_decimal(&self) -> Result<Decimal, TickerError> {
        let raw = match &self.price {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            other => {
                return Err(TickerError::UnexpectedShape(format!(
                    "price field is {}",
                    other
                )));
            }
        };

        Decimal::from_str(raw.trim())
            .or_else(|_| Decimal::from_scientific(raw.trim()))
            .map_err(|source| TickerError::InvalidPrice { raw, source })
    }
}

/// Parse a ticker body and check it quotes `expected_symbol`
fn parse_ticker(body: &str, expected_symbol: &str) -> Result<Decimal, TickerError> {
    let ticker: TickerPrice = serde_json::from_str(body)
        .map_err(|e| TickerError::UnexpectedShape(e.to_string()))?;

    if !ticker.symbol.eq_ignore_ascii_case(expected_symbol) {
        return Err(TickerError::UnexpectedSymbol {
            expected: expected_symbol.to_string(),
            actual: ticker.symbol,
        });
    }

    ticker.to_decimal()
}

/// Binance spot ticker client
#[derive(Clone)]
pub struct BinanceTicker {
    client: Client,
    base_url: String,
    symbol: String,
}

impl BinanceTicker {
    pub fn new(
        base_url: impl Into<String>,
        symbol: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TickerError> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            symbol: symbol.into().to_uppercase(),
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    fn ticker_url(&self) -> String {
        format!("{}/api/v3/ticker/price", self.base_url)
    }
}

#[async_trait]
impl PriceSource for BinanceTicker {
    async fn fetch_price(&self) -> Result<Decimal, TickerError> {
        let body = self
            .client
            .get(self.ticker_url())
            .query(&[("symbol", self.symbol.as_str())])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let price = parse_ticker(&body, &self.symbol)?;
        tracing::debug!(symbol = %self.symbol, price = %price, "Fetched ticker price");

        Ok(price)
    }
}
