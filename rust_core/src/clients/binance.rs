//! Binance ticker feed (primary)
//!
//! Streams the BTCUSDT 24h rolling ticker. No API key required.

use super::ticker::{number_field, TickerFeed, TickerParseError, TickerQuote};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const STREAM_URL: &str = "wss://stream.binance.com:9443/ws/btcusdt@ticker";
const REST_URL: &str = "https://api.binance.com/api/v3/ticker/24hr?symbol=BTCUSDT";
const SYMBOL: &str = "BTCUSDT";

pub struct BinanceFeed {
    stream_url: String,
    rest_url: String,
}

impl BinanceFeed {
    pub fn new() -> Self {
        Self {
            stream_url: STREAM_URL.to_string(),
            rest_url: REST_URL.to_string(),
        }
    }

    /// Point at alternative endpoints (e.g. a regional mirror)
    pub fn with_endpoints(stream_url: impl Into<String>, rest_url: impl Into<String>) -> Self {
        Self {
            stream_url: stream_url.into(),
            rest_url: rest_url.into(),
        }
    }
}

impl Default for BinanceFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TickerFeed for BinanceFeed {
    fn source_name(&self) -> &str {
        "binance"
    }

    fn stream_url(&self) -> &str {
        &self.stream_url
    }

    fn ping_interval(&self) -> Duration {
        Duration::from_secs(30)
    }

    /// `{"e":"24hrTicker","s":"BTCUSDT","c":"65000.01","P":"1.234",...}`
    fn parse_message(&self, text: &str) -> Result<Option<TickerQuote>, TickerParseError> {
        let value: Value = serde_json::from_str(text)?;

        let symbol = value.get("s").and_then(Value::as_str).unwrap_or_default();
        if !symbol.eq_ignore_ascii_case(SYMBOL) {
            return Ok(None);
        }

        Ok(Some(TickerQuote {
            price: number_field(&value["c"], "c")?,
            change_24h_pct: number_field(&value["P"], "P")?,
        }))
    }

    async fn fetch_snapshot(&self, client: &Client) -> Result<TickerQuote> {
        debug!("Fetching {} from Binance", SYMBOL);

        let response = client
            .get(&self.rest_url)
            .send()
            .await
            .context("Failed to fetch from Binance")?;

        if !response.status().is_success() {
            return Err(anyhow!("Binance API error: {}", response.status()));
        }

        let ticker: Binance24hrTicker = response
            .json()
            .await
            .context("Failed to parse Binance response")?;

        Ok(TickerQuote {
            price: ticker
                .last_price
                .parse()
                .with_context(|| format!("invalid lastPrice {:?}", ticker.last_price))?,
            change_24h_pct: ticker
                .price_change_percent
                .parse()
                .with_context(|| format!("invalid priceChangePercent {:?}", ticker.price_change_percent))?,
        })
    }
}

/// Binance 24hr ticker response (fields we use)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Binance24hrTicker {
    last_price: String,
    price_change_percent: String,
}
