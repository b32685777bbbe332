//! Kraken ticker feed (fallback)
//!
//! Kraken's v1 public socket needs an explicit subscribe handshake and
//! delivers ticker updates as positional arrays:
//! `[channelID, {"c": [price, lot], "o": [today, last24h], ...}, "ticker", "XBT/USD"]`.
//! The 24h change is derived from the last price and the 24h open.

use super::ticker::{change_pct_from_open, number_field, TickerFeed, TickerParseError, TickerQuote};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const STREAM_URL: &str = "wss://ws.kraken.com/";
const REST_URL: &str = "https://api.kraken.com/0/public/Ticker?pair=XBTUSD";
const STREAM_PAIR: &str = "XBT/USD";
const REST_PAIR: &str = "XXBTZUSD";

pub struct KrakenFeed {
    stream_url: String,
    rest_url: String,
}

impl KrakenFeed {
    pub fn new() -> Self {
        Self {
            stream_url: STREAM_URL.to_string(),
            rest_url: REST_URL.to_string(),
        }
    }

    pub fn with_endpoints(stream_url: impl Into<String>, rest_url: impl Into<String>) -> Self {
        Self {
            stream_url: stream_url.into(),
            rest_url: rest_url.into(),
        }
    }
}

impl Default for KrakenFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TickerFeed for KrakenFeed {
    fn source_name(&self) -> &str {
        "kraken"
    }

    fn stream_url(&self) -> &str {
        &self.stream_url
    }

    fn subscribe_message(&self) -> Option<String> {
        Some(
            json!({
                "event": "subscribe",
                "pair": [STREAM_PAIR],
                "subscription": {"name": "ticker"}
            })
            .to_string(),
        )
    }

    fn ping_interval(&self) -> Duration {
        Duration::from_secs(25)
    }

    fn parse_message(&self, text: &str) -> Result<Option<TickerQuote>, TickerParseError> {
        let value: Value = serde_json::from_str(text)?;

        // Heartbeats, status and subscription events are objects
        let Some(parts) = value.as_array() else {
            return Ok(None);
        };
        if parts.len() != 4 || parts[2].as_str() != Some("ticker") {
            return Ok(None);
        }
        if parts[3].as_str() != Some(STREAM_PAIR) {
            return Ok(None);
        }

        let data = &parts[1];
        let price = number_field(&data["c"][0], "c")?;
        let open_24h = number_field(&data["o"][1], "o")?;

        Ok(Some(TickerQuote {
            price,
            change_24h_pct: change_pct_from_open(price, open_24h),
        }))
    }

    async fn fetch_snapshot(&self, client: &Client) -> Result<TickerQuote> {
        debug!("Fetching {} from Kraken", REST_PAIR);

        let response = client
            .get(&self.rest_url)
            .send()
            .await
            .context("Failed to fetch from Kraken")?;

        if !response.status().is_success() {
            return Err(anyhow!("Kraken API error: {}", response.status()));
        }

        let body: KrakenTickerResponse = response
            .json()
            .await
            .context("Failed to parse Kraken response")?;

        if !body.error.is_empty() {
            return Err(anyhow!("Kraken API error: {}", body.error.join(", ")));
        }

        let ticker = body
            .result
            .get(REST_PAIR)
            .ok_or_else(|| anyhow!("Kraken response has no {} entry", REST_PAIR))?;

        let price = number_field(&ticker.c[0], "c")?;
        let open_24h = number_field(&ticker.o, "o")?;

        Ok(TickerQuote {
            price,
            change_24h_pct: change_pct_from_open(price, open_24h),
        })
    }
}

#[derive(Debug, Deserialize)]
struct KrakenTickerResponse {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: HashMap<String, KrakenRestTicker>,
}

/// REST ticker entry; `c` is `[price, lot]`, `o` is today's open
#[derive(Debug, Deserialize)]
struct KrakenRestTicker {
    c: Value,
    o: Value,
}
