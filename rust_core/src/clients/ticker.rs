//! Exchange Ticker Feed Trait
//!
//! Defines a common interface for streaming BTC/USD price feeds and the
//! worker that keeps one feed's reading current in [`SharedState`].
//! Implementations: Binance (primary) and Kraken (fallback). Which reading a
//! consumer shows is decided at read time by freshness, see
//! [`SharedState::select_ticker`].

use crate::state::SharedState;
use crate::types::TickerSlot;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, error, info, warn};

/// One decoded price update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickerQuote {
    pub price: f64,
    pub change_24h_pct: f64,
}

/// Why a single feed message could not be decoded
#[derive(Debug, Error)]
pub enum TickerParseError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` is not a number: {value}")]
    InvalidNumber { field: &'static str, value: String },
}

/// Common trait for exchange ticker feeds
///
/// Implementations must be Send + Sync; one worker task owns each feed.
#[async_trait]
pub trait TickerFeed: Send + Sync {
    /// Source identifier stored with the reading (e.g., "binance")
    fn source_name(&self) -> &str;

    /// WebSocket endpoint
    fn stream_url(&self) -> &str;

    /// Handshake sent right after connecting, if the feed needs one
    fn subscribe_message(&self) -> Option<String> {
        None
    }

    /// Keep-alive ping period
    fn ping_interval(&self) -> Duration {
        Duration::from_secs(30)
    }

    /// Decode one stream message. `Ok(None)` for messages that are not a
    /// ticker update for the instrument of interest.
    fn parse_message(&self, text: &str) -> Result<Option<TickerQuote>, TickerParseError>;

    /// One-shot REST fetch used before the stream delivers anything
    async fn fetch_snapshot(&self, client: &Client) -> Result<TickerQuote>;
}

/// Read a numeric field that exchanges send either as a JSON string or number
pub(crate) fn number_field(value: &Value, field: &'static str) -> Result<f64, TickerParseError> {
    let parsed = match value {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        Value::Null => return Err(TickerParseError::MissingField(field)),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(TickerParseError::InvalidNumber {
            field,
            value: value.to_string(),
        }),
    }
}

/// 24h change in percent from last price and 24h open; 0 when open is not positive
pub(crate) fn change_pct_from_open(price: f64, open_24h: f64) -> f64 {
    if open_24h > 0.0 {
        (price - open_24h) / open_24h * 100.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone)]
pub struct TickerWorkerConfig {
    /// Fixed sleep between failed attempts
    pub retry_delay: Duration,
    /// Bound on TCP connect + WebSocket handshake
    pub connect_timeout: Duration,
    /// Drop the connection when nothing (data or pong) arrives for this long
    pub idle_timeout: Duration,
}

impl Default for TickerWorkerConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

/// Keeps one slot's [`TickerReading`](crate::types::TickerReading) current
pub struct TickerStreamWorker {
    feed: Arc<dyn TickerFeed>,
    slot: TickerSlot,
    state: Arc<SharedState>,
    client: Client,
    config: TickerWorkerConfig,
}

impl TickerStreamWorker {
    pub fn new(
        feed: Arc<dyn TickerFeed>,
        slot: TickerSlot,
        state: Arc<SharedState>,
        client: Client,
    ) -> Self {
        Self {
            feed,
            slot,
            state,
            client,
            config: TickerWorkerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TickerWorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Seed the reading over REST so a price exists before the first
    /// stream message. Failures are logged, never fatal.
    pub async fn prime(&self) -> bool {
        match self.feed.fetch_snapshot(&self.client).await {
            Ok(quote) => {
                self.apply(quote);
                info!(
                    "{} initial price ${:.2} ({:+.2}%)",
                    self.feed.source_name(),
                    quote.price,
                    quote.change_24h_pct
                );
                true
            }
            Err(e) => {
                warn!("{} initial fetch failed: {:#}", self.feed.source_name(), e);
                false
            }
        }
    }

    /// Prime, then detach the stream loop onto the runtime
    pub async fn start(self) -> JoinHandle<()> {
        self.prime().await;
        tokio::spawn(async move { self.run().await })
    }

    /// Stream forever, sleeping a fixed delay between attempts
    pub async fn run(&self) {
        loop {
            match self.stream_once().await {
                Ok(()) => warn!("{} WS closed by remote", self.feed.source_name()),
                Err(e) => error!("{} WS error: {:#}", self.feed.source_name(), e),
            }
            tokio::time::sleep(self.config.retry_delay).await;
        }
    }

    async fn stream_once(&self) -> Result<()> {
        let url = self.feed.stream_url();
        let (socket, _) = tokio::time::timeout(self.config.connect_timeout, connect_async(url))
            .await
            .with_context(|| format!("connect to {} timed out", url))?
            .with_context(|| format!("websocket handshake with {} failed", url))?;
        info!("{} WS connected", self.feed.source_name());

        let (mut write, mut read) = socket.split();

        if let Some(subscribe) = self.feed.subscribe_message() {
            write
                .send(Message::Text(subscribe.into()))
                .await
                .context("failed to send subscription")?;
        }

        let mut ping = tokio::time::interval(self.feed.ping_interval());
        ping.tick().await;
        let mut deadline = Instant::now() + self.config.idle_timeout;

        loop {
            tokio::select! {
                msg = read.next() => {
                    deadline = Instant::now() + self.config.idle_timeout;
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_message(text.as_str());
                        }
                        Some(Ok(Message::Close(_))) | None => return Ok(()),
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                    }
                }
                _ = ping.tick() => {
                    write
                        .send(Message::Ping(Default::default()))
                        .await
                        .context("failed to send ping")?;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(anyhow!("no data for {:?}", self.config.idle_timeout));
                }
            }
        }
    }

    /// Decode one message and store it; malformed messages are dropped
    pub fn handle_message(&self, text: &str) -> Option<TickerQuote> {
        match self.feed.parse_message(text) {
            Ok(Some(quote)) => {
                self.apply(quote);
                Some(quote)
            }
            Ok(None) => {
                debug!("{} ignored message: {}", self.feed.source_name(), text);
                None
            }
            Err(e) => {
                warn!("{} parse error: {}", self.feed.source_name(), e);
                None
            }
        }
    }

    fn apply(&self, quote: TickerQuote) {
        self.state
            .update_ticker(self.slot, quote.price, quote.change_24h_pct, Utc::now());
    }
}
