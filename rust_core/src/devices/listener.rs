//! Device log stream listener
//!
//! One listener per configured device. Keeps a WebSocket open to the
//! device's log endpoint, turns accepted-share lines into [`ShareEvent`]s and
//! reconnects with per-device backoff. Runs for the process lifetime and
//! never returns an error to its caller.

use super::parse::{frame_lines, parse_share_difficulty};
use crate::backoff::{Backoff, BackoffConfig};
use crate::format::format_difficulty;
use crate::state::{ShareOutcome, SharedState};
use crate::types::ShareEvent;
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use futures_util::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type DeviceSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A device whose log stream is followed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSource {
    /// Host or host:port, as configured
    pub address: String,
    /// Friendly name for logs; falls back to the address
    pub display_name: String,
}

impl DeviceSource {
    pub fn new(address: impl Into<String>, display_name: Option<String>) -> Self {
        let address = address.into();
        let display_name = display_name.unwrap_or_else(|| address.clone());
        Self {
            address,
            display_name,
        }
    }

    /// `ws://{address}/api/ws`, unless a full URL was configured
    pub fn stream_url(&self) -> String {
        if self.address.starts_with("ws://") || self.address.starts_with("wss://") {
            self.address.clone()
        } else {
            format!("ws://{}/api/ws", self.address)
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeviceStreamConfig {
    /// Bound on TCP connect + WebSocket handshake
    pub connect_timeout: Duration,
    /// A stream silent for this long is treated as dead
    pub read_timeout: Duration,
    /// Shares below this difficulty are too common to keep
    pub min_difficulty: f64,
    pub backoff: BackoffConfig,
}

impl Default for DeviceStreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            read_timeout: Duration::from_secs(15),
            min_difficulty: 75_000.0,
            backoff: BackoffConfig::default(),
        }
    }
}

/// Per-listener counters
#[derive(Debug, Default)]
pub struct DeviceStreamStats {
    pub connects: AtomicU64,
    /// Sessions that were established and then ended
    pub disconnects: AtomicU64,
    /// Attempts that never got a session
    pub failed_connects: AtomicU64,
    pub shares_recorded: AtomicU64,
    pub lines_discarded: AtomicU64,
}

impl DeviceStreamStats {
    pub fn shares_recorded(&self) -> u64 {
        self.shares_recorded.load(Ordering::Relaxed)
    }

    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }

    pub fn disconnects(&self) -> u64 {
        self.disconnects.load(Ordering::Relaxed)
    }

    pub fn failed_connects(&self) -> u64 {
        self.failed_connects.load(Ordering::Relaxed)
    }
}

pub struct DeviceStreamListener {
    source: DeviceSource,
    state: Arc<SharedState>,
    config: DeviceStreamConfig,
    stats: Arc<DeviceStreamStats>,
}

impl DeviceStreamListener {
    pub fn new(source: DeviceSource, state: Arc<SharedState>, config: DeviceStreamConfig) -> Self {
        Self {
            source,
            state,
            config,
            stats: Arc::new(DeviceStreamStats::default()),
        }
    }

    pub fn source(&self) -> &DeviceSource {
        &self.source
    }

    pub fn stats(&self) -> Arc<DeviceStreamStats> {
        self.stats.clone()
    }

    /// Detach the listener onto the runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    /// Connect, read until the stream fails, back off, repeat. Never returns.
    pub async fn run(&self) {
        let url = self.source.stream_url();
        let mut backoff = Backoff::new(self.config.backoff.clone());

        loop {
            match self.connect(&url).await {
                Ok(mut socket) => {
                    self.state.mark_connected(&self.source.address);
                    self.stats.connects.fetch_add(1, Ordering::Relaxed);
                    backoff.reset();
                    info!("Device stream connected → {}", self.source.display_name);

                    match self.pump(&mut socket).await {
                        Ok(()) => warn!("Device stream closed ({})", self.source.display_name),
                        Err(e) => warn!(
                            "Device stream receive error ({}): {:#}",
                            self.source.display_name, e
                        ),
                    }

                    self.state.mark_disconnected(&self.source.address);
                    self.stats.disconnects.fetch_add(1, Ordering::Relaxed);
                    let _ = socket.close(None).await;
                }
                Err(e) => {
                    self.state.mark_disconnected(&self.source.address);
                    self.stats.failed_connects.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        "Device stream connection failed ({}): {:#}",
                        self.source.display_name, e
                    );
                }
            }

            let delay = backoff.next_delay();
            debug!(
                "Reconnecting to {} in {:.2}s",
                self.source.display_name,
                delay.as_secs_f64()
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn connect(&self, url: &str) -> Result<DeviceSocket> {
        let (socket, _) = tokio::time::timeout(self.config.connect_timeout, connect_async(url))
            .await
            .with_context(|| format!("connect to {} timed out", url))?
            .with_context(|| format!("websocket handshake with {} failed", url))?;
        Ok(socket)
    }

    /// Read frames until the stream ends. `Ok` on a clean close.
    async fn pump(&self, socket: &mut DeviceSocket) -> Result<()> {
        loop {
            let next = tokio::time::timeout(self.config.read_timeout, socket.next())
                .await
                .map_err(|_| anyhow!("no frame for {:?}", self.config.read_timeout))?;

            match next {
                Some(Ok(Message::Text(text))) => {
                    self.handle_frame(text.as_str());
                }
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                // Binary frames carry nothing we use; pings are answered by tungstenite
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Process one text frame; returns how many shares were recorded
    pub fn handle_frame(&self, frame: &str) -> usize {
        frame_lines(frame)
            .filter_map(|line| self.handle_line(&line))
            .count()
    }

    /// Parse one cleaned line and record it if it is an interesting share
    pub fn handle_line(&self, line: &str) -> Option<ShareOutcome> {
        let difficulty = match parse_share_difficulty(line) {
            Ok(Some(difficulty)) => difficulty,
            Ok(None) => return None,
            Err(e) => {
                self.stats.lines_discarded.fetch_add(1, Ordering::Relaxed);
                debug!("Parse failed: {} → {}", line, e);
                return None;
            }
        };

        if difficulty < self.config.min_difficulty {
            return None;
        }

        let outcome = self.state.record_share(ShareEvent {
            timestamp: Utc::now(),
            difficulty,
            source: self.source.address.clone(),
        });
        self.stats.shares_recorded.fetch_add(1, Ordering::Relaxed);

        if outcome == ShareOutcome::NewSessionBest {
            info!(
                "New session best! {} → {}",
                self.source.display_name,
                format_difficulty(difficulty)
            );
        }
        debug!(
            "Accepted share {} → {}",
            self.source.display_name,
            format_difficulty(difficulty)
        );

        Some(outcome)
    }
}
