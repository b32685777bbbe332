//! Periodic network-stats poller
//!
//! Runs the dependent request chain fee → tip height → block hash → block
//! detail → hashrate on a fixed interval. A cycle either replaces the whole
//! [`NetworkSnapshot`] or, on any step failing, resets it to all-unknown so
//! fields of different ages are never shown side by side.

use crate::state::SharedState;
use crate::types::NetworkSnapshot;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Descriptive fields of a block; each may be absent without failing the cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockDetail {
    pub pool_name: Option<String>,
    pub difficulty: Option<f64>,
    pub timestamp: Option<i64>,
}

/// Source of chain statistics (mempool.space in production)
#[async_trait]
pub trait NetworkStatsSource: Send + Sync {
    /// Recommended fee, sat/vB
    async fn fee_estimate(&self) -> Result<f64>;
    async fn tip_height(&self) -> Result<u64>;
    async fn block_hash(&self, height: u64) -> Result<String>;
    async fn block_detail(&self, hash: &str) -> Result<BlockDetail>;
    /// Current network hashrate, H/s
    async fn network_hashrate(&self) -> Result<f64>;
}

/// Pool name shown when the block carries no attribution
const UNKNOWN_POOL: &str = "Unknown";

pub struct NetworkStatsPoller {
    source: Arc<dyn NetworkStatsSource>,
    state: Arc<SharedState>,
    interval: Duration,
}

impl NetworkStatsPoller {
    pub fn new(source: Arc<dyn NetworkStatsSource>, state: Arc<SharedState>, interval: Duration) -> Self {
        Self {
            source,
            state,
            interval,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    /// Poll, sleep the fixed interval, repeat. Never returns.
    pub async fn run(&self) {
        info!("Network stats poller started (every {:?})", self.interval);
        loop {
            self.poll_once().await;
            tokio::time::sleep(self.interval).await;
        }
    }

    /// One cycle; the result is already applied to the shared state
    pub async fn poll_once(&self) -> bool {
        match self.fetch_snapshot().await {
            Ok(snapshot) => {
                debug!(
                    "Network stats: height {:?}, pool {:?}",
                    snapshot.block_height, snapshot.pool_name
                );
                self.state.replace_network(snapshot);
                true
            }
            Err(e) => {
                error!("Mempool API error: {:#}", e);
                self.state.reset_network();
                false
            }
        }
    }

    /// Run the full chain; any failed step fails the whole cycle
    pub async fn fetch_snapshot(&self) -> Result<NetworkSnapshot> {
        let fee = self.source.fee_estimate().await.context("fee estimate")?;
        let height = self.source.tip_height().await.context("tip height")?;
        let hash = self
            .source
            .block_hash(height)
            .await
            .with_context(|| format!("block hash at {}", height))?;
        let detail = self
            .source
            .block_detail(&hash)
            .await
            .with_context(|| format!("block {}", hash))?;
        let hashrate_hps = self
            .source
            .network_hashrate()
            .await
            .context("network hashrate")?;

        Ok(NetworkSnapshot {
            fee_sat_vb: Some(fee),
            block_height: Some(height),
            pool_name: Some(
                detail
                    .pool_name
                    .unwrap_or_else(|| UNKNOWN_POOL.to_string()),
            ),
            network_hashrate_eh: Some(hashrate_hps / 1e18),
            network_difficulty: detail.difficulty,
            block_timestamp: detail.timestamp,
        })
    }
}
