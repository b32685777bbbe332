//! Fan-out device stats poller
//!
//! Every round queries all configured devices concurrently (bounded pool),
//! folds the per-device samples into one [`AggregateMinerStats`] and
//! replaces the shared aggregate.

use crate::state::SharedState;
use crate::types::AggregateMinerStats;
use anyhow::Result;
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Concurrent device requests per round
pub const MAX_CONCURRENT_REQUESTS: usize = 16;

/// One device's reading. Failed requests are recorded as the zero sample.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MinerSample {
    pub hashrate_th: f64,
    pub best_difficulty: f64,
}

#[async_trait]
pub trait MinerStatsFetcher: Send + Sync {
    async fn fetch(&self, address: &str) -> Result<MinerSample>;
}

/// Sum hashrates, take the max best difficulty, count devices strictly above
/// `active_floor_th`
pub fn aggregate_miner_samples(samples: &[MinerSample], active_floor_th: f64) -> AggregateMinerStats {
    samples
        .iter()
        .fold(AggregateMinerStats::default(), |mut acc, sample| {
            acc.total_hashrate_th += sample.hashrate_th;
            acc.best_difficulty = acc.best_difficulty.max(sample.best_difficulty);
            if sample.hashrate_th > active_floor_th {
                acc.active_count += 1;
            }
            acc
        })
}

#[derive(Debug, Clone)]
pub struct MinerPollerConfig {
    pub interval: Duration,
    pub active_floor_th: f64,
    pub max_concurrent: usize,
}

impl Default for MinerPollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            active_floor_th: 0.25,
            max_concurrent: MAX_CONCURRENT_REQUESTS,
        }
    }
}

pub struct MinerStatsPoller {
    fetcher: Arc<dyn MinerStatsFetcher>,
    addresses: Vec<String>,
    state: Arc<SharedState>,
    config: MinerPollerConfig,
}

impl MinerStatsPoller {
    pub fn new(
        fetcher: Arc<dyn MinerStatsFetcher>,
        addresses: Vec<String>,
        state: Arc<SharedState>,
        config: MinerPollerConfig,
    ) -> Self {
        Self {
            fetcher,
            addresses,
            state,
            config,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    pub async fn run(&self) {
        info!(
            "Miner stats poller started: {} devices every {:?}",
            self.addresses.len(),
            self.config.interval
        );
        loop {
            self.poll_round().await;
            tokio::time::sleep(self.config.interval).await;
        }
    }

    /// Query every device once and publish the aggregate
    pub async fn poll_round(&self) -> AggregateMinerStats {
        let samples: Vec<MinerSample> = stream::iter(self.addresses.clone())
            .map(|address| {
                let fetcher = self.fetcher.clone();
                async move {
                    match fetcher.fetch(&address).await {
                        Ok(sample) => sample,
                        Err(e) => {
                            debug!("Stats fetch from {} failed: {:#}", address, e);
                            MinerSample::default()
                        }
                    }
                }
            })
            .buffer_unordered(self.config.max_concurrent.max(1))
            .collect()
            .await;

        let stats = aggregate_miner_samples(&samples, self.config.active_floor_th);
        self.state.replace_miner_stats(stats);
        stats
    }
}
