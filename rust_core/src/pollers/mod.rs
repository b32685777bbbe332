//! Fixed-interval HTTP pollers feeding [`SharedState`](crate::state::SharedState)

pub mod miners;
pub mod network;

pub use miners::{aggregate_miner_samples, MinerPollerConfig, MinerSample, MinerStatsFetcher, MinerStatsPoller};
pub use network::{BlockDetail, NetworkStatsPoller, NetworkStatsSource};
