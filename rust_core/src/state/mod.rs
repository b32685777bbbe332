//! Shared State Store
//!
//! All mutable aggregate state, split into independently locked sections:
//! tickers, share history + session best, connected devices, network
//! snapshot and miner aggregate. Each section has exactly one lock and is
//! written only by its own worker(s). Readers copy data out under the lock
//! and release it before doing anything else; guards are never held across
//! an `.await`.

mod history;

pub use history::{ShareHistory, ShareOutcome};

use crate::types::{
    select_ticker, AggregateMinerStats, NetworkSnapshot, SessionBest, ShareEvent, StateSnapshot,
    TickerReading, TickerSelection, TickerSlot,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::time::Duration;

/// Sizing for the store
#[derive(Debug, Clone)]
pub struct StateConfig {
    /// Maximum recent shares retained
    pub history_capacity: usize,
    /// Max age before a ticker reading stops being selected
    pub freshness_window: Duration,
    /// Source identifiers for the two ticker slots
    pub primary_source: String,
    pub fallback_source: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            history_capacity: 20,
            freshness_window: Duration::from_secs(60),
            primary_source: "binance".to_string(),
            fallback_source: "kraken".to_string(),
        }
    }
}

#[derive(Debug)]
struct TickerSection {
    primary: TickerReading,
    fallback: TickerReading,
}

/// Process-wide aggregate state, handed to every worker as `Arc<SharedState>`
#[derive(Debug)]
pub struct SharedState {
    freshness_window: Duration,
    tickers: Mutex<TickerSection>,
    shares: Mutex<ShareHistory>,
    connected: Mutex<FxHashSet<String>>,
    network: Mutex<NetworkSnapshot>,
    miners: Mutex<AggregateMinerStats>,
}

impl SharedState {
    pub fn new(config: StateConfig) -> Self {
        Self {
            freshness_window: config.freshness_window,
            tickers: Mutex::new(TickerSection {
                primary: TickerReading::new(config.primary_source),
                fallback: TickerReading::new(config.fallback_source),
            }),
            shares: Mutex::new(ShareHistory::new(config.history_capacity)),
            connected: Mutex::new(FxHashSet::default()),
            network: Mutex::new(NetworkSnapshot::unknown()),
            miners: Mutex::new(AggregateMinerStats::default()),
        }
    }

    pub fn freshness_window(&self) -> Duration {
        self.freshness_window
    }

    // ------------------------------------------------------------------
    // Tickers
    // ------------------------------------------------------------------

    /// Write a quote into one slot's reading
    pub fn update_ticker(&self, slot: TickerSlot, price: f64, change_24h_pct: f64, now: DateTime<Utc>) {
        let mut tickers = self.tickers.lock();
        let reading = match slot {
            TickerSlot::Primary => &mut tickers.primary,
            TickerSlot::Fallback => &mut tickers.fallback,
        };
        reading.update(price, change_24h_pct, now);
    }

    /// Copy of one slot's reading
    pub fn ticker_reading(&self, slot: TickerSlot) -> TickerReading {
        let tickers = self.tickers.lock();
        match slot {
            TickerSlot::Primary => tickers.primary.clone(),
            TickerSlot::Fallback => tickers.fallback.clone(),
        }
    }

    /// Re-evaluated on every call; nothing is cached between cycles
    pub fn select_ticker(&self, now: DateTime<Utc>) -> Option<TickerSelection> {
        let tickers = self.tickers.lock();
        select_ticker(&tickers.primary, &tickers.fallback, now, self.freshness_window)
    }

    // ------------------------------------------------------------------
    // Shares
    // ------------------------------------------------------------------

    /// Append a share and update the session best under one lock acquisition
    pub fn record_share(&self, event: ShareEvent) -> ShareOutcome {
        self.shares.lock().push(event)
    }

    /// Oldest first
    pub fn recent_shares(&self) -> Vec<ShareEvent> {
        self.shares.lock().to_vec()
    }

    pub fn session_best(&self) -> Option<SessionBest> {
        self.shares.lock().session_best().cloned()
    }

    /// History and session best copied under the same guard
    pub fn shares_with_best(&self) -> (Vec<ShareEvent>, Option<SessionBest>) {
        let shares = self.shares.lock();
        (shares.to_vec(), shares.session_best().cloned())
    }

    // ------------------------------------------------------------------
    // Connected devices
    // ------------------------------------------------------------------

    pub fn mark_connected(&self, source: &str) {
        self.connected.lock().insert(source.to_string());
    }

    pub fn mark_disconnected(&self, source: &str) {
        self.connected.lock().remove(source);
    }

    pub fn connected_count(&self) -> usize {
        self.connected.lock().len()
    }

    pub fn is_connected(&self, source: &str) -> bool {
        self.connected.lock().contains(source)
    }

    // ------------------------------------------------------------------
    // Network snapshot
    // ------------------------------------------------------------------

    pub fn replace_network(&self, snapshot: NetworkSnapshot) {
        *self.network.lock() = snapshot;
    }

    /// Every field back to unknown
    pub fn reset_network(&self) {
        *self.network.lock() = NetworkSnapshot::unknown();
    }

    pub fn network(&self) -> NetworkSnapshot {
        self.network.lock().clone()
    }

    // ------------------------------------------------------------------
    // Miner aggregate
    // ------------------------------------------------------------------

    pub fn replace_miner_stats(&self, stats: AggregateMinerStats) {
        *self.miners.lock() = stats;
    }

    pub fn miner_stats(&self) -> AggregateMinerStats {
        *self.miners.lock()
    }

    // ------------------------------------------------------------------
    // Consumer view
    // ------------------------------------------------------------------

    /// Copy every section, one lock at a time
    pub fn snapshot(&self, now: DateTime<Utc>) -> StateSnapshot {
        let ticker = self.select_ticker(now);
        let connected_count = self.connected_count();
        let network = self.network();
        let miners = self.miner_stats();
        let (recent_shares, session_best) = self.shares_with_best();

        StateSnapshot {
            taken_at: now,
            ticker,
            connected_count,
            network,
            miners,
            recent_shares,
            session_best,
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(StateConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn share(difficulty: f64, source: &str) -> ShareEvent {
        ShareEvent {
            timestamp: now(),
            difficulty,
            source: source.to_string(),
        }
    }

    #[test]
    fn test_ticker_slots_are_independent() {
        let state = SharedState::default();
        state.update_ticker(TickerSlot::Fallback, 64_000.0, -0.4, now());

        assert!(state.ticker_reading(TickerSlot::Primary).price.is_none());
        assert_eq!(state.ticker_reading(TickerSlot::Fallback).price, Some(64_000.0));

        let selected = state.select_ticker(now()).unwrap();
        assert_eq!(selected.source, "kraken");

        state.update_ticker(TickerSlot::Primary, 64_100.0, 0.2, now());
        let selected = state.select_ticker(now()).unwrap();
        assert_eq!(selected.source, "binance");
        assert_eq!(selected.price, 64_100.0);
    }

    #[test]
    fn test_connected_set_add_remove() {
        let state = SharedState::default();
        state.mark_connected("10.0.0.2");
        state.mark_connected("10.0.0.3");
        state.mark_connected("10.0.0.2");
        assert_eq!(state.connected_count(), 2);

        state.mark_disconnected("10.0.0.2");
        assert!(!state.is_connected("10.0.0.2"));
        assert_eq!(state.connected_count(), 1);

        // Removing an absent source is a no-op
        state.mark_disconnected("10.0.0.9");
        assert_eq!(state.connected_count(), 1);
    }

    #[test]
    fn test_network_replace_and_reset() {
        let state = SharedState::default();
        state.replace_network(NetworkSnapshot {
            fee_sat_vb: Some(12.5),
            block_height: Some(840_000),
            pool_name: Some("Foundry USA".to_string()),
            network_hashrate_eh: Some(610.0),
            network_difficulty: Some(8.6e13),
            block_timestamp: Some(1_713_571_767),
        });
        assert_eq!(state.network().block_height, Some(840_000));

        state.reset_network();
        assert!(state.network().is_unknown());
    }

    #[test]
    fn test_snapshot_copies_every_section() {
        let state = SharedState::new(StateConfig {
            history_capacity: 2,
            ..StateConfig::default()
        });
        state.record_share(share(100.0, "a"));
        state.record_share(share(300.0, "b"));
        state.record_share(share(200.0, "c"));
        state.mark_connected("a");
        state.replace_miner_stats(AggregateMinerStats {
            total_hashrate_th: 1.2,
            best_difficulty: 5e9,
            active_count: 1,
        });

        let snapshot = state.snapshot(now());
        assert_eq!(snapshot.recent_shares.len(), 2);
        assert_eq!(snapshot.session_best.as_ref().unwrap().source, "b");
        assert_eq!(snapshot.connected_count, 1);
        assert_eq!(snapshot.miners.active_count, 1);
        assert!(snapshot.ticker.is_none());

        // Later writes do not leak into an already taken snapshot
        state.record_share(share(900.0, "d"));
        assert_eq!(snapshot.session_best.unwrap().difficulty, 300.0);
    }

    #[tokio::test]
    async fn test_concurrent_share_writers_keep_best_consistent() {
        let state = Arc::new(SharedState::new(StateConfig {
            history_capacity: 50,
            ..StateConfig::default()
        }));

        let mut handles = Vec::new();
        for worker in 0..8 {
            let state = state.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..100 {
                    let difficulty = (worker * 1000 + i) as f64;
                    state.record_share(share(difficulty, &format!("dev{}", worker)));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let (shares, best) = state.shares_with_best();
        assert_eq!(shares.len(), 50);
        let best = best.unwrap();
        assert_eq!(best.difficulty, 7099.0);
        assert_eq!(best.source, "dev7");
    }
}
