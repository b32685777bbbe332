//! Change-Detection Gate
//!
//! Reduces a [`StateSnapshot`] to a composite fingerprint of everything a
//! consumer would show. The consumer only does its expensive work (a
//! display refresh) when the fingerprint differs from the previous cycle.
//! Visible share ages are part of the fingerprint so that "N sec ago"
//! labels still refresh when no new data arrives.

use crate::format::{format_connected, format_network_summary};
use crate::types::StateSnapshot;
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

/// Consumer-side parameters that affect what is visible
#[derive(Debug, Clone, Copy)]
pub struct FingerprintConfig {
    /// Number of recent shares the consumer shows
    pub visible_shares: usize,
    /// Number of configured device sources (for the "c/n" label)
    pub configured_sources: usize,
}

/// Composite summary of externally observable state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn from_snapshot(snapshot: &StateSnapshot, config: &FingerprintConfig) -> Self {
        let mut hasher = FxHasher::default();

        format_network_summary(&snapshot.network).hash(&mut hasher);
        format_connected(snapshot.connected_count, config.configured_sources).hash(&mut hasher);
        snapshot.connected_count.hash(&mut hasher);

        snapshot.recent_shares.len().hash(&mut hasher);
        let latest_difficulty = snapshot
            .recent_shares
            .last()
            .map_or(0.0, |share| share.difficulty);
        latest_difficulty.to_bits().hash(&mut hasher);

        match &snapshot.ticker {
            Some(ticker) => {
                ticker.price.to_bits().hash(&mut hasher);
                ticker.change_24h_pct.to_bits().hash(&mut hasher);
                ticker.source.hash(&mut hasher);
            }
            None => {
                0f64.to_bits().hash(&mut hasher);
                0f64.to_bits().hash(&mut hasher);
                "none".hash(&mut hasher);
            }
        }

        snapshot.miners.total_hashrate_th.to_bits().hash(&mut hasher);
        snapshot.miners.best_difficulty.to_bits().hash(&mut hasher);
        snapshot.miners.active_count.hash(&mut hasher);

        visible_age_sum(snapshot, config.visible_shares).hash(&mut hasher);

        Fingerprint(hasher.finish())
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Sum of whole-second ages of the shares a consumer can see
pub fn visible_age_sum(snapshot: &StateSnapshot, visible_shares: usize) -> i64 {
    snapshot
        .visible_shares(visible_shares)
        .map(|share| {
            snapshot
                .taken_at
                .signed_duration_since(share.timestamp)
                .num_seconds()
                .max(0)
        })
        .sum()
}

/// Result of consulting the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// State differs from the previous cycle; proceed with consumption
    Changed(Fingerprint),
    /// Same as last cycle; skip the expensive work
    Unchanged,
}

impl GateDecision {
    pub fn has_changed(&self) -> bool {
        matches!(self, GateDecision::Changed(_))
    }
}

/// Remembers the last fingerprint between consumer cycles
#[derive(Debug, Default)]
pub struct ChangeGate {
    last: Option<Fingerprint>,
}

impl ChangeGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare against the baseline; a differing fingerprint becomes the new baseline
    pub fn observe(&mut self, fingerprint: Fingerprint) -> GateDecision {
        if self.last == Some(fingerprint) {
            return GateDecision::Unchanged;
        }
        self.last = Some(fingerprint);
        GateDecision::Changed(fingerprint)
    }

    /// Fingerprint + compare in one step
    pub fn check(&mut self, snapshot: &StateSnapshot, config: &FingerprintConfig) -> GateDecision {
        self.observe(Fingerprint::from_snapshot(snapshot, config))
    }

    /// Force the next observation to report a change (e.g. after a resize)
    pub fn invalidate(&mut self) {
        self.last = None;
    }

    pub fn last(&self) -> Option<Fingerprint> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AggregateMinerStats, NetworkSnapshot, ShareEvent, TickerSelection};
    use chrono::{DateTime, TimeZone, Utc};

    const CONFIG: FingerprintConfig = FingerprintConfig {
        visible_shares: 6,
        configured_sources: 4,
    };

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn base_snapshot() -> StateSnapshot {
        StateSnapshot {
            taken_at: t0(),
            ticker: Some(TickerSelection {
                source: "binance".to_string(),
                price: 65_000.0,
                change_24h_pct: 1.25,
            }),
            connected_count: 3,
            network: NetworkSnapshot {
                fee_sat_vb: Some(8.0),
                block_height: Some(840_000),
                pool_name: Some("OCEAN".to_string()),
                network_hashrate_eh: Some(600.0),
                network_difficulty: Some(8.6e13),
                block_timestamp: Some(1_713_571_767),
            },
            miners: AggregateMinerStats {
                total_hashrate_th: 7.3,
                best_difficulty: 2.1e9,
                active_count: 2,
            },
            recent_shares: vec![
                ShareEvent {
                    timestamp: t0() - chrono::Duration::seconds(40),
                    difficulty: 9.0e7,
                    source: "10.0.0.2".to_string(),
                },
                ShareEvent {
                    timestamp: t0() - chrono::Duration::seconds(5),
                    difficulty: 1.2e8,
                    source: "10.0.0.3".to_string(),
                },
            ],
            session_best: None,
        }
    }

    #[test]
    fn test_identical_snapshots_have_equal_fingerprints() {
        let a = Fingerprint::from_snapshot(&base_snapshot(), &CONFIG);
        let b = Fingerprint::from_snapshot(&base_snapshot(), &CONFIG);
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_field_changes_fingerprint() {
        let base = Fingerprint::from_snapshot(&base_snapshot(), &CONFIG);

        let mut price = base_snapshot();
        price.ticker.as_mut().unwrap().price = 65_000.01;
        assert_ne!(Fingerprint::from_snapshot(&price, &CONFIG), base);

        let mut source = base_snapshot();
        source.ticker.as_mut().unwrap().source = "kraken".to_string();
        assert_ne!(Fingerprint::from_snapshot(&source, &CONFIG), base);

        let mut no_ticker = base_snapshot();
        no_ticker.ticker = None;
        assert_ne!(Fingerprint::from_snapshot(&no_ticker, &CONFIG), base);

        let mut connected = base_snapshot();
        connected.connected_count = 2;
        assert_ne!(Fingerprint::from_snapshot(&connected, &CONFIG), base);

        let mut network = base_snapshot();
        network.network.pool_name = Some("AntPool".to_string());
        assert_ne!(Fingerprint::from_snapshot(&network, &CONFIG), base);

        let mut miners = base_snapshot();
        miners.miners.active_count = 3;
        assert_ne!(Fingerprint::from_snapshot(&miners, &CONFIG), base);
    }

    #[test]
    fn test_elapsed_time_alone_changes_fingerprint() {
        let base = Fingerprint::from_snapshot(&base_snapshot(), &CONFIG);

        let mut later = base_snapshot();
        later.taken_at = t0() + chrono::Duration::seconds(1);
        assert_ne!(Fingerprint::from_snapshot(&later, &CONFIG), base);

        // Sub-second drift stays in the same bucket
        let mut barely = base_snapshot();
        barely.taken_at = t0() + chrono::Duration::milliseconds(300);
        assert_eq!(Fingerprint::from_snapshot(&barely, &CONFIG), base);
    }

    #[test]
    fn test_age_sum_only_counts_visible_shares() {
        let snapshot = base_snapshot();
        assert_eq!(visible_age_sum(&snapshot, 6), 45);
        assert_eq!(visible_age_sum(&snapshot, 1), 5);
        assert_eq!(visible_age_sum(&snapshot, 0), 0);
    }

    #[test]
    fn test_gate_reports_change_once() {
        let mut gate = ChangeGate::new();
        let snapshot = base_snapshot();

        assert!(gate.check(&snapshot, &CONFIG).has_changed());
        assert_eq!(gate.check(&snapshot, &CONFIG), GateDecision::Unchanged);

        let mut updated = base_snapshot();
        updated.miners.total_hashrate_th = 7.4;
        let decision = gate.check(&updated, &CONFIG);
        assert!(decision.has_changed());
        assert_eq!(gate.last(), Some(Fingerprint::from_snapshot(&updated, &CONFIG)));

        gate.invalidate();
        assert!(gate.check(&updated, &CONFIG).has_changed());
    }
}
