//! Headless dashboard loop
//!
//! Takes a snapshot at the configured frame rate and emits one status line
//! whenever the change gate reports that something visible changed.

use chrono::{DateTime, Utc};
use diffmeter_rust_core::format::{
    format_connected, format_difficulty, format_hashrate, format_network_summary,
};
use diffmeter_rust_core::{ChangeGate, FingerprintConfig, SharedState, StateSnapshot};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::info;

pub struct DashboardMonitor {
    state: Arc<SharedState>,
    fingerprint: FingerprintConfig,
    frame_interval: Duration,
    display_names: HashMap<String, String>,
    gate: ChangeGate,
}

impl DashboardMonitor {
    pub fn new(
        state: Arc<SharedState>,
        fingerprint: FingerprintConfig,
        frame_interval: Duration,
        display_names: HashMap<String, String>,
    ) -> Self {
        Self {
            state,
            fingerprint,
            frame_interval,
            display_names,
            gate: ChangeGate::new(),
        }
    }

    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if let Some(line) = self.tick(Utc::now()) {
                info!("{}", line);
            }
        }
    }

    /// One frame: `Some(status)` only when the gate saw a change
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<String> {
        let snapshot = self.state.snapshot(now);
        if self.gate.check(&snapshot, &self.fingerprint).has_changed() {
            Some(self.status_line(&snapshot))
        } else {
            None
        }
    }

    fn name_of<'a>(&'a self, address: &'a str) -> &'a str {
        self.display_names
            .get(address)
            .map(String::as_str)
            .unwrap_or(address)
    }

    pub fn status_line(&self, snapshot: &StateSnapshot) -> String {
        let price = match &snapshot.ticker {
            Some(t) => format!("BTC ${:.0} ({:+.2}%, {})", t.price, t.change_24h_pct, t.source),
            None => "BTC ?".to_string(),
        };

        let best = match &snapshot.session_best {
            Some(best) => format!(
                "best {} ({})",
                format_difficulty(best.difficulty),
                self.name_of(&best.source)
            ),
            None => "best -".to_string(),
        };

        let recent: Vec<String> = snapshot
            .visible_shares(self.fingerprint.visible_shares)
            .map(|share| {
                let age = (snapshot.taken_at - share.timestamp).num_seconds().max(0);
                format!(
                    "{} {} {}s ago",
                    self.name_of(&share.source),
                    format_difficulty(share.difficulty),
                    age
                )
            })
            .collect();

        format!(
            "{} | {} | {} | fleet {} ({} active, best {}) | {} | recent: [{}]",
            price,
            format_connected(snapshot.connected_count, self.fingerprint.configured_sources),
            format_network_summary(&snapshot.network),
            format_hashrate(snapshot.miners.total_hashrate_th),
            snapshot.miners.active_count,
            format_difficulty(snapshot.miners.best_difficulty),
            best,
            recent.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diffmeter_rust_core::ShareEvent;

    fn monitor(state: Arc<SharedState>) -> DashboardMonitor {
        let names = HashMap::from([("10.0.0.5".to_string(), "Bitaxe".to_string())]);
        DashboardMonitor::new(
            state,
            FingerprintConfig {
                visible_shares: 6,
                configured_sources: 2,
            },
            Duration::from_millis(125),
            names,
        )
    }

    #[test]
    fn test_emits_only_on_change() {
        let state = Arc::new(SharedState::default());
        let mut monitor = monitor(state.clone());
        let now = Utc::now();

        assert!(monitor.tick(now).is_some());
        assert!(monitor.tick(now).is_none());

        state.mark_connected("10.0.0.5");
        let line = monitor.tick(now).unwrap();
        assert!(line.contains("MINERS: 1/2"));
        assert!(monitor.tick(now).is_none());
    }

    #[test]
    fn test_status_line_uses_display_names() {
        let state = Arc::new(SharedState::default());
        let now = Utc::now();
        state.record_share(ShareEvent {
            timestamp: now - chrono::Duration::seconds(3),
            difficulty: 120_000_000.0,
            source: "10.0.0.5".to_string(),
        });
        let monitor = monitor(state.clone());

        let line = monitor.status_line(&state.snapshot(now));
        assert!(line.contains("best 120 M (Bitaxe)"));
        assert!(line.contains("Bitaxe 120 M 3s ago"));
        assert!(line.starts_with("BTC ?"));
    }
}
