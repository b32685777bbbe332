//! Aggregate state records shared between ingestion workers and consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which exchange feed a ticker reading belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TickerSlot {
    /// Preferred feed (Binance)
    Primary,
    /// Used only when the primary reading has aged out (Kraken)
    Fallback,
}

/// Latest price seen from one exchange feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerReading {
    /// Source identifier (e.g., "binance")
    pub source: String,
    /// Last known price in USD
    pub price: Option<f64>,
    /// Last known 24h change in percent
    pub change_24h_pct: f64,
    /// When the owning worker last wrote this reading
    pub last_update: Option<DateTime<Utc>>,
}

impl TickerReading {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            price: None,
            change_24h_pct: 0.0,
            last_update: None,
        }
    }

    /// Record a fresh quote
    pub fn update(&mut self, price: f64, change_24h_pct: f64, now: DateTime<Utc>) {
        self.price = Some(price);
        self.change_24h_pct = change_24h_pct;
        self.last_update = Some(now);
    }

    /// A reading is fresh while its last update is younger than `window`.
    /// A reading that was never updated is never fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        let Some(last_update) = self.last_update else {
            return false;
        };
        let Some(price) = self.price else {
            return false;
        };
        if !price.is_finite() {
            return false;
        }
        match now.signed_duration_since(last_update).to_std() {
            Ok(age) => age < window,
            // Update stamped in the future (clock step); treat as just written
            Err(_) => true,
        }
    }
}

/// The ticker a consumer should display this cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSelection {
    pub source: String,
    pub price: f64,
    pub change_24h_pct: f64,
}

/// Prefer the primary reading when fresh, else the fallback when fresh, else nothing.
pub fn select_ticker(
    primary: &TickerReading,
    fallback: &TickerReading,
    now: DateTime<Utc>,
    window: Duration,
) -> Option<TickerSelection> {
    [primary, fallback]
        .into_iter()
        .find(|reading| reading.is_fresh(now, window))
        .and_then(|reading| {
            reading.price.map(|price| TickerSelection {
                source: reading.source.clone(),
                price,
                change_24h_pct: reading.change_24h_pct,
            })
        })
}

/// An accepted share whose difficulty cleared the interest threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareEvent {
    pub timestamp: DateTime<Utc>,
    pub difficulty: f64,
    /// Device address the share came from
    pub source: String,
}

/// Highest-difficulty share observed since process start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionBest {
    pub timestamp: DateTime<Utc>,
    pub difficulty: f64,
    pub source: String,
}

impl From<&ShareEvent> for SessionBest {
    fn from(event: &ShareEvent) -> Self {
        Self {
            timestamp: event.timestamp,
            difficulty: event.difficulty,
            source: event.source.clone(),
        }
    }
}

/// Bitcoin network statistics. `None` means unknown; a failed poll resets
/// every field to `None` rather than leaving stale values behind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    /// Recommended fee (half-hour target), sat/vB
    pub fee_sat_vb: Option<f64>,
    pub block_height: Option<u64>,
    /// Pool that mined the tip block
    pub pool_name: Option<String>,
    /// Network hashrate in EH/s
    pub network_hashrate_eh: Option<f64>,
    pub network_difficulty: Option<f64>,
    /// Tip block timestamp (unix seconds)
    pub block_timestamp: Option<i64>,
}

impl NetworkSnapshot {
    /// All fields unknown
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_unknown(&self) -> bool {
        *self == Self::unknown()
    }
}

/// Fleet-wide totals from one fan-out round over device stats endpoints
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateMinerStats {
    /// Sum of device hashrates, TH/s
    pub total_hashrate_th: f64,
    /// Largest best-difficulty any device reported
    pub best_difficulty: f64,
    /// Devices hashing above the activity floor
    pub active_count: usize,
}

/// Lock-scoped copies of every state section, taken once per consumer cycle.
/// Sections are copied independently so there is no cross-section atomicity.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub taken_at: DateTime<Utc>,
    pub ticker: Option<TickerSelection>,
    pub connected_count: usize,
    pub network: NetworkSnapshot,
    pub miners: AggregateMinerStats,
    /// Oldest first
    pub recent_shares: Vec<ShareEvent>,
    pub session_best: Option<SessionBest>,
}

impl StateSnapshot {
    /// The most recent `limit` shares, newest first
    pub fn visible_shares(&self, limit: usize) -> impl Iterator<Item = &ShareEvent> {
        self.recent_shares.iter().rev().take(limit)
    }
}
