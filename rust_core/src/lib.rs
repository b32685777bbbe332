//! Diffmeter Core - concurrent state aggregation for a mining dashboard.
//!
//! This crate provides:
//! - Device log-stream listeners that extract share difficulties
//! - Primary/fallback BTC ticker streams with freshness-based selection
//! - Network stats and fleet stats pollers
//! - A lock-per-section shared state store with point-in-time snapshots
//! - A change-detection fingerprint gate for consumers
//!
//! Every producer is an independent tokio task that owns its reconnect or
//! retry policy and writes only its own state section.

pub mod backoff;
pub mod clients;
pub mod devices;
pub mod fingerprint;
pub mod format;
pub mod pollers;
pub mod state;
pub mod types;

pub use backoff::{Backoff, BackoffConfig};
pub use fingerprint::{ChangeGate, Fingerprint, FingerprintConfig, GateDecision};
pub use state::{SharedState, ShareOutcome, StateConfig};
pub use types::*;
