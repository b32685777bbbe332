//! Configuration for meter_service_rust
//!
//! Loaded from a JSON file (`METER_CONFIG_PATH`, default `config.json`).
//! A missing or unparseable file falls back to defaults; values that parse
//! but make no sense are rejected at startup.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Upper bound on the number of share lines a consumer shows
pub const MAX_VISIBLE_LINES: usize = 21;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    // Devices
    pub miner_ips: Vec<String>,
    pub ip_to_name: HashMap<String, String>,

    // Thresholds
    pub min_diff_threshold: f64,
    pub min_active_hashrate_th: f64,

    // Ticker freshness window, seconds
    pub data_timeout_sec: f64,

    // Share history
    pub num_diffs_to_keep: usize,
    pub max_lines_on_screen: usize,

    // Consumer loop rate
    pub target_fps: u32,

    // Network poll interval, seconds
    pub mempool_update_every: f64,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            miner_ips: Vec::new(),
            ip_to_name: HashMap::new(),
            min_diff_threshold: 75_000.0,
            min_active_hashrate_th: 0.25,
            data_timeout_sec: 60.0,
            num_diffs_to_keep: 20,
            max_lines_on_screen: 6,
            target_fps: 8,
            mempool_update_every: 30.0,
        }
    }
}

impl MeterConfig {
    /// Load from `METER_CONFIG_PATH` (or `config.json`) and validate
    pub fn load_from_env() -> Result<Self> {
        let path = env::var("METER_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_path(path)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = match std::fs::read_to_string(path) {
            Ok(body) => match serde_json::from_str::<MeterConfig>(&body) {
                Ok(config) => {
                    info!("Config loaded from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Invalid JSON in {}: {}. Using default configuration.", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Config file {} not readable: {}. Using default configuration.", path.display(), e);
                Self::default()
            }
        };

        let config = config.normalized();
        config.validate()?;
        Ok(config)
    }

    /// Trim device addresses (list and name-map keys) so every consumer sees the same form
    pub fn normalized(mut self) -> Self {
        self.miner_ips = self.miner_ips.iter().map(|ip| ip.trim().to_string()).collect();
        self.ip_to_name = self
            .ip_to_name
            .into_iter()
            .map(|(ip, name)| (ip.trim().to_string(), name))
            .collect();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_diffs_to_keep == 0 {
            return Err(anyhow!("num_diffs_to_keep must be > 0"));
        }
        if self.min_diff_threshold < 0.0 || !self.min_diff_threshold.is_finite() {
            return Err(anyhow!("min_diff_threshold must be >= 0"));
        }
        if self.min_active_hashrate_th < 0.0 || !self.min_active_hashrate_th.is_finite() {
            return Err(anyhow!("min_active_hashrate_th must be >= 0"));
        }
        if self.data_timeout_sec <= 0.0 || Duration::try_from_secs_f64(self.data_timeout_sec).is_err() {
            return Err(anyhow!("data_timeout_sec must be > 0 and a representable duration"));
        }
        if self.mempool_update_every <= 0.0
            || Duration::try_from_secs_f64(self.mempool_update_every).is_err()
        {
            return Err(anyhow!("mempool_update_every must be > 0 and a representable duration"));
        }
        if self.target_fps == 0 {
            return Err(anyhow!("target_fps must be > 0"));
        }
        if self.miner_ips.iter().any(|ip| ip.trim().is_empty()) {
            return Err(anyhow!("miner_ips must not contain empty addresses"));
        }
        Ok(())
    }

    /// Share lines a consumer shows, capped at [`MAX_VISIBLE_LINES`]
    pub fn visible_lines(&self) -> usize {
        self.max_lines_on_screen.min(MAX_VISIBLE_LINES)
    }

    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs_f64(self.data_timeout_sec)
    }

    pub fn network_poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.mempool_update_every)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_fps as f64)
    }

    pub fn display_name(&self, address: &str) -> Option<String> {
        self.ip_to_name.get(address).cloned()
    }
}
