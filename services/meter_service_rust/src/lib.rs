//! meter_service_rust - Wires the aggregation workers to a headless dashboard loop

pub mod config;
pub mod monitor;

pub use config::MeterConfig;
pub use monitor::DashboardMonitor;

use diffmeter_rust_core::devices::{DeviceSource, DeviceStreamConfig};
use diffmeter_rust_core::pollers::MinerPollerConfig;
use diffmeter_rust_core::{FingerprintConfig, StateConfig};

impl MeterConfig {
    pub fn state_config(&self) -> StateConfig {
        StateConfig {
            history_capacity: self.num_diffs_to_keep,
            freshness_window: self.freshness_window(),
            ..StateConfig::default()
        }
    }

    pub fn device_sources(&self) -> Vec<DeviceSource> {
        self.miner_ips
            .iter()
            .map(|ip| DeviceSource::new(ip.as_str(), self.display_name(ip)))
            .collect()
    }

    pub fn device_stream_config(&self) -> DeviceStreamConfig {
        DeviceStreamConfig {
            min_difficulty: self.min_diff_threshold,
            ..DeviceStreamConfig::default()
        }
    }

    pub fn miner_poller_config(&self) -> MinerPollerConfig {
        MinerPollerConfig {
            active_floor_th: self.min_active_hashrate_th,
            ..MinerPollerConfig::default()
        }
    }

    pub fn fingerprint_config(&self) -> FingerprintConfig {
        FingerprintConfig {
            visible_shares: self.visible_lines(),
            configured_sources: self.miner_ips.len(),
        }
    }
}
