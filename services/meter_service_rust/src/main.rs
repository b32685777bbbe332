use anyhow::{Context, Result};
use diffmeter_rust_core::clients::{
    BinanceFeed, HttpMinerStatsFetcher, KrakenFeed, MempoolClient, TickerStreamWorker,
};
use diffmeter_rust_core::devices::DeviceStreamListener;
use diffmeter_rust_core::pollers::{MinerStatsPoller, NetworkStatsPoller};
use diffmeter_rust_core::{SharedState, TickerSlot};
use dotenv::dotenv;
use meter_service_rust::{DashboardMonitor, MeterConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USER_AGENT: &str = "diffmeter/1.0";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting meter_service_rust...");

    let config = MeterConfig::load_from_env().context("Invalid configuration")?;
    info!(
        "{} devices, share threshold {}, history {}",
        config.miner_ips.len(),
        config.min_diff_threshold,
        config.num_diffs_to_keep
    );

    let state = Arc::new(SharedState::new(config.state_config()));

    let http = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(15))
        .build()
        .context("Failed to build HTTP client")?;

    // Tickers: prime both over REST, then stream
    let primary = TickerStreamWorker::new(
        Arc::new(BinanceFeed::new()),
        TickerSlot::Primary,
        state.clone(),
        http.clone(),
    );
    let fallback = TickerStreamWorker::new(
        Arc::new(KrakenFeed::new()),
        TickerSlot::Fallback,
        state.clone(),
        http.clone(),
    );
    let _tickers = tokio::join!(primary.start(), fallback.start());

    // Device log streams
    for source in config.device_sources() {
        info!("Following {} at {}", source.display_name, source.stream_url());
        DeviceStreamListener::new(source, state.clone(), config.device_stream_config()).spawn();
    }

    // Pollers
    NetworkStatsPoller::new(
        Arc::new(MempoolClient::new(http.clone())),
        state.clone(),
        config.network_poll_interval(),
    )
    .spawn();

    if !config.miner_ips.is_empty() {
        MinerStatsPoller::new(
            Arc::new(HttpMinerStatsFetcher::new(http.clone())),
            config.miner_ips.clone(),
            state.clone(),
            config.miner_poller_config(),
        )
        .spawn();
    }

    let monitor = DashboardMonitor::new(
        state,
        config.fingerprint_config(),
        config.frame_interval(),
        config.ip_to_name.clone(),
    );
    monitor.run().await;

    Ok(())
}
