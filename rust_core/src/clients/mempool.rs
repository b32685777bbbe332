//! mempool.space API Client
//!
//! Public REST endpoints for fee estimates, chain tip, block details and
//! network hashrate. No API key required.

use crate::pollers::network::{BlockDetail, NetworkStatsSource};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const BASE_URL: &str = "https://mempool.space";
/// Timeout for JSON endpoints
const JSON_TIMEOUT: Duration = Duration::from_secs(12);
/// Timeout for plain-text endpoints
const TEXT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct MempoolClient {
    client: Client,
    base_url: String,
}

impl MempoolClient {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, BASE_URL)
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get(&self, path: &str, timeout: Duration) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        if !response.status().is_success() {
            return Err(anyhow!("mempool API error: {} for {}", response.status(), path));
        }
        Ok(response)
    }

    async fn get_text(&self, path: &str) -> Result<String> {
        let body = self
            .get(path, TEXT_TIMEOUT)
            .await?
            .text()
            .await
            .with_context(|| format!("Failed to read body of {}", path))?;
        Ok(body.trim().to_string())
    }
}

#[async_trait]
impl NetworkStatsSource for MempoolClient {
    async fn fee_estimate(&self) -> Result<f64> {
        let fees: RecommendedFees = self
            .get("/api/v1/fees/precise", JSON_TIMEOUT)
            .await?
            .json()
            .await
            .context("Failed to parse fee estimate")?;
        fees.half_hour_fee
            .ok_or_else(|| anyhow!("fee estimate has no halfHourFee"))
    }

    async fn tip_height(&self) -> Result<u64> {
        parse_height(&self.get_text("/api/blocks/tip/height").await?)
    }

    async fn block_hash(&self, height: u64) -> Result<String> {
        let hash = self.get_text(&format!("/api/block-height/{}", height)).await?;
        if hash.is_empty() {
            return Err(anyhow!("empty block hash for height {}", height));
        }
        Ok(hash)
    }

    async fn block_detail(&self, hash: &str) -> Result<BlockDetail> {
        let block: BlockResponse = self
            .get(&format!("/api/v1/block/{}", hash), JSON_TIMEOUT)
            .await?
            .json()
            .await
            .context("Failed to parse block detail")?;
        Ok(block.into())
    }

    async fn network_hashrate(&self) -> Result<f64> {
        let hashrate: HashrateResponse = self
            .get("/api/v1/mining/hashrate/3m", JSON_TIMEOUT)
            .await?
            .json()
            .await
            .context("Failed to parse hashrate")?;
        hashrate
            .current_hashrate
            .ok_or_else(|| anyhow!("hashrate response has no currentHashrate"))
    }
}

/// Tip height endpoint returns a bare integer
fn parse_height(body: &str) -> Result<u64> {
    let body = body.trim();
    if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit()) {
        return Err(anyhow!("tip height is not a number: {:?}", body));
    }
    body.parse().with_context(|| format!("tip height out of range: {}", body))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendedFees {
    half_hour_fee: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HashrateResponse {
    current_hashrate: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct BlockResponse {
    difficulty: Option<f64>,
    timestamp: Option<i64>,
    #[serde(default)]
    extras: Option<BlockExtras>,
}

#[derive(Debug, Deserialize)]
struct BlockExtras {
    pool: Option<BlockPool>,
}

#[derive(Debug, Deserialize)]
struct BlockPool {
    name: Option<String>,
}

impl From<BlockResponse> for BlockDetail {
    fn from(block: BlockResponse) -> Self {
        Self {
            pool_name: block
                .extras
                .and_then(|extras| extras.pool)
                .and_then(|pool| pool.name),
            difficulty: block.difficulty,
            timestamp: block.timestamp,
        }
    }
}
