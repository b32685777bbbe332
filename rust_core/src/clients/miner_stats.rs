//! Device stats HTTP client
//!
//! Each mining device serves `GET http://{address}/api/system/info` with its
//! live hashrate (GH/s) and best difficulty since boot. Firmware versions
//! disagree on the type of `bestDiff`: some send a number, others a
//! human-readable string such as `"4.29G"`.

use crate::pollers::miners::{MinerSample, MinerStatsFetcher};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Per-device request timeout
pub const DEVICE_TIMEOUT: Duration = Duration::from_secs(4);

/// Hashrates at or below this (TH/s) are reported as zero
pub const HASHRATE_SANITY_FLOOR_TH: f64 = 0.05;

#[derive(Debug, Error, PartialEq)]
pub enum BestDiffError {
    #[error("empty difficulty string")]
    Empty,
    #[error("unknown difficulty suffix '{0}'")]
    UnknownSuffix(char),
    #[error("invalid difficulty value: {0}")]
    InvalidNumber(String),
}

/// Parse `"4.29G"`, `"512.3k"`, `"1200"` into an absolute difficulty
pub fn parse_suffixed_difficulty(raw: &str) -> Result<f64, BestDiffError> {
    let raw = raw.trim();
    let last = raw.chars().last().ok_or(BestDiffError::Empty)?;

    let (number, scale) = if last.is_ascii_alphabetic() {
        let scale = match last.to_ascii_uppercase() {
            'K' => 1e3,
            'M' => 1e6,
            'G' => 1e9,
            'T' => 1e12,
            'P' => 1e15,
            'E' => 1e18,
            other => return Err(BestDiffError::UnknownSuffix(other)),
        };
        (raw[..raw.len() - 1].trim(), scale)
    } else {
        (raw, 1.0)
    };

    let value: f64 = number
        .parse()
        .map_err(|_| BestDiffError::InvalidNumber(raw.to_string()))?;
    if !value.is_finite() || value < 0.0 {
        return Err(BestDiffError::InvalidNumber(raw.to_string()));
    }
    Ok(value * scale)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BestDiffField {
    Number(f64),
    Text(String),
}

impl BestDiffField {
    fn value(&self) -> Result<f64, BestDiffError> {
        match self {
            BestDiffField::Number(n) => Ok(*n),
            BestDiffField::Text(s) => parse_suffixed_difficulty(s),
        }
    }
}

/// `/api/system/info` fields we use
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SystemInfo {
    #[serde(default)]
    hash_rate: Option<f64>,
    #[serde(default)]
    best_diff: Option<BestDiffField>,
}

impl SystemInfo {
    /// A malformed `bestDiff` reads as 0; the hashrate is kept
    fn into_sample(self) -> MinerSample {
        let hashrate_th = self.hash_rate.unwrap_or(0.0) / 1000.0;
        let best_difficulty = match self.best_diff.as_ref().map(BestDiffField::value) {
            Some(Ok(value)) => value,
            Some(Err(e)) => {
                debug!("Ignoring bestDiff {:?}: {}", self.best_diff, e);
                0.0
            }
            None => 0.0,
        };
        MinerSample {
            hashrate_th: if hashrate_th > HASHRATE_SANITY_FLOOR_TH {
                hashrate_th
            } else {
                0.0
            },
            best_difficulty,
        }
    }
}

pub struct HttpMinerStatsFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpMinerStatsFetcher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            timeout: DEVICE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl MinerStatsFetcher for HttpMinerStatsFetcher {
    async fn fetch(&self, address: &str) -> Result<MinerSample> {
        let url = format!("http://{}/api/system/info", address);

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        if !response.status().is_success() {
            return Err(anyhow!("device {} returned {}", address, response.status()));
        }

        let info: SystemInfo = response
            .json()
            .await
            .with_context(|| format!("Failed to parse stats from {}", address))?;

        Ok(info.into_sample())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_suffixed_difficulty() {
        assert_eq!(parse_suffixed_difficulty("4.29G").unwrap(), 4.29e9);
        assert_eq!(parse_suffixed_difficulty("512k").unwrap(), 512_000.0);
        assert_eq!(parse_suffixed_difficulty(" 1.5 M ").unwrap(), 1_500_000.0);
        assert_eq!(parse_suffixed_difficulty("1200").unwrap(), 1200.0);
        assert_eq!(parse_suffixed_difficulty("2T").unwrap(), 2e12);
    }

    #[test]
    fn test_parse_suffixed_difficulty_errors() {
        assert_eq!(parse_suffixed_difficulty(""), Err(BestDiffError::Empty));
        assert_eq!(
            parse_suffixed_difficulty("12X"),
            Err(BestDiffError::UnknownSuffix('X'))
        );
        assert!(matches!(
            parse_suffixed_difficulty("abcG"),
            Err(BestDiffError::InvalidNumber(_))
        ));
        assert!(matches!(
            parse_suffixed_difficulty("-3"),
            Err(BestDiffError::InvalidNumber(_))
        ));
    }

    #[test]
    fn test_system_info_numeric_best_diff() {
        let info: SystemInfo =
            serde_json::from_str(r#"{"hashRate": 3200.0, "bestDiff": 123456.0, "temp": 55}"#).unwrap();
        let sample = info.into_sample();
        assert!((sample.hashrate_th - 3.2).abs() < 1e-9);
        assert_eq!(sample.best_difficulty, 123_456.0);
    }

    #[test]
    fn test_system_info_string_best_diff() {
        let info: SystemInfo =
            serde_json::from_str(r#"{"hashRate": 1100.5, "bestDiff": "4.29G"}"#).unwrap();
        let sample = info.into_sample();
        assert_eq!(sample.best_difficulty, 4.29e9);
    }

    #[test]
    fn test_hashrate_below_floor_reports_zero() {
        let info: SystemInfo = serde_json::from_str(r#"{"hashRate": 40.0, "bestDiff": 900}"#).unwrap();
        let sample = info.into_sample();
        assert_eq!(sample.hashrate_th, 0.0);
        // Best difficulty is still reported
        assert_eq!(sample.best_difficulty, 900.0);
    }

    #[test]
    fn test_bad_best_diff_keeps_hashrate() {
        let info: SystemInfo =
            serde_json::from_str(r#"{"hashRate": 3200.0, "bestDiff": "4.29X"}"#).unwrap();
        let sample = info.into_sample();
        assert!((sample.hashrate_th - 3.2).abs() < 1e-9);
        assert_eq!(sample.best_difficulty, 0.0);
    }

    #[test]
    fn test_missing_fields_default_to_zero() {
        let info: SystemInfo = serde_json::from_str("{}").unwrap();
        assert_eq!(info.into_sample(), MinerSample::default());
    }
}
