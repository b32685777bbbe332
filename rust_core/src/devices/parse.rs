//! Accepted-share extraction from device log lines.
//!
//! Devices stream their console log over a WebSocket. An accepted share is
//! logged by the `asic_result` task, with the difficulty in one of two forms:
//!
//! ```text
//! I (123456) asic_result: Ver: 20000000 Nonce 9A3C01F2 diff 120000000 of 4096.
//! I (123456) asic_result: nonce=0x9a3c01f2 diff=120000000, ver=0x20000000
//! ```

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Tag carried by every accepted-share record
const SHARE_RECORD_TAG: &str = "asic_result";
/// `diff 120000000 of 4096` or `diff 120000000/4096`
const SPACED_MARKER: &str = "diff ";
/// `diff=120000000,`
const ASSIGN_MARKER: &str = "diff=";

#[derive(Debug, Error, PartialEq)]
pub enum ShareParseError {
    #[error("difficulty value has no terminating delimiter")]
    MissingDelimiter,
    #[error("difficulty value is empty")]
    EmptyValue,
    #[error("invalid difficulty value: {0:?}")]
    InvalidNumber(String),
}

fn ansi_escape() -> Option<&'static Regex> {
    static ANSI: OnceLock<Option<Regex>> = OnceLock::new();
    ANSI.get_or_init(|| Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").ok())
        .as_ref()
}

/// Strip terminal escape sequences and surrounding whitespace
pub fn clean_line(raw: &str) -> String {
    match ansi_escape() {
        Some(re) => re.replace_all(raw, "").trim().to_string(),
        None => raw.trim().to_string(),
    }
}

/// Split a text frame into cleaned, non-blank lines
pub fn frame_lines(frame: &str) -> impl Iterator<Item = String> + '_ {
    frame
        .lines()
        .map(clean_line)
        .filter(|line| !line.is_empty())
}

/// Extract the difficulty from an accepted-share line.
///
/// `Ok(None)` means the line is not a share record at all; callers drop it
/// silently. `Err` means it looked like one but the value was malformed.
pub fn parse_share_difficulty(line: &str) -> Result<Option<f64>, ShareParseError> {
    if !line.contains(SHARE_RECORD_TAG) {
        return Ok(None);
    }

    let raw_value = if let Some((_, after)) = line.split_once(SPACED_MARKER) {
        if let Some((value, _)) = after.split_once(" of ") {
            value
        } else if let Some((value, _)) = after.split_once('/') {
            value
        } else {
            return Err(ShareParseError::MissingDelimiter);
        }
    } else if let Some((_, after)) = line.split_once(ASSIGN_MARKER) {
        after
            .split_whitespace()
            .next()
            .unwrap_or("")
            .trim_end_matches(',')
    } else {
        return Ok(None);
    };

    let value = raw_value.trim();
    if value.is_empty() {
        return Err(ShareParseError::EmptyValue);
    }
    match value.parse::<f64>() {
        Ok(difficulty) if difficulty.is_finite() => Ok(Some(difficulty)),
        _ => Err(ShareParseError::InvalidNumber(value.to_string())),
    }
}
