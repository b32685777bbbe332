//! Text formatting for difficulties, hashrates and the network summary line.

use crate::types::NetworkSnapshot;

const SI_UNITS: [&str; 9] = ["", "K", "M", "G", "T", "P", "E", "Z", "Y"];
const HASHRATE_UNITS: [&str; 9] = [
    "H/s", "KH/s", "MH/s", "GH/s", "TH/s", "PH/s", "EH/s", "ZH/s", "YH/s",
];

/// Index into a 1000-based unit table for `value` (> 0)
fn thousands_exponent(value: f64, max_index: usize) -> usize {
    let exponent = (value.log10() / 3.0).floor();
    if exponent <= 0.0 {
        0
    } else {
        (exponent as usize).min(max_index)
    }
}

/// SI-scaled difficulty: `120000000` → `"120 M"`, `4.29e9` → `"4.29 G"`
pub fn format_difficulty(difficulty: f64) -> String {
    if !difficulty.is_finite() || difficulty <= 0.0 {
        return "0".to_string();
    }
    let exponent = thousands_exponent(difficulty, SI_UNITS.len() - 1);
    let scaled = difficulty / 1000f64.powi(exponent as i32);
    let unit = SI_UNITS[exponent];

    let number = if scaled.fract() == 0.0 {
        format!("{}", scaled as u64)
    } else {
        format!("{:.2}", scaled)
    };
    if unit.is_empty() {
        number
    } else {
        format!("{} {}", number, unit)
    }
}

/// Like [`format_difficulty`] but `"?"` when unknown
pub fn format_optional_difficulty(difficulty: Option<f64>) -> String {
    match difficulty {
        Some(d) => format_difficulty(d),
        None => "?".to_string(),
    }
}

/// Network hashrate given in EH/s, rendered in the best-fitting unit
pub fn format_network_hashrate(hashrate_eh: Option<f64>) -> String {
    let Some(eh) = hashrate_eh.filter(|v| v.is_finite() && *v > 0.0) else {
        return "?".to_string();
    };
    let hps = eh * 1e18;
    let exponent = thousands_exponent(hps.max(1.0), HASHRATE_UNITS.len() - 1);
    let scaled = hps / 1000f64.powi(exponent as i32);
    format!("{:.2} {}", scaled, HASHRATE_UNITS[exponent])
}

/// Local fleet hashrate in TH/s
pub fn format_hashrate(hashrate_th: f64) -> String {
    format!("{:.2} TH/s", hashrate_th)
}

/// `"12.5 sats/vB | 840000 | Foundry USA | 610.00 EH/s | 86.39 T"`
pub fn format_network_summary(network: &NetworkSnapshot) -> String {
    let fee = network
        .fee_sat_vb
        .map(|fee| format!("{:.1} sats/vB", fee))
        .unwrap_or_else(|| "?".to_string());
    let height = network
        .block_height
        .map(|h| h.to_string())
        .unwrap_or_else(|| "?".to_string());
    let pool = network
        .pool_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .unwrap_or("?");

    [
        fee,
        height,
        pool.to_string(),
        format_network_hashrate(network.network_hashrate_eh),
        format_optional_difficulty(network.network_difficulty),
    ]
    .join(" | ")
}

/// `"MINERS: 3/4"`
pub fn format_connected(connected: usize, configured: usize) -> String {
    format!("MINERS: {}/{}", connected, configured)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_difficulty_units() {
        assert_eq!(format_difficulty(0.0), "0");
        assert_eq!(format_difficulty(-5.0), "0");
        assert_eq!(format_difficulty(950.0), "950");
        assert_eq!(format_difficulty(75_000.0), "75 K");
        assert_eq!(format_difficulty(120_000_000.0), "120 M");
        assert_eq!(format_difficulty(4_290_000_000.0), "4.29 G");
        assert_eq!(format_difficulty(86_388_558_925_171.0), "86.39 T");
    }

    #[test]
    fn test_format_network_hashrate() {
        assert_eq!(format_network_hashrate(None), "?");
        assert_eq!(format_network_hashrate(Some(0.0)), "?");
        assert_eq!(format_network_hashrate(Some(610.0)), "610.00 EH/s");
        assert_eq!(format_network_hashrate(Some(1500.0)), "1.50 ZH/s");
    }

    #[test]
    fn test_network_summary_unknown() {
        let summary = format_network_summary(&NetworkSnapshot::unknown());
        assert_eq!(summary, "? | ? | ? | ? | ?");
    }

    #[test]
    fn test_network_summary_known() {
        let network = NetworkSnapshot {
            fee_sat_vb: Some(12.5),
            block_height: Some(840_000),
            pool_name: Some("Foundry USA".to_string()),
            network_hashrate_eh: Some(610.0),
            network_difficulty: Some(86_388_558_925_171.0),
            block_timestamp: Some(1_713_571_767),
        };
        assert_eq!(
            format_network_summary(&network),
            "12.5 sats/vB | 840000 | Foundry USA | 610.00 EH/s | 86.39 T"
        );
    }

    #[test]
    fn test_format_connected() {
        assert_eq!(format_connected(3, 4), "MINERS: 3/4");
    }
}
