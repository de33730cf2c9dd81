use serde::{Deserialize, Serialize};

use crate::session::MarketSession;
use crate::{Symbol, UtcDateTime};

/// One symbol's point-in-time record, produced by the fetcher.
///
/// A snapshot is all-or-nothing: it is only constructed once every required
/// field resolved, and it is superseded (never mutated) by the next scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub symbol: Symbol,
    pub price: f64,
    pub prev_close: f64,
    /// Percent change from the previous session's close, rounded to 2 dp.
    pub gap_pct: f64,
    pub volume: u64,
    pub volume_display: String,
    pub avg_volume: u64,
    /// Current volume over average volume, rounded to 2 dp.
    pub rel_volume: f64,
    pub market_cap: Option<f64>,
    pub market_cap_display: String,
    pub float_shares: Option<u64>,
    pub float_display: String,
    pub pe_ratio: Option<f64>,
    pub sector: String,
    pub industry: String,
    /// Keyword-derived category bucket, e.g. "Semiconductors" or "Biotech".
    pub category: String,
    pub gap_classification: String,
    pub pre_market_price: Option<f64>,
    pub pre_market_change_pct: Option<f64>,
    pub post_market_price: Option<f64>,
    pub post_market_change_pct: Option<f64>,
    /// Session in effect when the snapshot was fetched.
    pub market_state: MarketSession,
    pub data_fetch_time: UtcDateTime,
    pub fetch_duration_ms: f64,
}

/// Round to two decimal places, the precision the cache schema carries for
/// derived percentages.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Gap percentage between current price and previous close. Guards the
/// divide-by-zero: a non-positive previous close yields 0, never NaN/inf.
pub fn gap_percent(price: f64, prev_close: f64) -> f64 {
    if prev_close <= 0.0 {
        return 0.0;
    }
    round2((price - prev_close) / prev_close * 100.0)
}

/// Current volume relative to average volume; 0 when the average is unknown.
pub fn relative_volume(volume: u64, avg_volume: u64) -> f64 {
    if avg_volume == 0 {
        return 0.0;
    }
    round2(volume as f64 / avg_volume as f64)
}

/// Bucket a stock by sector/industry keywords.
pub fn categorize(sector: &str, industry: &str) -> &'static str {
    let sector = sector.to_ascii_lowercase();
    let industry = industry.to_ascii_lowercase();

    if sector.is_empty() && industry.is_empty() {
        return "Other";
    }

    if sector.contains("technology") || industry.contains("software") {
        if industry.contains("semiconductor") || industry.contains("chip") {
            "Semiconductors"
        } else if industry.contains("software") {
            "Software"
        } else {
            "Technology"
        }
    } else if sector.contains("healthcare")
        || industry.contains("pharmaceutical")
        || industry.contains("biotechnology")
    {
        if industry.contains("biotech") {
            "Biotech"
        } else {
            "Healthcare"
        }
    } else if sector.contains("financial") || industry.contains("bank") {
        "Finance"
    } else if sector.contains("energy")
        || sector.contains("utilities")
        || industry.contains("oil")
        || industry.contains("solar")
        || industry.contains("electric vehicle")
    {
        "Energy"
    } else if industry.contains("aerospace") || industry.contains("defense") {
        "Defense"
    } else if industry.contains("crypto") || industry.contains("blockchain") {
        "Crypto"
    } else if sector.contains("consumer") {
        "Consumer"
    } else if sector.contains("real estate") {
        "Real Estate"
    } else if sector.contains("communication") || industry.contains("media") {
        "Media"
    } else if sector.contains("materials") || industry.contains("mining") {
        "Materials"
    } else if sector.contains("industrial") {
        "Industrial"
    } else {
        "Other"
    }
}

/// Label the magnitude of a gap for quick filtering in the UI layer.
pub fn classify_gap(gap_pct: f64) -> &'static str {
    if gap_pct >= 20.0 {
        "EXPLOSIVE"
    } else if gap_pct >= 10.0 {
        "HUGE GAPPER"
    } else if gap_pct >= 5.0 {
        "BIG GAPPER"
    } else if gap_pct <= -10.0 {
        "BIG LOSER"
    } else if gap_pct <= -5.0 {
        "GAPPER DOWN"
    } else {
        "REGULAR"
    }
}

/// Human-readable share/volume count: 1.5K, 2.3M, 1.1B.
pub fn format_count(value: u64) -> String {
    let value = value as f64;
    if value >= 1e9 {
        format!("{:.1}B", value / 1e9)
    } else if value >= 1e6 {
        format!("{:.1}M", value / 1e6)
    } else if value >= 1e3 {
        format!("{:.1}K", value / 1e3)
    } else if value > 0.0 {
        format!("{value:.0}")
    } else {
        String::from("—")
    }
}

/// Human-readable dollar amount: $1.5B, $2.3M.
pub fn format_dollars(value: Option<f64>) -> String {
    match value {
        Some(v) if v >= 1e9 => format!("${:.1}B", v / 1e9),
        Some(v) if v >= 1e6 => format!("${:.1}M", v / 1e6),
        Some(v) if v >= 1e3 => format!("${:.1}K", v / 1e3),
        Some(v) if v > 0.0 => format!("${v:.0}"),
        _ => String::from("—"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gap_percent_guards_divide_by_zero() {
        assert_eq!(gap_percent(150.0, 0.0), 0.0);
        assert_eq!(gap_percent(150.0, -1.0), 0.0);
        assert!(gap_percent(150.0, 0.0).is_finite());
    }

    #[test]
    fn gap_percent_rounds_to_two_decimals() {
        // (150 - 145) / 145 * 100 = 3.4482... -> 3.45
        assert_eq!(gap_percent(150.0, 145.0), 3.45);
    }

    #[test]
    fn relative_volume_guards_zero_average() {
        assert_eq!(relative_volume(1_000_000, 0), 0.0);
        assert_eq!(relative_volume(3_000_000, 2_000_000), 1.5);
    }

    #[test]
    fn categorizes_by_keyword() {
        assert_eq!(categorize("Technology", "Semiconductors"), "Semiconductors");
        assert_eq!(categorize("Healthcare", "Biotechnology"), "Biotech");
        assert_eq!(categorize("Technology", "Software - Application"), "Software");
        assert_eq!(categorize("Financial Services", "Banks - Regional"), "Finance");
        assert_eq!(categorize("", ""), "Other");
        assert_eq!(categorize("Basic Materials", "Gold Mining"), "Materials");
    }

    #[test]
    fn labels_gap_magnitude() {
        assert_eq!(classify_gap(25.0), "EXPLOSIVE");
        assert_eq!(classify_gap(12.0), "HUGE GAPPER");
        assert_eq!(classify_gap(6.0), "BIG GAPPER");
        assert_eq!(classify_gap(-12.0), "BIG LOSER");
        assert_eq!(classify_gap(-6.0), "GAPPER DOWN");
        assert_eq!(classify_gap(1.0), "REGULAR");
    }

    #[test]
    fn formats_counts_and_dollars() {
        assert_eq!(format_count(1_500_000), "1.5M");
        assert_eq!(format_count(0), "—");
        assert_eq!(format_dollars(Some(2_300_000_000.0)), "$2.3B");
        assert_eq!(format_dollars(None), "—");
    }
}
