//! Tunable constants for the analysis pipeline.
//!
//! Plain Rust data, not a runtime-loaded file — matches `original_source/config.py`, which is
//! itself a module of constants rather than a parsed config format.

use std::collections::HashMap;

use crate::models::RiskDimension;

/// Ticker->sector cache entries older than this are treated as a miss (§4.4).
pub const TICKER_CACHE_MAX_AGE_DAYS: i64 = 90;

/// Fund-Detail Store records older than this are `stale` in `enumerate()` summaries (§4.3).
pub const FUND_DETAIL_STALE_DAYS: i64 = 30;

/// Inter-request delay observed during a Scraper batch-update (§5).
pub const SCRAPE_BATCH_DELAY_MS: u64 = 2_000;

pub const HTTP_TIMEOUT_SECS: u64 = 10;
pub const HTTP_MAX_RETRIES: u32 = 3;
pub const HTTP_RETRY_DELAY_MS: u64 = 2_000;

/// `(high, medium)` cutoff percentages per dimension. Dimension-keyed form is authoritative;
/// there is no scalar/global fallback exposed outside the UI (§9 Open Question).
pub fn risk_thresholds() -> HashMap<RiskDimension, (f64, f64)> {
    use RiskDimension::*;
    HashMap::from([
        (AssetClass, (75.0, 50.0)),
        (Sector, (25.0, 15.0)),
        (CurrencyStrict, (80.0, 60.0)),
        (CurrencyPermissive, (80.0, 60.0)),
        (Country, (50.0, 30.0)),
        (Position, (10.0, 5.0)),
    ])
}

/// Seed ISIN -> Yahoo-style ticker mappings the resolver can use without a network round-trip
/// before falling back to the Ticker->Sector Cache's external lookup chain.
pub fn seed_isin_ticker_map() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        ("IE00B4L5Y983", "IWDA.L"),
        ("IE00B8GKDB10", "VHYL.L"),
        ("IE00B3RBWM25", "VWRL.L"),
        ("IE00BK5BQT80", "VWCE.DE"),
        ("IE00B5BMR087", "CSPX.L"),
        ("LU0908500753", "XMME.DE"),
        ("LU0274208692", "XDWD.DE"),
        ("FR0010315770", "CW8.PA"),
        ("IE00B0M62Q58", "IUSA.L"),
    ])
}
