//! External sector-lookup providers consulted on a Ticker→Sector Cache miss. Grounded on
//! `original_source/src/ticker_sector_mapper.py::_fetch_from_yahoo` / `_fetch_from_openfigi`;
//! HTTP client conventions (persistent `reqwest::Client`, realistic `User-Agent`, `anyhow`
//! error wrapping) grounded on the teacher's `src/quotes/yahoo.rs`.

use anyhow::{anyhow, Result};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

const DESKTOP_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

fn create_client() -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(DESKTOP_USER_AGENT));
    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(std::time::Duration::from_secs(crate::config::HTTP_TIMEOUT_SECS))
        .build()
        .map_err(|e| anyhow!("failed to build HTTP client: {e}"))
}

/// Primary sector lookup. Yahoo Finance exposes a sector field on its quote-summary endpoint;
/// a missing/unexpected payload shape is a miss, not a hard error.
pub async fn fetch_from_primary(symbol: &str) -> Result<Option<String>> {
    let client = create_client()?;
    let url = format!(
        "https://query2.finance.yahoo.com/v10/finance/quoteSummary/{symbol}?modules=assetProfile"
    );

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| anyhow!("primary sector lookup request failed for {symbol}: {e}"))?;

    if !response.status().is_success() {
        log::warn!("primary sector lookup returned {} for {symbol}", response.status());
        return Ok(None);
    }

    let body: serde_json::Value = response
        .json()
        .await
        .map_err(|e| anyhow!("primary sector lookup returned unparseable JSON for {symbol}: {e}"))?;

    let sector = body
        .pointer("/quoteSummary/result/0/assetProfile/sector")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    Ok(sector)
}

/// Secondary sector lookup via OpenFIGI's `marketSector` field, used when the primary service
/// has no sector for a symbol.
pub async fn fetch_from_secondary(symbol: &str) -> Result<Option<String>> {
    let client = create_client()?;

    let payload = serde_json::json!([{ "idType": "TICKER", "idValue": symbol, "exchCode": "US" }]);

    let response = client
        .post("https://api.openfigi.com/v3/mapping")
        .json(&payload)
        .send()
        .await
        .map_err(|e| anyhow!("secondary sector lookup request failed for {symbol}: {e}"))?;

    if !response.status().is_success() {
        log::warn!("secondary sector lookup returned {} for {symbol}", response.status());
        return Ok(None);
    }

    let body: serde_json::Value = response
        .json()
        .await
        .map_err(|e| anyhow!("secondary sector lookup returned unparseable JSON for {symbol}: {e}"))?;

    let sector = body
        .get(0)
        .and_then(|entry| entry.get("data"))
        .and_then(|data| data.as_array())
        .and_then(|arr| arr.first())
        .and_then(|first| first.get("marketSector"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    Ok(sector)
}
