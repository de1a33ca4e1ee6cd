//! Ticker->Sector Cache commands (§4.4).

use std::collections::HashMap;

use tauri::command;

use crate::config::TICKER_CACHE_MAX_AGE_DAYS;
use crate::ticker_cache::{self, CacheStats};

#[command]
pub async fn lookup_ticker_sector(symbol: String, use_cache: bool) -> Result<String, String> {
    Ok(ticker_cache::lookup(&symbol, use_cache, TICKER_CACHE_MAX_AGE_DAYS).await)
}

#[command]
pub async fn batch_lookup_ticker_sector(
    symbols: Vec<String>,
    use_cache: bool,
) -> Result<HashMap<String, String>, String> {
    Ok(ticker_cache::batch_lookup(&symbols, use_cache, TICKER_CACHE_MAX_AGE_DAYS).await)
}

#[command]
pub fn manual_update_ticker_sector(symbol: String, sector: String) -> Result<(), String> {
    ticker_cache::manual_update(&symbol, &sector);
    Ok(())
}

#[command]
pub fn clear_ticker_cache() -> Result<(), String> {
    ticker_cache::clear();
    Ok(())
}

#[command]
pub fn ticker_cache_stats() -> Result<CacheStats, String> {
    Ok(ticker_cache::stats())
}
