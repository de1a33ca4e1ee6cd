//! Ticker→Sector Cache: a single on-disk JSON keyed blob mapping a tradable symbol to an
//! economic sector (§4.4, §6). Grounded on `original_source/src/ticker_sector_mapper.py`'s
//! `TickerSectorMapper`; persistence pattern (`once_cell::sync::Lazy<Mutex<...>>`) grounded on
//! `src/db/mod.rs`'s connection singleton.

pub mod providers;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::models::{SectorSource, TickerSectorEntry};
use crate::normalize::normalize_sector;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CacheFile(HashMap<String, TickerSectorEntry>);

pub struct TickerCache {
    path: PathBuf,
    entries: HashMap<String, TickerSectorEntry>,
}

pub static CACHE: once_cell::sync::Lazy<Mutex<Option<TickerCache>>> =
    once_cell::sync::Lazy::new(|| Mutex::new(None));

pub fn init(path: &Path) -> anyhow::Result<()> {
    let entries = if path.exists() {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str::<CacheFile>(&content).map(|f| f.0).unwrap_or_default()
    } else {
        HashMap::new()
    };
    *CACHE
        .lock()
        .map_err(|e| anyhow::anyhow!("failed to lock ticker cache during init: {e}"))? =
        Some(TickerCache { path: path.to_path_buf(), entries });
    log::info!("ticker-sector cache initialised at {}", path.display());
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub by_source: HashMap<String, usize>,
    pub oldest: Option<chrono::DateTime<Utc>>,
    pub newest: Option<chrono::DateTime<Utc>>,
}

impl TickerCache {
    fn persist(&self) -> anyhow::Result<()> {
        let file = CacheFile(self.entries.clone());
        let serialized = serde_json::to_string_pretty(&file)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, serialized)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn is_fresh(&self, symbol: &str, max_age_days: i64) -> bool {
        self.entries
            .get(symbol)
            .map(|e| {
                e.source == SectorSource::Manual
                    || (Utc::now() - e.timestamp).num_days() < max_age_days
            })
            .unwrap_or(false)
    }

    fn write_through(&mut self, symbol: &str, sector: String, source: SectorSource) {
        self.entries.insert(
            symbol.to_uppercase(),
            TickerSectorEntry {
                symbol: symbol.to_uppercase(),
                sector,
                timestamp: Utc::now(),
                source,
            },
        );
        if let Err(e) = self.persist() {
            log::warn!("failed to persist ticker-sector cache: {e}");
        }
    }

    pub fn manual_update(&mut self, symbol: &str, sector: &str) {
        self.write_through(symbol, normalize_sector(sector), SectorSource::Manual);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        if let Err(e) = self.persist() {
            log::warn!("failed to persist ticker-sector cache after clear: {e}");
        }
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            total: self.entries.len(),
            ..Default::default()
        };
        for entry in self.entries.values() {
            let key = match entry.source {
                SectorSource::PrimaryApi => "primary_api",
                SectorSource::SecondaryApi => "secondary_api",
                SectorSource::Manual => "manual",
                SectorSource::Unknown => "unknown",
            };
            *stats.by_source.entry(key.to_string()).or_insert(0) += 1;
            stats.oldest = Some(stats.oldest.map_or(entry.timestamp, |o| o.min(entry.timestamp)));
            stats.newest = Some(stats.newest.map_or(entry.timestamp, |n| n.max(entry.timestamp)));
        }
        stats
    }
}

/// `lookup(symbol, use_cache?, max_age_days)` (§4.4): cache hit -> return; miss -> primary,
/// then secondary external service, writing through in either case (including an
/// `unknown`-sourced negative result, so repeated misses don't retry before expiry).
pub async fn lookup(symbol: &str, use_cache: bool, max_age_days: i64) -> String {
    let symbol_upper = symbol.to_uppercase();

    if use_cache {
        let cached = CACHE
            .lock()
            .ok()
            .and_then(|g| {
                g.as_ref().and_then(|c| {
                    if c.is_fresh(&symbol_upper, max_age_days) {
                        c.entries.get(&symbol_upper).map(|e| e.sector.clone())
                    } else {
                        None
                    }
                })
            });
        if let Some(sector) = cached {
            return sector;
        }
    }

    let (sector, source) = match providers::fetch_from_primary(&symbol_upper).await {
        Ok(Some(sector)) => (normalize_sector(&sector), SectorSource::PrimaryApi),
        Ok(None) => match providers::fetch_from_secondary(&symbol_upper).await {
            Ok(Some(sector)) => (normalize_sector(&sector), SectorSource::SecondaryApi),
            Ok(None) => ("Unknown".to_string(), SectorSource::Unknown),
            Err(e) => {
                log::warn!("secondary sector lookup failed for {symbol_upper}: {e}");
                ("Unknown".to_string(), SectorSource::Unknown)
            }
        },
        Err(e) => {
            log::warn!("primary sector lookup failed for {symbol_upper}: {e}");
            ("Unknown".to_string(), SectorSource::Unknown)
        }
    };

    if let Ok(mut guard) = CACHE.lock() {
        if let Some(cache) = guard.as_mut() {
            cache.write_through(&symbol_upper, sector.clone(), source);
        }
    }

    sector
}

pub async fn batch_lookup(symbols: &[String], use_cache: bool, max_age_days: i64) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for symbol in symbols {
        let sector = lookup(symbol, use_cache, max_age_days).await;
        out.insert(symbol.to_uppercase(), sector);
    }
    out
}

pub fn manual_update(symbol: &str, sector: &str) {
    if let Ok(mut guard) = CACHE.lock() {
        if let Some(cache) = guard.as_mut() {
            cache.manual_update(symbol, sector);
        }
    }
}

pub fn clear() {
    if let Ok(mut guard) = CACHE.lock() {
        if let Some(cache) = guard.as_mut() {
            cache.clear();
        }
    }
}

pub fn stats() -> CacheStats {
    CACHE
        .lock()
        .ok()
        .and_then(|g| g.as_ref().map(|c| c.stats()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_cache() -> TickerCache {
        TickerCache {
            path: std::env::temp_dir().join("cluster_risk_test_ticker_cache.json"),
            entries: HashMap::new(),
        }
    }

    #[test]
    fn manual_entry_is_always_fresh() {
        let mut cache = fixture_cache();
        cache.entries.insert(
            "AAPL".to_string(),
            TickerSectorEntry {
                symbol: "AAPL".to_string(),
                sector: "Technology".to_string(),
                timestamp: Utc::now() - chrono::Duration::days(9999),
                source: SectorSource::Manual,
            },
        );
        assert!(cache.is_fresh("AAPL", 90));
    }

    #[test]
    fn stale_entry_is_not_fresh() {
        let mut cache = fixture_cache();
        cache.entries.insert(
            "AAPL".to_string(),
            TickerSectorEntry {
                symbol: "AAPL".to_string(),
                sector: "Technology".to_string(),
                timestamp: Utc::now() - chrono::Duration::days(91),
                source: SectorSource::PrimaryApi,
            },
        );
        assert!(!cache.is_fresh("AAPL", 90));
    }

    #[test]
    fn stats_counts_by_source() {
        let mut cache = fixture_cache();
        cache.write_through("AAPL", "Technology".to_string(), SectorSource::PrimaryApi);
        cache.write_through("XXXX", "Unknown".to_string(), SectorSource::Unknown);
        let stats = cache.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_source.get("primary_api"), Some(&1));
        assert_eq!(stats.by_source.get("unknown"), Some(&1));
    }
}
