//! User-holdings overlay: a user-editable sidecar CSV standing in for a Fund-Detail Store
//! record when no scrape exists (§4.5 "User-holdings overlay detail"). Grounded one-for-one on
//! `original_source/src/user_etf_holdings.py::UserETFHoldingsManager`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::models::HoldingEntry;

struct OverlayFund {
    name: String,
    holdings: Vec<HoldingEntry>,
}

pub struct UserOverlay {
    path: PathBuf,
    by_isin: HashMap<String, OverlayFund>,
}

pub static OVERLAY: once_cell::sync::Lazy<Mutex<Option<UserOverlay>>> =
    once_cell::sync::Lazy::new(|| Mutex::new(None));

pub fn init(path: &Path) -> anyhow::Result<()> {
    let overlay = UserOverlay::load(path)?;
    *OVERLAY
        .lock()
        .map_err(|e| anyhow::anyhow!("failed to lock user overlay during init: {e}"))? = Some(overlay);
    Ok(())
}

impl UserOverlay {
    fn load(path: &Path) -> anyhow::Result<Self> {
        let mut by_isin: HashMap<String, (String, Vec<HoldingEntry>)> = HashMap::new();

        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(content.as_bytes());
            let headers = reader.headers()?.clone();
            let col = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
            let idx_isin = col("ISIN");
            let idx_name = col("ETF_Name");
            let idx_holding = col("Holding_Name");
            let idx_weight = col("Weight");
            let idx_currency = col("Currency");
            let idx_sector = col("Sector");
            let idx_industry = col("Industry");
            let idx_country = col("Country");

            for record in reader.records().flatten() {
                let get = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("").trim();
                let Some(isin_idx) = idx_isin else { continue };
                let isin = record.get(isin_idx).unwrap_or("").trim().to_string();
                if isin.is_empty() {
                    continue;
                }
                let Ok(weight_pct) = get(idx_weight).parse::<f64>() else {
                    continue;
                };
                let etf_name = get(idx_name).to_string();
                let holding = HoldingEntry {
                    name: get(idx_holding).to_string(),
                    weight: weight_pct / 100.0,
                    currency: non_empty_or(get(idx_currency), "USD"),
                    sector: non_empty_or(get(idx_sector), "Unknown"),
                    country: non_empty_or(get(idx_country), "Unknown"),
                    identifier: None,
                };
                let _ = idx_industry; // industry is carried only via `sector` in HoldingEntry's shape
                by_isin
                    .entry(isin)
                    .or_insert_with(|| (etf_name, Vec::new()))
                    .1
                    .push(holding);
            }
        }

        let by_isin = by_isin
            .into_iter()
            .map(|(isin, (name, mut holdings))| {
                let total_weight: f64 = holdings.iter().map(|h| h.weight).sum();
                if total_weight < 0.999 {
                    let other_weight = 1.0 - total_weight;
                    log::info!("added synthetic 'Other Holdings' for {name}: {:.2}%", other_weight * 100.0);
                    holdings.push(HoldingEntry {
                        name: "Other Holdings".to_string(),
                        weight: other_weight,
                        currency: "Mixed".to_string(),
                        sector: "Diversified".to_string(),
                        country: "Unknown".to_string(),
                        identifier: None,
                    });
                }
                (isin, OverlayFund { name, holdings })
            })
            .collect();

        Ok(Self { path: path.to_path_buf(), by_isin })
    }

    pub fn get_holdings(&self, isin: &str) -> Option<Vec<HoldingEntry>> {
        self.by_isin.get(isin).map(|f| f.holdings.clone())
    }

    /// Validates, appends to (or creates) the overlay file, then reloads. Returns the number
    /// of distinct ISINs contained in `csv_content`.
    pub fn add_from_csv(&mut self, csv_content: &str) -> anyhow::Result<usize> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(csv_content.as_bytes());
        let headers = reader.headers()?.clone();
        for required in ["ISIN", "ETF_Name", "Holding_Name", "Weight"] {
            if !headers.iter().any(|h| h.eq_ignore_ascii_case(required)) {
                anyhow::bail!("CSV must contain column \"{required}\"");
            }
        }

        let isin_idx = headers.iter().position(|h| h.eq_ignore_ascii_case("ISIN")).unwrap();
        let mut unique_isins = std::collections::HashSet::new();
        for record in reader.records().flatten() {
            if let Some(isin) = record.get(isin_idx) {
                unique_isins.insert(isin.trim().to_string());
            }
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let needs_header = !self.path.exists();
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if needs_header {
            use std::io::Write;
            writeln!(file, "ISIN,ETF_Name,Holding_Name,Weight,Currency,Sector,Industry,Country")?;
        }
        {
            use std::io::Write;
            write!(file, "{csv_content}")?;
        }

        *self = Self::load(&self.path)?;
        Ok(unique_isins.len())
    }

    /// Returns an example CSV for a new user to fill in.
    pub fn template(&self) -> String {
        TEMPLATE.to_string()
    }
}

fn non_empty_or(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

const TEMPLATE: &str = "ISIN,ETF_Name,Holding_Name,Weight,Currency,Sector,Industry,Country\n\
LU1681045370,Amundi MSCI Germany,SAP SE,8.5,EUR,Technology,Software,DE\n\
LU1681045370,Amundi MSCI Germany,Siemens AG,7.2,EUR,Industrials,Conglomerate,DE\n\
LU1681045370,Amundi MSCI Germany,Allianz SE,6.8,EUR,Financial Services,Insurance,DE\n\
LU1681045370,Amundi MSCI Germany,Deutsche Telekom AG,5.9,EUR,Communication Services,Telecom,DE\n\
LU1681045370,Amundi MSCI Germany,Mercedes-Benz Group AG,5.2,EUR,Consumer Cyclical,Auto Manufacturers,DE\n\
LU1681045370,Amundi MSCI Germany,Other Holdings,66.4,EUR,Diversified,Diversified,DE\n";

pub fn get_holdings(isin: &str) -> Option<Vec<HoldingEntry>> {
    OVERLAY.lock().ok()?.as_ref()?.get_holdings(isin)
}

pub fn template() -> String {
    TEMPLATE.to_string()
}

pub fn add_from_csv(csv_content: &str) -> anyhow::Result<usize> {
    let mut guard = OVERLAY
        .lock()
        .map_err(|e| anyhow::anyhow!("failed to lock user overlay: {e}"))?;
    guard
        .as_mut()
        .ok_or_else(|| anyhow::anyhow!("user overlay not initialised"))?
        .add_from_csv(csv_content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_fixture(content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "cluster_risk_test_overlay_{}.csv",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn synthesises_other_holdings_below_threshold() {
        let content = "ISIN,ETF_Name,Holding_Name,Weight,Currency,Sector,Industry,Country\n\
LU1,Test Fund,A,50.0,EUR,Technology,Software,DE\n";
        let path = write_fixture(content);
        let overlay = UserOverlay::load(&path).unwrap();
        let holdings = overlay.get_holdings("LU1").unwrap();
        assert_eq!(holdings.len(), 2);
        assert_eq!(holdings[1].name, "Other Holdings");
        assert!((holdings[1].weight - 0.5).abs() < 1e-6);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn no_residual_when_holdings_sum_to_full() {
        let content = "ISIN,ETF_Name,Holding_Name,Weight,Currency,Sector,Industry,Country\n\
LU1,Test Fund,A,100.0,EUR,Technology,Software,DE\n";
        let path = write_fixture(content);
        let overlay = UserOverlay::load(&path).unwrap();
        let holdings = overlay.get_holdings("LU1").unwrap();
        assert_eq!(holdings.len(), 1);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn template_contains_required_columns() {
        let overlay = UserOverlay::load(&std::env::temp_dir().join("does_not_exist.csv")).unwrap();
        let template = overlay.template();
        assert!(template.starts_with("ISIN,ETF_Name,Holding_Name,Weight"));
    }
}
