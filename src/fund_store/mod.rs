//! Fund-Detail Store: an on-disk collection of per-fund records, one text file per fund
//! named `<symbol>.csv` (§4.3, §6). Grounded on the read side of
//! `original_source/src/etf_details_parser.py` and the write side of
//! `original_source/src/etf_detail_generator.py::_write_etf_detail_csv`. The in-memory index
//! over the directory is held behind a process-wide singleton the way `src/db/mod.rs` holds
//! its connection.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::NaiveDate;

use crate::error::{ClusterRiskError, Result};
use crate::models::{AllocationEntry, DataSource, FundDetail, HoldingEntry, IdentifierIndexEntry};

pub struct FundStore {
    dir: PathBuf,
}

pub static STORE: once_cell::sync::Lazy<Mutex<Option<FundStore>>> =
    once_cell::sync::Lazy::new(|| Mutex::new(None));

pub fn init(dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    *STORE
        .lock()
        .map_err(|e| anyhow::anyhow!("failed to lock fund store during init: {e}"))? =
        Some(FundStore { dir: dir.to_path_buf() });
    log::info!("fund-detail store initialised at {}", dir.display());
    Ok(())
}

/// Summary row returned by [`enumerate`].
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundDetailSummary {
    pub trade_symbol: String,
    pub identifier: String,
    pub display_name: String,
    pub days_old: i64,
    pub is_stale: bool,
    pub data_source: DataSource,
}

impl FundStore {
    fn path_for(&self, trade_symbol: &str) -> PathBuf {
        self.dir.join(format!("{trade_symbol}.csv"))
    }

    pub fn get(&self, trade_symbol: &str) -> Option<FundDetail> {
        let path = self.path_for(trade_symbol);
        let content = std::fs::read_to_string(&path).ok()?;
        match parse_fund_detail(&content) {
            Ok(detail) => Some(detail),
            Err(e) => {
                crate::diagnostics::add_error(
                    "ETF-Daten",
                    format!("failed to parse fund detail file \"{trade_symbol}.csv\""),
                    e.to_string(),
                );
                None
            }
        }
    }

    /// Writes `detail`. Refuses to overwrite a record whose current `Source` tag is exactly
    /// `Manual` (§4.3 Manual-entry protection).
    pub fn put(&self, detail: &FundDetail) -> Result<()> {
        if let Some(existing) = self.get(&detail.trade_symbol) {
            if existing.source_tag.eq_ignore_ascii_case("manual") {
                return Err(ClusterRiskError::FundDetailWriteFailed(format!(
                    "refusing to overwrite manually-maintained fund detail for {}",
                    detail.trade_symbol
                )));
            }
        }

        let path = self.path_for(&detail.trade_symbol);
        let tmp_path = path.with_extension("csv.tmp");
        let serialized = write_fund_detail(detail);

        let mut file = std::fs::File::create(&tmp_path)
            .map_err(|e| ClusterRiskError::FundDetailWriteFailed(e.to_string()))?;
        file.write_all(serialized.as_bytes())
            .map_err(|e| ClusterRiskError::FundDetailWriteFailed(e.to_string()))?;
        std::fs::rename(&tmp_path, &path)
            .map_err(|e| ClusterRiskError::FundDetailWriteFailed(e.to_string()))?;

        self.update_identifier_index(detail)?;
        Ok(())
    }

    fn update_identifier_index(&self, detail: &FundDetail) -> Result<()> {
        let index_path = self.dir.join("identifier_index.csv");
        let mut entries: Vec<IdentifierIndexEntry> = if index_path.exists() {
            let content = std::fs::read_to_string(&index_path)
                .map_err(|e| ClusterRiskError::FundDetailWriteFailed(e.to_string()))?;
            parse_identifier_index(&content)
        } else {
            Vec::new()
        };

        entries.retain(|e| e.identifier != detail.identifier);
        entries.push(IdentifierIndexEntry {
            identifier: detail.identifier.clone(),
            trade_symbol: detail.trade_symbol.clone(),
            display_name: detail.display_name.clone(),
        });

        let mut out = String::from("ISIN,Ticker,Name\n");
        for entry in &entries {
            out.push_str(&format!(
                "{},{},{}\n",
                entry.identifier, entry.trade_symbol, entry.display_name
            ));
        }

        std::fs::write(&index_path, out).map_err(|e| ClusterRiskError::FundDetailWriteFailed(e.to_string()))
    }

    pub fn lookup_symbol(&self, identifier: &str) -> Option<String> {
        let index_path = self.dir.join("identifier_index.csv");
        let content = std::fs::read_to_string(&index_path).ok()?;
        parse_identifier_index(&content)
            .into_iter()
            .find(|e| e.identifier == identifier)
            .map(|e| e.trade_symbol)
    }

    pub fn enumerate(&self) -> Vec<FundDetailSummary> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem == "identifier_index" {
                continue;
            }
            if let Some(detail) = self.get(stem) {
                out.push(FundDetailSummary {
                    trade_symbol: detail.trade_symbol.clone(),
                    identifier: detail.identifier.clone(),
                    display_name: detail.display_name.clone(),
                    days_old: detail.days_old(),
                    is_stale: detail.is_stale(),
                    data_source: detail.data_source(),
                });
            }
        }
        out
    }
}

pub fn get(trade_symbol: &str) -> Option<FundDetail> {
    STORE.lock().ok()?.as_ref()?.get(trade_symbol)
}

pub fn put(detail: &FundDetail) -> Result<()> {
    let guard = STORE
        .lock()
        .map_err(|e| ClusterRiskError::FundDetailWriteFailed(e.to_string()))?;
    guard
        .as_ref()
        .ok_or_else(|| ClusterRiskError::FundDetailWriteFailed("fund store not initialised".to_string()))?
        .put(detail)
}

pub fn lookup_symbol(identifier: &str) -> Option<String> {
    STORE.lock().ok()?.as_ref()?.lookup_symbol(identifier)
}

pub fn enumerate() -> Vec<FundDetailSummary> {
    STORE
        .lock()
        .ok()
        .and_then(|g| g.as_ref().map(|s| s.enumerate()))
        .unwrap_or_default()
}

enum Section {
    Metadata,
    Country,
    Sector,
    Currency,
    Holdings,
}

fn section_from_header(line: &str) -> Option<Section> {
    let trimmed = line.trim();
    if trimmed.starts_with("# ETF Metadata") || trimmed == "METADATA" {
        Some(Section::Metadata)
    } else if trimmed.starts_with("# Country Allocation") || trimmed == "COUNTRY_ALLOCATION" {
        Some(Section::Country)
    } else if trimmed.starts_with("# Sector Allocation") || trimmed == "SECTOR_ALLOCATION" {
        Some(Section::Sector)
    } else if trimmed.starts_with("# Currency Allocation") || trimmed == "CURRENCY_ALLOCATION" {
        Some(Section::Currency)
    } else if trimmed.starts_with("# Top Holdings") || trimmed == "TOP_HOLDINGS" {
        Some(Section::Holdings)
    } else {
        None
    }
}

/// Splits the file into its five raw section bodies, tolerating both the `# Section` and
/// `SECTION_KEYWORD` header styles (§4.3).
fn split_sections(content: &str) -> HashMap<&'static str, String> {
    let mut sections: HashMap<&'static str, Vec<&str>> = HashMap::new();
    let mut current: Option<&'static str> = None;

    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(section) = section_from_header(trimmed) {
            current = Some(match section {
                Section::Metadata => "metadata",
                Section::Country => "country",
                Section::Sector => "sector",
                Section::Currency => "currency",
                Section::Holdings => "holdings",
            });
            continue;
        }
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some(key) = current {
            sections.entry(key).or_default().push(line);
        }
    }

    sections
        .into_iter()
        .map(|(k, v)| (k, v.join("\n")))
        .collect()
}

fn parse_metadata(body: &str) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    for line in body.lines() {
        if let Some((key, value)) = line.split_once(',') {
            metadata.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    metadata
}

fn parse_allocation(body: &str) -> Vec<AllocationEntry> {
    let mut lines = body.lines();
    lines.next(); // header row
    let mut out = Vec::new();
    for line in lines {
        let Some((name, rest)) = line.split_once(',') else {
            continue;
        };
        let Ok(weight) = rest.trim().parse::<f64>() else {
            continue;
        };
        out.push(AllocationEntry {
            name: name.trim().to_string(),
            weight: weight / 100.0,
        });
    }
    out
}

/// Parses the Top Holdings section using a real CSV reader keyed off the header row, so
/// company names containing commas (quoted in the file) round-trip correctly — the original
/// parser split naively on `,` despite the writer using a quoting CSV writer; this is fixed here.
fn parse_holdings(body: &str) -> Vec<HoldingEntry> {
    if body.trim().is_empty() {
        return Vec::new();
    }
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(body.as_bytes());
    let Ok(headers) = reader.headers().cloned() else {
        return Vec::new();
    };
    let col = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let idx_name = col("Name");
    let idx_weight = col("Weight");
    let idx_currency = col("Currency");
    let idx_sector = col("Sector");
    let idx_country = col("Country");
    let idx_identifier = col("ISIN");

    let mut out = Vec::new();
    for record in reader.records().flatten() {
        let get = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("").trim();
        let Some(name_idx) = idx_name else { continue };
        let name = record.get(name_idx).unwrap_or("").trim();
        if name.is_empty() {
            continue;
        }
        let Ok(weight_pct) = get(idx_weight).parse::<f64>() else {
            continue;
        };
        out.push(HoldingEntry {
            name: name.to_string(),
            weight: weight_pct / 100.0,
            currency: get(idx_currency).to_string(),
            sector: get(idx_sector).to_string(),
            country: get(idx_country).to_string(),
            identifier: {
                let v = get(idx_identifier);
                if v.is_empty() {
                    None
                } else {
                    Some(v.to_string())
                }
            },
        });
    }
    out
}

fn parse_fund_detail(content: &str) -> anyhow::Result<FundDetail> {
    let sections = split_sections(content);
    let metadata = parse_metadata(sections.get("metadata").map(String::as_str).unwrap_or(""));

    let identifier = metadata
        .get("ISIN")
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("missing ISIN in metadata section"))?;
    let display_name = metadata.get("Name").cloned().unwrap_or_default();
    let trade_symbol = metadata.get("Ticker").cloned().unwrap_or_default();
    let fund_type = metadata.get("Type").cloned().unwrap_or_else(|| "Stock".to_string());
    let index_name = metadata.get("Index").cloned();
    let region = metadata.get("Region").cloned();
    let base_currency = metadata.get("Currency").cloned().unwrap_or_else(|| "USD".to_string());
    let expense_ratio = metadata.get("TER").and_then(|v| v.parse::<f64>().ok());
    let proxy_identifier = metadata.get("Proxy ISIN").cloned();
    let source_tag = metadata.get("Source").cloned().unwrap_or_else(|| "unknown".to_string());

    let last_updated_str = metadata
        .get("Last Updated")
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("missing Last Updated in metadata section"))?;
    let last_updated = NaiveDate::parse_from_str(&last_updated_str, "%Y-%m-%d")
        .map_err(|e| anyhow::anyhow!("invalid Last Updated date \"{last_updated_str}\": {e}"))?;

    check_data_freshness(&trade_symbol, &display_name, last_updated);

    Ok(FundDetail {
        identifier,
        trade_symbol,
        display_name,
        fund_type,
        index_name,
        region,
        base_currency,
        expense_ratio,
        last_updated,
        proxy_identifier,
        source_tag,
        country_allocation: parse_allocation(sections.get("country").map(String::as_str).unwrap_or("")),
        sector_allocation: parse_allocation(sections.get("sector").map(String::as_str).unwrap_or("")),
        currency_allocation: parse_allocation(sections.get("currency").map(String::as_str).unwrap_or("")),
        top_holdings: parse_holdings(sections.get("holdings").map(String::as_str).unwrap_or("")),
    })
}

/// A quarter (90 days) is the freshness window for a "this composition might be outdated"
/// diagnostic, distinct from the 30-day re-scrape-eligibility threshold used by `is_stale()`.
fn check_data_freshness(trade_symbol: &str, display_name: &str, last_updated: NaiveDate) {
    let days_old = (chrono::Utc::now().date_naive() - last_updated).num_days();
    if days_old > 90 {
        crate::diagnostics::add_warning(
            "ETF-Daten",
            format!("Veraltete ETF-Zusammensetzung: {display_name} ({trade_symbol})"),
            format!(
                "Letzte Aktualisierung vor {days_old} Tagen. Empfehlung: Aktualisiere {trade_symbol}.csv mit aktuellen Daten."
            ),
        );
    }
}

fn parse_identifier_index(content: &str) -> Vec<IdentifierIndexEntry> {
    let mut lines = content.lines();
    lines.next(); // header
    lines
        .filter_map(|line| {
            let mut parts = line.splitn(3, ',');
            let identifier = parts.next()?.trim().to_string();
            let trade_symbol = parts.next()?.trim().to_string();
            let display_name = parts.next().unwrap_or("").trim().to_string();
            if identifier.is_empty() {
                None
            } else {
                Some(IdentifierIndexEntry {
                    identifier,
                    trade_symbol,
                    display_name,
                })
            }
        })
        .collect()
}

/// Serialises a [`FundDetail`] into the five-section on-disk format (§6). The Top Holdings
/// section uses a real CSV writer with minimal quoting so commas inside company names survive.
fn write_fund_detail(detail: &FundDetail) -> String {
    let mut out = String::new();

    out.push_str("# ETF Metadata\n");
    out.push_str(&format!("ISIN,{}\n", detail.identifier));
    out.push_str(&format!("Name,{}\n", detail.display_name));
    out.push_str(&format!("Ticker,{}\n", detail.trade_symbol));
    out.push_str(&format!("Type,{}\n", detail.fund_type));
    if let Some(index_name) = &detail.index_name {
        out.push_str(&format!("Index,{index_name}\n"));
    }
    if let Some(region) = &detail.region {
        out.push_str(&format!("Region,{region}\n"));
    }
    out.push_str(&format!("Currency,{}\n", detail.base_currency));
    if let Some(ter) = detail.expense_ratio {
        out.push_str(&format!("TER,{ter}\n"));
    }
    if let Some(proxy) = &detail.proxy_identifier {
        out.push_str(&format!("Proxy ISIN,{proxy}\n"));
    }
    out.push_str(&format!("Last Updated,{}\n", detail.last_updated.format("%Y-%m-%d")));
    out.push_str(&format!("Source,{}\n", detail.source_tag));
    out.push('\n');

    out.push_str("# Country Allocation (%)\n");
    out.push_str("Country,Weight\n");
    for entry in &detail.country_allocation {
        out.push_str(&format!("{},{:.1}\n", entry.name, entry.weight * 100.0));
    }
    out.push('\n');

    out.push_str("# Sector Allocation (%)\n");
    out.push_str("Sector,Weight\n");
    for entry in &detail.sector_allocation {
        out.push_str(&format!("{},{:.1}\n", entry.name, entry.weight * 100.0));
    }
    out.push('\n');

    out.push_str("# Currency Allocation (%) - auto-derived from countries\n");
    out.push_str("Currency,Weight\n");
    for entry in &detail.currency_allocation {
        out.push_str(&format!("{},{:.1}\n", entry.name, entry.weight * 100.0));
    }
    out.push('\n');

    out.push_str("# Top Holdings\n");
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());
    writer.write_record(["Name", "Weight", "Currency", "Sector", "Country", "ISIN"]).ok();
    for holding in &detail.top_holdings {
        writer
            .write_record([
                holding.name.as_str(),
                &format!("{:.2}", holding.weight * 100.0),
                holding.currency.as_str(),
                holding.sector.as_str(),
                holding.country.as_str(),
                holding.identifier.as_deref().unwrap_or(""),
            ])
            .ok();
    }
    let holdings_csv = String::from_utf8(writer.into_inner().unwrap_or_default()).unwrap_or_default();
    out.push_str(&holdings_csv);

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FundDetail {
        FundDetail {
            identifier: "IE00B4L5Y983".to_string(),
            trade_symbol: "EUNL".to_string(),
            display_name: "iShares Core MSCI World".to_string(),
            fund_type: "Stock".to_string(),
            index_name: Some("MSCI World".to_string()),
            region: Some("Global".to_string()),
            base_currency: "USD".to_string(),
            expense_ratio: Some(0.2),
            last_updated: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            proxy_identifier: None,
            source_tag: "justETF".to_string(),
            country_allocation: vec![AllocationEntry { name: "United States".to_string(), weight: 0.65 }],
            sector_allocation: vec![AllocationEntry { name: "Technology".to_string(), weight: 0.25 }],
            currency_allocation: vec![AllocationEntry { name: "USD".to_string(), weight: 0.65 }],
            top_holdings: vec![HoldingEntry {
                name: "Apple, Inc.".to_string(),
                weight: 0.05,
                currency: "USD".to_string(),
                sector: "Technology".to_string(),
                country: "United States".to_string(),
                identifier: Some("US0378331005".to_string()),
            }],
        }
    }

    #[test]
    fn round_trips_through_write_and_parse() {
        let detail = sample();
        let serialized = write_fund_detail(&detail);
        let parsed = parse_fund_detail(&serialized).unwrap();
        assert_eq!(parsed.identifier, detail.identifier);
        assert_eq!(parsed.top_holdings.len(), 1);
        assert!((parsed.top_holdings[0].weight - 0.05).abs() < 1e-6);
        assert_eq!(parsed.top_holdings[0].name, "Apple, Inc.");
    }

    #[test]
    fn parses_alternate_section_header_style() {
        let content = "METADATA\nISIN,IE00TEST\nName,Test Fund\nTicker,TEST\nType,Stock\nCurrency,USD\nLast Updated,2026-01-01\nSource,justETF\n\nCOUNTRY_ALLOCATION\nCountry,Weight\nUnited States,100.0\n\nSECTOR_ALLOCATION\nSector,Weight\n\nCURRENCY_ALLOCATION\nCurrency,Weight\n\nTOP_HOLDINGS\nName,Weight,Currency,Sector,Country,ISIN\n";
        let parsed = parse_fund_detail(content).unwrap();
        assert_eq!(parsed.identifier, "IE00TEST");
        assert_eq!(parsed.country_allocation.len(), 1);
    }

    #[test]
    fn holds_comma_containing_holding_names() {
        let mut detail = sample();
        detail.top_holdings.push(HoldingEntry {
            name: "Smith, Jones & Co".to_string(),
            weight: 0.01,
            currency: "USD".to_string(),
            sector: "Industrials".to_string(),
            country: "United States".to_string(),
            identifier: None,
        });
        let serialized = write_fund_detail(&detail);
        let parsed = parse_fund_detail(&serialized).unwrap();
        assert_eq!(parsed.top_holdings[1].name, "Smith, Jones & Co");
    }

    #[test]
    fn manual_entry_is_never_overwritten() {
        let dir = std::env::temp_dir().join(format!("cluster_risk_test_store_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let store = FundStore { dir };

        let mut manual = sample();
        manual.source_tag = "Manual".to_string();
        store.put(&manual).unwrap();

        let mut rescrape = sample();
        rescrape.display_name = "Rescraped Name".to_string();
        rescrape.source_tag = "justETF".to_string();
        let err = store.put(&rescrape).unwrap_err();
        assert!(matches!(err, ClusterRiskError::FundDetailWriteFailed(_)));

        let stored = store.get(&manual.trade_symbol).unwrap();
        assert_eq!(stored.display_name, "iShares Core MSCI World");

        std::fs::remove_dir_all(&store.dir).ok();
    }
}
