//! Fixed record types for every stage of the pipeline (§9 design note: dynamic tabular data
//! is modelled with a concrete type per stage, not a schema-free map; column names and dtypes
//! only appear at the serialisation boundary).

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstrumentType {
    Cash,
    Fund,
    Stock,
    Bond,
    Commodity,
}

impl InstrumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "Cash",
            Self::Fund => "Fund",
            Self::Stock => "Stock",
            Self::Bond => "Bond",
            Self::Commodity => "Commodity",
        }
    }
}

/// A single row parsed from the portfolio snapshot (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPosition {
    pub name: String,
    pub identifier: Option<String>,
    pub trade_symbol: Option<String>,
    pub instrument_type: InstrumentType,
    pub currency: String,
    pub quantity: f64,
    pub value: f64,
    pub declared_sector: Option<String>,
    pub note: Option<String>,
}

/// Summary counters produced alongside the RawPosition list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionSummary {
    pub total_value: f64,
    pub total_positions: usize,
    pub etf_count: usize,
    pub stock_count: usize,
}

/// A single `(bucket, weight)` row of a FundDetail allocation table (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationEntry {
    pub name: String,
    pub weight: f64,
}

/// A single top-holding row of a FundDetail (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingEntry {
    pub name: String,
    pub weight: f64,
    pub currency: String,
    pub sector: String,
    pub country: String,
    pub identifier: Option<String>,
}

impl HoldingEntry {
    pub fn is_other_holdings(&self) -> bool {
        self.name.starts_with("Other Holdings")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Proxy,
    Auto,
    Manual,
}

/// One on-disk fund record (§4.2, §4.3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundDetail {
    pub identifier: String,
    pub trade_symbol: String,
    pub display_name: String,
    pub fund_type: String,
    pub index_name: Option<String>,
    pub region: Option<String>,
    pub base_currency: String,
    pub expense_ratio: Option<f64>,
    pub last_updated: NaiveDate,
    pub proxy_identifier: Option<String>,
    pub source_tag: String,
    pub country_allocation: Vec<AllocationEntry>,
    pub sector_allocation: Vec<AllocationEntry>,
    pub currency_allocation: Vec<AllocationEntry>,
    pub top_holdings: Vec<HoldingEntry>,
}

impl FundDetail {
    pub fn data_source(&self) -> DataSource {
        if self.source_tag.eq_ignore_ascii_case("manual") {
            DataSource::Manual
        } else if self.proxy_identifier.is_some() || self.source_tag.contains("Proxy") {
            DataSource::Proxy
        } else {
            DataSource::Auto
        }
    }

    pub fn days_old(&self) -> i64 {
        (Utc::now().date_naive() - self.last_updated).num_days()
    }

    pub fn is_stale(&self) -> bool {
        self.days_old() > crate::config::FUND_DETAIL_STALE_DAYS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectorProvenance {
    Declared,
    IdentifierLookup,
    FundDetail,
    Cache,
    None,
}

impl SectorProvenance {
    /// Higher rank wins during position-merge (§4.5 conflict resolution).
    pub fn rank(&self) -> u8 {
        match self {
            Self::Declared => 2,
            Self::IdentifierLookup | Self::FundDetail | Self::Cache => 1,
            Self::None => 0,
        }
    }
}

/// A flattened, fully-resolved holding emitted by the Resolver and consumed once by the
/// Aggregator (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveHolding {
    pub name: String,
    pub value: f64,
    pub currency: String,
    pub country: String,
    pub sector: String,
    pub origin_instrument: InstrumentType,
    pub identifier: Option<String>,
    pub trade_symbol: Option<String>,
    pub source_fund_name: Option<String>,
    pub sector_provenance: SectorProvenance,
    pub fund_type_override: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskDimension {
    AssetClass,
    Sector,
    CurrencyStrict,
    CurrencyPermissive,
    Country,
    Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// A single ranked row of a RiskTable (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskRow {
    pub bucket: String,
    pub value: f64,
    pub percent: f64,
    /// Populated only for the Position dimension (§4.6 item 6).
    pub trade_symbol: Option<String>,
    pub sector: Option<String>,
    pub instrument_type: Option<InstrumentType>,
    pub source_funds: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskTable {
    pub dimension: RiskDimension,
    pub rows: Vec<RiskRow>,
    pub risk_level: RiskLevel,
}

/// One completed analysis run, as persisted into the History store (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: Option<i64>,
    pub timestamp: chrono::DateTime<Utc>,
    pub total_value: f64,
    pub total_positions: usize,
    pub etf_count: usize,
    pub stock_count: usize,
    pub risk_tables: Vec<RiskTable>,
}

/// Ticker->sector cache entry (§3, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectorSource {
    PrimaryApi,
    SecondaryApi,
    Manual,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerSectorEntry {
    pub symbol: String,
    pub sector: String,
    pub timestamp: chrono::DateTime<Utc>,
    pub source: SectorSource,
}

/// A row of the user-maintained holdings overlay (§4.5, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserHoldingOverlayEntry {
    pub isin: String,
    pub etf_name: String,
    pub holding_name: String,
    pub weight: f64,
    pub currency: String,
    pub sector: String,
    pub industry: String,
    pub country: Option<String>,
}

/// A row of the Fund-Detail Store's sibling identifier index (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierIndexEntry {
    pub identifier: String,
    pub trade_symbol: String,
    pub display_name: String,
}
