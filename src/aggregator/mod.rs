//! Risk Aggregator: folds a flat list of [`EffectiveHolding`]s into five ranked concentration
//! tables (§4.6). Grounded on `original_source/src/risk_calculator.py`'s `_calculate_*_risk`
//! family and its `_normalize_position_name`.

use std::collections::HashMap;

use crate::config::risk_thresholds;
use crate::geo;
use crate::models::{
    EffectiveHolding, InstrumentType, RiskDimension, RiskLevel, RiskRow, RiskTable, SectorProvenance,
};
use crate::normalize::normalize_position_name;

const EXCLUDED_SECTORS: &[&str] = &["Diversified", "ETF"];

/// Computes all five RiskTables for `holdings`. Each table is independently ranked and
/// classified (§4.6); a table with no rows (e.g. an all-Cash portfolio's sector table) is
/// allowed to be empty rather than an error.
pub fn aggregate(holdings: &[EffectiveHolding]) -> Vec<RiskTable> {
    vec![
        asset_class_table(holdings),
        sector_table(holdings),
        currency_strict_table(holdings),
        currency_permissive_table(holdings),
        country_table(holdings),
        position_table(holdings),
    ]
}

fn finish_table(dimension: RiskDimension, mut buckets: HashMap<String, f64>, total: f64) -> RiskTable {
    let mut rows: Vec<RiskRow> = buckets
        .drain()
        .map(|(bucket, value)| RiskRow {
            percent: if total > 0.0 { value / total * 100.0 } else { 0.0 },
            bucket,
            value,
            trade_symbol: None,
            sector: None,
            instrument_type: None,
            source_funds: None,
        })
        .collect();
    sort_rows(&mut rows);
    let risk_level = classify(dimension, rows.first().map(|r| r.percent).unwrap_or(0.0));
    RiskTable { dimension, rows, risk_level }
}

fn sort_rows(rows: &mut [RiskRow]) {
    rows.sort_by(|a, b| {
        b.value
            .partial_cmp(&a.value)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.bucket.cmp(&b.bucket))
    });
}

fn classify(dimension: RiskDimension, top_percent: f64) -> RiskLevel {
    let Some((high, medium)) = risk_thresholds().get(&dimension).copied() else {
        return RiskLevel::Low;
    };
    if top_percent >= high {
        RiskLevel::High
    } else if top_percent >= medium {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

fn asset_class_table(holdings: &[EffectiveHolding]) -> RiskTable {
    let total: f64 = holdings.iter().map(|h| h.value).sum();
    let mut buckets: HashMap<String, f64> = HashMap::new();
    for h in holdings {
        let bucket = if h.fund_type_override.as_deref() == Some("MoneyMarket") {
            InstrumentType::Cash.as_str()
        } else {
            h.origin_instrument.as_str()
        };
        *buckets.entry(bucket.to_string()).or_insert(0.0) += h.value;
    }
    finish_table(RiskDimension::AssetClass, buckets, total)
}

fn sector_table(holdings: &[EffectiveHolding]) -> RiskTable {
    let included: Vec<&EffectiveHolding> = holdings
        .iter()
        .filter(|h| !EXCLUDED_SECTORS.contains(&h.sector.as_str()))
        .collect();
    let total: f64 = included.iter().map(|h| h.value).sum();
    let mut buckets: HashMap<String, f64> = HashMap::new();
    for h in &included {
        *buckets.entry(h.sector.clone()).or_insert(0.0) += h.value;
    }
    finish_table(RiskDimension::Sector, buckets, total)
}

fn currency_strict_table(holdings: &[EffectiveHolding]) -> RiskTable {
    let included: Vec<&EffectiveHolding> = holdings
        .iter()
        .filter(|h| h.origin_instrument != InstrumentType::Commodity)
        .collect();
    let total: f64 = included.iter().map(|h| h.value).sum();
    let mut buckets: HashMap<String, f64> = HashMap::new();
    for h in &included {
        *buckets.entry(h.currency.clone()).or_insert(0.0) += h.value;
    }
    finish_table(RiskDimension::CurrencyStrict, buckets, total)
}

const COMMODITY_BUCKET: &str = "Commodity (no currency risk)";

fn currency_permissive_table(holdings: &[EffectiveHolding]) -> RiskTable {
    let total: f64 = holdings.iter().map(|h| h.value).sum();
    let mut buckets: HashMap<String, f64> = HashMap::new();
    for h in holdings {
        let bucket = if h.origin_instrument == InstrumentType::Commodity {
            COMMODITY_BUCKET.to_string()
        } else {
            h.currency.clone()
        };
        *buckets.entry(bucket).or_insert(0.0) += h.value;
    }
    finish_table(RiskDimension::CurrencyPermissive, buckets, total)
}

fn country_table(holdings: &[EffectiveHolding]) -> RiskTable {
    let included: Vec<&EffectiveHolding> = holdings
        .iter()
        .filter(|h| !EXCLUDED_SECTORS.contains(&h.sector.as_str()))
        .collect();
    let total: f64 = included.iter().map(|h| h.value).sum();
    let mut buckets: HashMap<String, f64> = HashMap::new();
    for h in &included {
        let bucket = resolve_country_bucket(h);
        *buckets.entry(bucket).or_insert(0.0) += h.value;
    }
    finish_table(RiskDimension::Country, buckets, total)
}

/// Bucket derivation in priority order (§4.6 item 5): explicit country field; for Cash,
/// currency->country; identifier prefix->country; currency->country.
fn resolve_country_bucket(h: &EffectiveHolding) -> String {
    if !h.country.is_empty() && h.country != "Unknown" && h.country != "Mixed" {
        return h.country.clone();
    }
    if h.origin_instrument == InstrumentType::Cash {
        if let Some(country) = geo::currency_to_country(&h.currency) {
            return country.to_string();
        }
    }
    if let Some(country) = h
        .identifier
        .as_deref()
        .and_then(|id| id.get(0..2))
        .and_then(geo::country_code_to_name)
    {
        return country.to_string();
    }
    if let Some(country) = geo::currency_to_country(&h.currency) {
        return country.to_string();
    }
    "Unknown".to_string()
}

struct PositionAccumulator {
    display_name: String,
    trade_symbol: Option<String>,
    value: f64,
    sector: (String, SectorProvenance),
    instrument_type: InstrumentType,
    source_funds: Vec<String>,
}

fn position_table(holdings: &[EffectiveHolding]) -> RiskTable {
    let total: f64 = holdings.iter().map(|h| h.value).sum();
    let mut accumulators: HashMap<String, PositionAccumulator> = HashMap::new();

    for h in holdings {
        let key = if h.origin_instrument == InstrumentType::Cash {
            "cash".to_string()
        } else {
            normalize_position_name(&h.name)
        };
        let display_name = if h.origin_instrument == InstrumentType::Cash {
            "Cash".to_string()
        } else {
            h.name.clone()
        };

        let entry = accumulators.entry(key).or_insert_with(|| PositionAccumulator {
            display_name: display_name.clone(),
            trade_symbol: None,
            value: 0.0,
            sector: ("Unknown".to_string(), SectorProvenance::None),
            instrument_type: h.origin_instrument,
            source_funds: Vec::new(),
        });

        entry.value += h.value;
        if entry.trade_symbol.is_none() {
            entry.trade_symbol = h.trade_symbol.clone();
        }
        if h.sector_provenance.rank() >= entry.sector.1.rank() {
            entry.sector = (h.sector.clone(), h.sector_provenance);
        }
        if let Some(fund) = &h.source_fund_name {
            if !entry.source_funds.contains(fund) {
                entry.source_funds.push(fund.clone());
            }
        }
    }

    let mut rows: Vec<RiskRow> = accumulators
        .into_values()
        .map(|acc| RiskRow {
            bucket: acc.display_name,
            value: acc.value,
            percent: if total > 0.0 { acc.value / total * 100.0 } else { 0.0 },
            trade_symbol: acc.trade_symbol,
            sector: Some(acc.sector.0),
            instrument_type: Some(acc.instrument_type),
            source_funds: Some(if acc.source_funds.is_empty() {
                "Direct".to_string()
            } else {
                acc.source_funds.join(", ")
            }),
        })
        .collect();

    sort_rows(&mut rows);
    let risk_level = classify(RiskDimension::Position, rows.first().map(|r| r.percent).unwrap_or(0.0));
    RiskTable { dimension: RiskDimension::Position, rows, risk_level }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding(name: &str, value: f64, currency: &str, sector: &str, country: &str, instrument: InstrumentType) -> EffectiveHolding {
        EffectiveHolding {
            name: name.to_string(),
            value,
            currency: currency.to_string(),
            country: country.to_string(),
            sector: sector.to_string(),
            origin_instrument: instrument,
            identifier: None,
            trade_symbol: None,
            source_fund_name: None,
            sector_provenance: SectorProvenance::None,
            fund_type_override: None,
        }
    }

    #[test]
    fn cash_consolidation_collapses_to_single_bucket() {
        let holdings = vec![
            holding("Giro", 100.0, "EUR", "Cash", "Unknown", InstrumentType::Cash),
            holding("Tagesgeld", 200.0, "EUR", "Cash", "Unknown", InstrumentType::Cash),
            holding("Sparkonto", 300.0, "EUR", "Cash", "Unknown", InstrumentType::Cash),
        ];
        let table = position_table(&holdings);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].bucket, "Cash");
        assert!((table.rows[0].value - 600.0).abs() < 1e-6);

        let asset_class = asset_class_table(&holdings);
        assert_eq!(asset_class.rows.len(), 1);
        assert!((asset_class.rows[0].percent - 100.0).abs() < 1e-6);
    }

    #[test]
    fn sector_provenance_precedence_on_merge() {
        let mut stock = holding("Siemens AG", 100.0, "EUR", "Industrials", "DE", InstrumentType::Stock);
        stock.sector = "Technology".to_string();
        stock.sector_provenance = SectorProvenance::Declared;

        let mut via_fund = holding("Siemens AG", 50.0, "EUR", "Industrials", "DE", InstrumentType::Stock);
        via_fund.sector_provenance = SectorProvenance::FundDetail;
        via_fund.source_fund_name = Some("WorldFund".to_string());

        let table = position_table(&[stock, via_fund]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].sector.as_deref(), Some("Technology"));
        assert!((table.rows[0].value - 150.0).abs() < 1e-6);
    }

    #[test]
    fn commodity_currency_exclusion() {
        let holdings = vec![
            holding("Stock A", 400.0, "USD", "Technology", "US", InstrumentType::Stock),
            holding("Gold", 600.0, "USD", "Commodity", "Mixed", InstrumentType::Commodity),
        ];

        let strict = currency_strict_table(&holdings);
        assert_eq!(strict.rows.len(), 1);
        assert!((strict.rows[0].percent - 100.0).abs() < 1e-6);

        let permissive = currency_permissive_table(&holdings);
        assert_eq!(permissive.rows.len(), 2);
        let usd_row = permissive.rows.iter().find(|r| r.bucket == "USD").unwrap();
        let commodity_row = permissive.rows.iter().find(|r| r.bucket == COMMODITY_BUCKET).unwrap();
        assert!((usd_row.percent - 40.0).abs() < 1e-6);
        assert!((commodity_row.percent - 60.0).abs() < 1e-6);
    }

    #[test]
    fn rows_ordered_by_value_desc_then_bucket_asc() {
        let holdings = vec![
            holding("A", 100.0, "USD", "Technology", "US", InstrumentType::Stock),
            holding("B", 100.0, "EUR", "Industrials", "DE", InstrumentType::Stock),
            holding("C", 300.0, "JPY", "Materials", "JP", InstrumentType::Stock),
        ];
        let table = currency_strict_table(&holdings);
        assert_eq!(table.rows[0].bucket, "JPY");
        assert_eq!(table.rows[1].bucket, "EUR");
        assert_eq!(table.rows[2].bucket, "USD");
    }

    #[test]
    fn percent_sums_close_to_hundred() {
        let holdings = vec![
            holding("A", 333.0, "USD", "Technology", "US", InstrumentType::Stock),
            holding("B", 333.0, "EUR", "Industrials", "DE", InstrumentType::Stock),
            holding("C", 334.0, "JPY", "Materials", "JP", InstrumentType::Stock),
        ];
        let table = currency_strict_table(&holdings);
        let sum: f64 = table.rows.iter().map(|r| r.percent).sum();
        assert!((99.9..=100.1).contains(&sum));
    }
}
