//! Look-through Resolver: turns raw positions into the flat list of [`EffectiveHolding`]s the
//! Aggregator consumes (§4.5). Grounded on
//! `original_source/src/risk_calculator.py::_expand_etf_holdings` for the expansion algorithm
//! and `original_source/src/etf_data_fetcher.py::get_etf_holdings` for the fallback-source
//! priority chain (Fund-Detail Store -> user overlay -> built-in reference dataset -> opaque).

pub mod reference_data;
pub mod user_overlay;

use crate::config::seed_isin_ticker_map;
use crate::fund_store;
use crate::geo;
use crate::models::{EffectiveHolding, FundDetail, HoldingEntry, InstrumentType, RawPosition, SectorProvenance};
use crate::normalize::normalize_sector;
use crate::ticker_cache;

const RESIDUAL_EPSILON: f64 = 1e-3;

/// Runs the full pipeline over every raw position, producing a flat effective-holdings list.
pub async fn resolve_all(positions: &[RawPosition]) -> Vec<EffectiveHolding> {
    let mut out = Vec::new();
    for position in positions {
        out.extend(resolve_position(position).await);
    }
    out
}

async fn resolve_position(position: &RawPosition) -> Vec<EffectiveHolding> {
    match position.instrument_type {
        InstrumentType::Fund => resolve_fund(position).await,
        _ => vec![resolve_direct(position).await],
    }
}

async fn resolve_direct(position: &RawPosition) -> EffectiveHolding {
    let (sector, provenance) = resolve_direct_sector(position).await;

    let currency = if position.instrument_type == InstrumentType::Stock {
        position
            .identifier
            .as_deref()
            .and_then(geo::identifier_prefix_to_currency)
            .map(str::to_string)
            .unwrap_or_else(|| position.currency.clone())
    } else {
        position.currency.clone()
    };

    EffectiveHolding {
        name: position.name.clone(),
        value: position.value,
        currency,
        country: position
            .identifier
            .as_deref()
            .and_then(|id| id.get(0..2))
            .and_then(geo::country_code_to_name)
            .unwrap_or("Unknown")
            .to_string(),
        sector,
        origin_instrument: position.instrument_type,
        identifier: position.identifier.clone(),
        trade_symbol: position.trade_symbol.clone(),
        source_fund_name: None,
        sector_provenance: provenance,
        fund_type_override: None,
    }
}

async fn resolve_direct_sector(position: &RawPosition) -> (String, SectorProvenance) {
    if let Some(declared) = &position.declared_sector {
        return (declared.clone(), SectorProvenance::Declared);
    }

    if position.instrument_type == InstrumentType::Stock {
        if let Some(symbol) = &position.trade_symbol {
            let sector = ticker_cache::lookup(symbol, true, crate::config::TICKER_CACHE_MAX_AGE_DAYS).await;
            if sector != "Unknown" {
                return (sector, SectorProvenance::IdentifierLookup);
            }
        }
        return ("Unknown".to_string(), SectorProvenance::None);
    }

    // Non-Stock direct positions (Cash/Bond/Commodity) fall back to their instrument type as
    // the sector label, matching the original's direct-position handling.
    (position.instrument_type.as_str().to_string(), SectorProvenance::None)
}

async fn resolve_fund(position: &RawPosition) -> Vec<EffectiveHolding> {
    let Some(identifier) = &position.identifier else {
        return vec![opaque_fund_holding(position)];
    };

    if let Some(detail) = lookup_fund_detail(identifier).await {
        return expand_fund_detail(position, &detail);
    }

    if let Some(holdings) = user_overlay::get_holdings(identifier) {
        return expand_holding_list(position, &holdings, None);
    }

    if let Some(holdings) = reference_data::lookup(identifier) {
        return expand_holding_list(position, &holdings, None);
    }

    vec![opaque_fund_holding(position)]
}

async fn lookup_fund_detail(identifier: &str) -> Option<FundDetail> {
    let symbol = fund_store::lookup_symbol(identifier)
        .or_else(|| seed_isin_ticker_map().get(identifier).map(|s| s.to_string()))?;
    fund_store::get(&symbol)
}

fn opaque_fund_holding(position: &RawPosition) -> EffectiveHolding {
    EffectiveHolding {
        name: position.name.clone(),
        value: position.value,
        currency: position.currency.clone(),
        country: "Unknown".to_string(),
        sector: "ETF".to_string(),
        origin_instrument: position.instrument_type,
        identifier: position.identifier.clone(),
        trade_symbol: position.trade_symbol.clone(),
        source_fund_name: None,
        sector_provenance: SectorProvenance::None,
        fund_type_override: None,
    }
}

fn expand_fund_detail(position: &RawPosition, detail: &FundDetail) -> Vec<EffectiveHolding> {
    let origin = fund_type_origin(&detail.fund_type);
    expand_holding_list(position, &detail.top_holdings, Some(&detail.currency_allocation))
        .into_iter()
        .map(|mut h| {
            h.origin_instrument = origin;
            if origin == InstrumentType::Cash {
                h.fund_type_override = Some("MoneyMarket".to_string());
            }
            h
        })
        .collect()
}

fn fund_type_origin(fund_type: &str) -> InstrumentType {
    if fund_type.eq_ignore_ascii_case("money market") {
        InstrumentType::Cash
    } else if fund_type.eq_ignore_ascii_case("bond") {
        InstrumentType::Bond
    } else if fund_type.eq_ignore_ascii_case("commodity") {
        InstrumentType::Commodity
    } else {
        InstrumentType::Stock
    }
}

/// Shared expansion logic for Fund-Detail, user-overlay, and built-in-reference holding lists
/// (§4.5 items 2-4): proportional allocation of each top-holding, plus subtractive currency
/// decomposition of the "Other Holdings" residual when a currency-allocation table is present.
fn expand_holding_list(
    position: &RawPosition,
    holdings: &[HoldingEntry],
    currency_allocation: Option<&[crate::models::AllocationEntry]>,
) -> Vec<EffectiveHolding> {
    let mut out = Vec::new();
    let mut emitted_by_currency: std::collections::HashMap<String, f64> = std::collections::HashMap::new();
    let mut other_holding: Option<&HoldingEntry> = None;

    for holding in holdings {
        if holding.is_other_holdings() {
            other_holding = Some(holding);
            continue;
        }

        *emitted_by_currency.entry(holding.currency.clone()).or_insert(0.0) += holding.weight;

        out.push(EffectiveHolding {
            name: holding.name.clone(),
            value: position.value * holding.weight,
            currency: holding.currency.clone(),
            country: holding.country.clone(),
            sector: normalize_sector(&holding.sector),
            origin_instrument: position.instrument_type,
            identifier: holding.identifier.clone(),
            trade_symbol: None,
            source_fund_name: Some(position.name.clone()),
            sector_provenance: SectorProvenance::FundDetail,
            fund_type_override: None,
        });
    }

    if let Some(other) = other_holding {
        match currency_allocation {
            Some(allocation) if !allocation.is_empty() => {
                for entry in allocation {
                    let emitted = emitted_by_currency.get(&entry.name).copied().unwrap_or(0.0);
                    let residual = (entry.weight - emitted).max(0.0);
                    if residual < RESIDUAL_EPSILON {
                        continue;
                    }
                    out.push(EffectiveHolding {
                        name: format!("Other Holdings — {}", position.name),
                        value: position.value * residual,
                        currency: entry.name.clone(),
                        country: non_empty_or(&other.country, "Mixed"),
                        sector: normalize_sector(&other.sector),
                        origin_instrument: position.instrument_type,
                        identifier: None,
                        trade_symbol: None,
                        source_fund_name: Some(position.name.clone()),
                        sector_provenance: SectorProvenance::FundDetail,
                        fund_type_override: None,
                    });
                }
            }
            _ => {
                out.push(EffectiveHolding {
                    name: format!("Other Holdings — {}", position.name),
                    value: position.value * other.weight,
                    currency: "Mixed".to_string(),
                    country: non_empty_or(&other.country, "Mixed"),
                    sector: normalize_sector(&other.sector),
                    origin_instrument: position.instrument_type,
                    identifier: None,
                    trade_symbol: None,
                    source_fund_name: Some(position.name.clone()),
                    sector_provenance: SectorProvenance::FundDetail,
                    fund_type_override: None,
                });
            }
        }
    }

    out
}

fn non_empty_or(value: &str, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AllocationEntry;

    fn position(value: f64) -> RawPosition {
        RawPosition {
            name: "WorldFund".to_string(),
            identifier: Some("X1".to_string()),
            trade_symbol: None,
            instrument_type: InstrumentType::Fund,
            currency: "EUR".to_string(),
            quantity: 1.0,
            value,
            declared_sector: None,
            note: None,
        }
    }

    #[test]
    fn single_fund_no_decomposition_needed() {
        let holdings = vec![
            HoldingEntry { name: "A".to_string(), weight: 0.6, currency: "USD".to_string(), sector: "Technology".to_string(), country: "US".to_string(), identifier: None },
            HoldingEntry { name: "B".to_string(), weight: 0.4, currency: "EUR".to_string(), sector: "Industrials".to_string(), country: "DE".to_string(), identifier: None },
        ];
        let pos = position(1000.0);
        let result = expand_holding_list(&pos, &holdings, None);
        assert_eq!(result.len(), 2);
        assert!((result[0].value - 600.0).abs() < 1e-6);
        assert!((result[1].value - 400.0).abs() < 1e-6);
    }

    #[test]
    fn residual_currency_decomposition() {
        let holdings = vec![
            HoldingEntry { name: "A".to_string(), weight: 0.3, currency: "USD".to_string(), sector: "Technology".to_string(), country: "US".to_string(), identifier: None },
            HoldingEntry { name: "B".to_string(), weight: 0.2, currency: "EUR".to_string(), sector: "Industrials".to_string(), country: "DE".to_string(), identifier: None },
            HoldingEntry { name: "Other Holdings".to_string(), weight: 0.5, currency: "Mixed".to_string(), sector: "Diversified".to_string(), country: "Mixed".to_string(), identifier: None },
        ];
        let currency_allocation = vec![
            AllocationEntry { name: "USD".to_string(), weight: 0.5 },
            AllocationEntry { name: "EUR".to_string(), weight: 0.3 },
            AllocationEntry { name: "JPY".to_string(), weight: 0.2 },
        ];
        let pos = position(1000.0);
        let result = expand_holding_list(&pos, &holdings, Some(&currency_allocation));

        let usd_total: f64 = result.iter().filter(|h| h.currency == "USD").map(|h| h.value).sum();
        let eur_total: f64 = result.iter().filter(|h| h.currency == "EUR").map(|h| h.value).sum();
        let jpy_total: f64 = result.iter().filter(|h| h.currency == "JPY").map(|h| h.value).sum();

        assert!((usd_total - 500.0).abs() < 1e-6);
        assert!((eur_total - 300.0).abs() < 1e-6);
        assert!((jpy_total - 200.0).abs() < 1e-6);
    }

    #[test]
    fn no_residual_row_when_holdings_sum_to_full() {
        let holdings = vec![
            HoldingEntry { name: "A".to_string(), weight: 1.0, currency: "USD".to_string(), sector: "Technology".to_string(), country: "US".to_string(), identifier: None },
        ];
        let pos = position(1000.0);
        let result = expand_holding_list(&pos, &holdings, None);
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn direct_stock_overrides_currency_by_isin_prefix() {
        let pos = RawPosition {
            name: "Apple Inc".to_string(),
            identifier: Some("US0378331005".to_string()),
            trade_symbol: Some("AAPL".to_string()),
            instrument_type: InstrumentType::Stock,
            currency: "EUR".to_string(),
            quantity: 1.0,
            value: 100.0,
            declared_sector: Some("Technology".to_string()),
            note: None,
        };
        let resolved = resolve_direct(&pos).await;
        assert_eq!(resolved.currency, "USD");
        assert_eq!(resolved.sector, "Technology");
        assert_eq!(resolved.sector_provenance, SectorProvenance::Declared);
    }

    #[tokio::test]
    async fn non_stock_direct_position_uses_type_as_sector() {
        let pos = RawPosition {
            name: "Gold ETC".to_string(),
            identifier: None,
            trade_symbol: None,
            instrument_type: InstrumentType::Commodity,
            currency: "USD".to_string(),
            quantity: 1.0,
            value: 600.0,
            declared_sector: None,
            note: None,
        };
        let resolved = resolve_direct(&pos).await;
        assert_eq!(resolved.sector, "Commodity");
    }
}
