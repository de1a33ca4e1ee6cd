//! Quality gating, currency derivation, and holdings enrichment applied to a scraped page
//! before it is written as a [`FundDetail`] (§4.2 steps 5-8). Grounded on
//! `original_source/src/etf_detail_generator.py::JustETFScraper._check_data_quality` and
//! `_derive_currency_allocation`.

use crate::geo;
use crate::ingestion::FUND_KEYWORDS;
use crate::models::{AllocationEntry, HoldingEntry};
use crate::scraper::parse::{RawAllocationRow, RawHoldingRow};

const UNMAPPED_COUNTRY_THRESHOLD: f64 = 0.1;
const RESIDUAL_EPSILON: f64 = 1e-3;

/// Outcome of the pre-write unusability check (§4.2 step 5).
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum QualityVerdict {
    Usable { warnings: Vec<String> },
    Unusable { reason: String },
}

/// Scans holdings for fund-of-fund / swap-replication tells and flags empty pages outright.
pub fn check_data_quality(
    holdings: &[RawHoldingRow],
    countries: &[RawAllocationRow],
    sectors: &[RawAllocationRow],
) -> QualityVerdict {
    if !holdings.is_empty() {
        let fund_like = holdings
            .iter()
            .filter(|h| {
                let upper = h.name.to_uppercase();
                FUND_KEYWORDS.iter().any(|kw| upper.contains(kw))
            })
            .count();
        if fund_like * 2 > holdings.len() {
            return QualityVerdict::Unusable {
                reason: "synthetic/swap replication detected".to_string(),
            };
        }
    }

    if holdings.is_empty() && countries.is_empty() && sectors.is_empty() {
        return QualityVerdict::Unusable { reason: "no data".to_string() };
    }

    let mut warnings = Vec::new();
    if holdings.is_empty() {
        warnings.push("no top-holdings table found".to_string());
    }
    if countries.is_empty() {
        warnings.push("no country allocation table found".to_string());
    }
    if sectors.is_empty() {
        warnings.push("no sector allocation table found".to_string());
    }
    QualityVerdict::Usable { warnings }
}

/// Derives a currency-allocation table from a country-allocation table, folding Eurozone
/// members into a single EUR bucket and unmapped countries above the threshold into "Other"
/// (§4.2 step 6).
pub fn derive_currency_allocation(countries: &[AllocationEntry]) -> Vec<AllocationEntry> {
    let mut buckets: Vec<(String, f64)> = Vec::new();

    let mut add = |currency: &str, weight: f64| {
        if let Some(existing) = buckets.iter_mut().find(|(c, _)| c == currency) {
            existing.1 += weight;
        } else {
            buckets.push((currency.to_string(), weight));
        }
    };

    for entry in countries {
        match geo::country_to_currency(&entry.name) {
            Some(currency) => add(currency, entry.weight),
            None if entry.weight > UNMAPPED_COUNTRY_THRESHOLD => add("Other", entry.weight),
            None => {}
        }
    }

    buckets.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    buckets
        .into_iter()
        .map(|(name, weight)| AllocationEntry { name, weight })
        .collect()
}

/// Appends a synthetic "Other Holdings" row covering the gap between the sum of scraped
/// holdings weights and 100% (§4.2 step 7).
pub fn append_residual_holding(holdings: &mut Vec<HoldingEntry>) {
    let sum: f64 = holdings.iter().map(|h| h.weight).sum();
    let residual = 100.0 - sum;
    if residual > RESIDUAL_EPSILON {
        holdings.push(HoldingEntry {
            name: "Other Holdings".to_string(),
            weight: residual,
            currency: String::new(),
            sector: String::new(),
            country: String::new(),
            identifier: None,
        });
    }
}

/// Fills in currency and country for any holding whose identifier's first two characters
/// resolve to a country (§4.2 step 8). Holdings without a recognised prefix default to USD.
pub fn enrich_holdings(holdings: &mut [HoldingEntry]) {
    for holding in holdings.iter_mut() {
        let Some(identifier) = holding.identifier.as_deref() else {
            continue;
        };
        let prefix = identifier.get(0..2).map(str::to_uppercase);
        let Some(prefix) = prefix else { continue };
        match geo::country_code_to_name(&prefix) {
            Some(country) => {
                holding.country = country.to_string();
                holding.currency = geo::country_to_currency(country).unwrap_or("USD").to_string();
            }
            None => {
                if holding.currency.is_empty() {
                    holding.currency = "USD".to_string();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding(name: &str, weight: f64) -> RawHoldingRow {
        RawHoldingRow { name: name.to_string(), weight, identifier: None }
    }

    #[test]
    fn flags_synthetic_replication_when_holdings_are_mostly_funds() {
        let holdings = vec![
            holding("iShares Core S&P 500 UCITS ETF", 50.0),
            holding("Vanguard FTSE All-World ETF", 50.0),
        ];
        let verdict = check_data_quality(&holdings, &[], &[]);
        assert_eq!(
            verdict,
            QualityVerdict::Unusable { reason: "synthetic/swap replication detected".to_string() }
        );
    }

    #[test]
    fn flags_no_data_when_everything_empty() {
        let verdict = check_data_quality(&[], &[], &[]);
        assert_eq!(verdict, QualityVerdict::Unusable { reason: "no data".to_string() });
    }

    #[test]
    fn usable_with_warnings_when_some_tables_missing() {
        let holdings = vec![holding("Apple Inc", 5.0)];
        let verdict = check_data_quality(&holdings, &[], &[]);
        match verdict {
            QualityVerdict::Usable { warnings } => {
                assert!(warnings.iter().any(|w| w.contains("country")));
                assert!(warnings.iter().any(|w| w.contains("sector")));
            }
            _ => panic!("expected usable verdict"),
        }
    }

    #[test]
    fn derives_currency_allocation_folding_eurozone_and_other() {
        let countries = vec![
            AllocationEntry { name: "United States".to_string(), weight: 60.0 },
            AllocationEntry { name: "Germany".to_string(), weight: 20.0 },
            AllocationEntry { name: "France".to_string(), weight: 10.0 },
            AllocationEntry { name: "Atlantis".to_string(), weight: 5.0 },
            AllocationEntry { name: "Lilliput".to_string(), weight: 0.05 },
        ];
        let currencies = derive_currency_allocation(&countries);
        let eur = currencies.iter().find(|c| c.name == "EUR").unwrap();
        assert!((eur.weight - 30.0).abs() < 1e-6);
        assert!(currencies.iter().any(|c| c.name == "Other" && (c.weight - 5.0).abs() < 1e-6));
        assert!(!currencies.iter().any(|c| c.name == "Lilliput"));
    }

    #[test]
    fn appends_residual_holding_when_weights_short_of_total() {
        let mut holdings = vec![HoldingEntry {
            name: "Apple Inc".to_string(),
            weight: 60.0,
            currency: "USD".to_string(),
            sector: "Technology".to_string(),
            country: "United States".to_string(),
            identifier: None,
        }];
        append_residual_holding(&mut holdings);
        assert_eq!(holdings.len(), 2);
        assert!((holdings[1].weight - 40.0).abs() < 1e-6);
        assert!(holdings[1].is_other_holdings());
    }

    #[test]
    fn enriches_holding_currency_and_country_from_identifier_prefix() {
        let mut holdings = vec![HoldingEntry {
            name: "Apple Inc".to_string(),
            weight: 5.0,
            currency: String::new(),
            sector: String::new(),
            country: String::new(),
            identifier: Some("US0378331005".to_string()),
        }];
        enrich_holdings(&mut holdings);
        assert_eq!(holdings[0].currency, "USD");
        assert_eq!(holdings[0].country, "United States");
    }
}
