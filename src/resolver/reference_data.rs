//! Built-in reference dataset: a small `const` table of well-known index ETFs with their
//! top-15 holdings and a residual "Other Holdings" row, consulted by the Resolver as the last
//! source before falling back to an opaque single-line holding (§4.5). Grounded one-for-one on
//! `original_source/src/mock_etf_holdings.py::MOCK_ETF_HOLDINGS`.

use crate::models::HoldingEntry;

struct ReferenceHolding {
    name: &'static str,
    weight: f64,
    currency: &'static str,
    sector: &'static str,
    country: &'static str,
}

struct ReferenceFund {
    identifier: &'static str,
    name: &'static str,
    holdings: &'static [ReferenceHolding],
}

macro_rules! h {
    ($name:expr, $weight:expr, $currency:expr, $sector:expr, $country:expr) => {
        ReferenceHolding {
            name: $name,
            weight: $weight,
            currency: $currency,
            sector: $sector,
            country: $country,
        }
    };
}

const IWDA_HOLDINGS: &[ReferenceHolding] = &[
    h!("Apple Inc", 0.0498, "USD", "Technology", "US"),
    h!("NVIDIA Corp", 0.0467, "USD", "Technology", "US"),
    h!("Microsoft Corp", 0.0395, "USD", "Technology", "US"),
    h!("Amazon.com Inc", 0.0228, "USD", "Consumer Cyclical", "US"),
    h!("Meta Platforms Inc", 0.0163, "USD", "Communication Services", "US"),
    h!("Alphabet Inc Class A", 0.0141, "USD", "Communication Services", "US"),
    h!("Alphabet Inc Class C", 0.0123, "USD", "Communication Services", "US"),
    h!("Broadcom Inc", 0.0108, "USD", "Technology", "US"),
    h!("Tesla Inc", 0.0099, "USD", "Consumer Cyclical", "US"),
    h!("Berkshire Hathaway Inc", 0.0095, "USD", "Financial Services", "US"),
    h!("Eli Lilly and Co", 0.0088, "USD", "Healthcare", "US"),
    h!("JPMorgan Chase & Co", 0.0081, "USD", "Financial Services", "US"),
    h!("Walmart Inc", 0.0074, "USD", "Consumer Staples", "US"),
    h!("Visa Inc", 0.0069, "USD", "Financial Services", "US"),
    h!("UnitedHealth Group Inc", 0.0065, "USD", "Healthcare", "US"),
    h!("Other Holdings (>1400 positions)", 0.6906, "Mixed", "Diversified", "Mixed"),
];

const VHYL_HOLDINGS: &[ReferenceHolding] = &[
    h!("JPMorgan Chase & Co", 0.0195, "USD", "Financial Services", "US"),
    h!("Johnson & Johnson", 0.0187, "USD", "Healthcare", "US"),
    h!("Exxon Mobil Corp", 0.0176, "USD", "Energy", "US"),
    h!("Procter & Gamble Co", 0.0164, "USD", "Consumer Staples", "US"),
    h!("Bank of America Corp", 0.0153, "USD", "Financial Services", "US"),
    h!("AbbVie Inc", 0.0142, "USD", "Healthcare", "US"),
    h!("Coca-Cola Co", 0.0138, "USD", "Consumer Staples", "US"),
    h!("Chevron Corp", 0.0131, "USD", "Energy", "US"),
    h!("PepsiCo Inc", 0.0125, "USD", "Consumer Staples", "US"),
    h!("Merck & Co Inc", 0.0119, "USD", "Healthcare", "US"),
    h!("Pfizer Inc", 0.0112, "USD", "Healthcare", "US"),
    h!("Cisco Systems Inc", 0.0105, "USD", "Technology", "US"),
    h!("Other Holdings (>1800 positions)", 0.8253, "Mixed", "Diversified", "Mixed"),
];

const VWRL_HOLDINGS: &[ReferenceHolding] = &[
    h!("Apple Inc", 0.0445, "USD", "Technology", "US"),
    h!("Microsoft Corp", 0.0391, "USD", "Technology", "US"),
    h!("Amazon.com Inc", 0.0201, "USD", "Consumer Cyclical", "US"),
    h!("NVIDIA Corp", 0.0198, "USD", "Technology", "US"),
    h!("Alphabet Inc Class A", 0.0125, "USD", "Communication Services", "US"),
    h!("Meta Platforms Inc", 0.0149, "USD", "Communication Services", "US"),
    h!("Alphabet Inc Class C", 0.0109, "USD", "Communication Services", "US"),
    h!("Tesla Inc", 0.0131, "USD", "Consumer Cyclical", "US"),
    h!("Berkshire Hathaway Inc", 0.0128, "USD", "Financial Services", "US"),
    h!("Broadcom Inc", 0.0095, "USD", "Technology", "US"),
    h!("Other Holdings (>3900 positions)", 0.8028, "Mixed", "Diversified", "Mixed"),
];

const REFERENCE_FUNDS: &[ReferenceFund] = &[
    ReferenceFund {
        identifier: "IE00B4L5Y983",
        name: "iShares Core MSCI World UCITS ETF",
        holdings: IWDA_HOLDINGS,
    },
    ReferenceFund {
        identifier: "IE00B8GKDB10",
        name: "Vanguard FTSE All-World High Dividend Yield UCITS ETF",
        holdings: VHYL_HOLDINGS,
    },
    ReferenceFund {
        identifier: "IE00B3RBWM25",
        name: "Vanguard FTSE All-World UCITS ETF",
        holdings: VWRL_HOLDINGS,
    },
    ReferenceFund {
        identifier: "IE00BK5BQT80",
        name: "Vanguard FTSE All-World UCITS ETF (Acc)",
        holdings: VWRL_HOLDINGS,
    },
];

/// Returns the reference holdings for `identifier`, or `None` if it is not a known large
/// index ETF.
pub fn lookup(identifier: &str) -> Option<Vec<HoldingEntry>> {
    REFERENCE_FUNDS
        .iter()
        .find(|fund| fund.identifier == identifier)
        .map(|fund| {
            fund.holdings
                .iter()
                .map(|h| HoldingEntry {
                    name: h.name.to_string(),
                    weight: h.weight,
                    currency: h.currency.to_string(),
                    sector: h.sector.to_string(),
                    country: h.country.to_string(),
                    identifier: None,
                })
                .collect()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_isin_resolves() {
        let holdings = lookup("IE00B4L5Y983").unwrap();
        assert_eq!(holdings.len(), 16);
        assert_eq!(holdings[0].name, "Apple Inc");
    }

    #[test]
    fn unknown_isin_is_none() {
        assert!(lookup("XX0000000000").is_none());
    }
}
