//! Shared normalisation routines used by Ingestion, the Resolver, and the Aggregator
//! (§4.6 "Normalisation map (shared)"). Grounded on
//! `original_source/src/risk_calculator.py::_normalize_sector_name` and
//! `_normalize_position_name`.

/// Case-insensitive substring-on-lowercased-value lookup into the canonical sector set.
/// Falls back to a title-cased version of the input when nothing matches, exactly like the
/// original's `.title()` fallback.
pub fn normalize_sector(raw: &str) -> String {
    if raw.trim().is_empty() {
        return "Unknown".to_string();
    }
    let lower = raw.to_lowercase();

    const MAP: &[(&str, &str)] = &[
        ("technologie", "Technology"),
        ("technology", "Technology"),
        ("information technology", "Technology"),
        ("finanz", "Financial Services"),
        ("financial", "Financial Services"),
        ("bank", "Financial Services"),
        ("versicherung", "Financial Services"),
        ("gesundheit", "Healthcare"),
        ("health care", "Healthcare"),
        ("healthcare", "Healthcare"),
        ("pharma", "Healthcare"),
        ("zyklische konsumgüter", "Consumer Cyclical"),
        ("consumer discretionary", "Consumer Cyclical"),
        ("consumer cyclical", "Consumer Cyclical"),
        ("nicht-zyklische konsumgüter", "Consumer Staples"),
        ("consumer staples", "Consumer Staples"),
        ("consumer defensive", "Consumer Staples"),
        ("industrie", "Industrials"),
        ("industrials", "Industrials"),
        ("grundstoffe", "Materials"),
        ("basic materials", "Materials"),
        ("materials", "Materials"),
        ("energie", "Energy"),
        ("energy", "Energy"),
        ("versorger", "Utilities"),
        ("utilities", "Utilities"),
        ("immobilien", "Real Estate"),
        ("real estate", "Real Estate"),
        ("kommunikation", "Communication Services"),
        ("communication", "Communication Services"),
        ("telekommunikation", "Communication Services"),
        ("diversifiziert", "Diversified"),
        ("diversified", "Diversified"),
        ("mixed", "Diversified"),
        ("cash", "Cash"),
        ("etf", "ETF"),
        ("rohstoffe", "Commodity"),
        ("commodity", "Commodity"),
        ("commodities", "Commodity"),
    ];

    for (needle, canonical) in MAP {
        if lower.contains(needle) {
            return canonical.to_string();
        }
    }

    title_case(raw)
}

fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

const LEGAL_SUFFIXES: &[&str] = &[
    "inc.", "inc", "corp.", "corp", "ltd.", "ltd", "plc", "ag", "se", "sa", "co.", "co",
    "class a", "class b", "class c",
];

/// Lowercase, trim, collapse internal whitespace, strip a trailing legal suffix (§4.6 item 6).
pub fn normalize_position_name(raw: &str) -> String {
    let collapsed = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let mut result = collapsed;
    loop {
        let mut stripped_any = false;
        for suffix in LEGAL_SUFFIXES {
            if let Some(stripped) = result.strip_suffix(suffix) {
                let candidate = stripped.trim_end();
                if candidate.len() < result.len() {
                    result = candidate.to_string();
                    stripped_any = true;
                    break;
                }
            }
        }
        if !stripped_any {
            break;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_german_sector_labels() {
        assert_eq!(normalize_sector("Technologie"), "Technology");
        assert_eq!(normalize_sector("Nicht-zyklische Konsumgüter"), "Consumer Staples");
    }

    #[test]
    fn falls_back_to_title_case() {
        assert_eq!(normalize_sector("bespoke niche"), "Bespoke Niche");
    }

    #[test]
    fn strips_trailing_legal_suffixes() {
        assert_eq!(normalize_position_name("Apple Inc."), "apple");
        assert_eq!(normalize_position_name("  SAP   SE "), "sap");
    }

    #[test]
    fn collapses_whitespace_without_suffix() {
        assert_eq!(normalize_position_name("Berkshire   Hathaway"), "berkshire hathaway");
    }
}
