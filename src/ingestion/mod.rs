//! Portfolio Ingestion: parses a semicolon-delimited Portfolio-snapshot export into
//! [`RawPosition`]s plus aggregate counts (§4.1). Grounded on
//! `original_source/src/csv_parser.py::parse_portfolio_csv`.

use crate::error::{ClusterRiskError, Result};
use crate::models::{IngestionSummary, InstrumentType, RawPosition};
use crate::normalize::normalize_sector;

const SECTOR_COLUMNS: &[&str] = &[
    "Branchen (GICS, Sektoren) (Ebene 1)",
    "Branchen (GICS, Sektoren)",
    "Branche",
    "Sektor",
    "Sector",
];

const CASH_NOTE_MARKERS: &[&str] = &["CASH", "GELDMARKT", "TAGESGELD"];

const MONEY_MARKET_KEYWORDS: &[&str] = &[
    "MONEY MARKET",
    "GELDMARKT",
    "OVERNIGHT",
    "LIQUIDITY",
    "LIQUIDITÄT",
    "TAGESGELD",
    "CASH FUND",
    "XEON",
];

pub(crate) const FUND_KEYWORDS: &[&str] = &[
    "ETF",
    "UCITS",
    "INDEX FUND",
    "TRACKER",
    "ISHARES",
    "ISHSIII",
    "ISHS",
    "EUNL",
    "VANGUARD",
    "XTRACKERS",
    "LYXOR",
    "AMUNDI",
    "SPDR",
    "INVESCO",
    "WISDOMTREE",
    "FRANKLIN",
    "MSCI WORLD",
    "MSCI EM",
    "MSCI EUROPE",
    "S&P 500",
    "NASDAQ",
    "DAX",
    "STOXX",
];

/// Parses a Portfolio-snapshot CSV (semicolon-separated, European decimal convention) into
/// a list of [`RawPosition`]s plus aggregate counts.
pub fn parse_portfolio_csv(content: &str) -> Result<(Vec<RawPosition>, IngestionSummary)> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ClusterRiskError::IngestionParseRow {
            row: 0,
            reason: format!("failed to read header row: {e}"),
        })?
        .clone();

    let mut positions = Vec::new();

    for (idx, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                crate::diagnostics::add_warning(
                    "Ingestion",
                    format!("row {idx} could not be read"),
                    e.to_string(),
                );
                continue;
            }
        };

        let row: std::collections::HashMap<&str, &str> = headers
            .iter()
            .zip(record.iter())
            .map(|(k, v)| (k, v))
            .collect();

        let name = row.get("Name").copied().unwrap_or("").trim();
        if name.is_empty() || name.contains("Summe") {
            continue;
        }

        match parse_row(&row, name) {
            Ok(Some(position)) => positions.push(position),
            Ok(None) => {}
            Err(reason) => {
                crate::diagnostics::add_warning(
                    "Ingestion",
                    format!("row {idx} ({name}) could not be parsed"),
                    reason,
                );
            }
        }
    }

    if positions.is_empty() {
        return Err(ClusterRiskError::IngestionEmpty);
    }

    let summary = IngestionSummary {
        total_value: positions.iter().map(|p| p.value).sum(),
        total_positions: positions.len(),
        etf_count: positions
            .iter()
            .filter(|p| p.instrument_type == InstrumentType::Fund)
            .count(),
        stock_count: positions
            .iter()
            .filter(|p| p.instrument_type == InstrumentType::Stock)
            .count(),
    };

    log::info!(
        "ingestion parsed {} positions, total value {:.2}",
        summary.total_positions,
        summary.total_value
    );

    Ok((positions, summary))
}

fn parse_row(
    row: &std::collections::HashMap<&str, &str>,
    name: &str,
) -> std::result::Result<Option<RawPosition>, String> {
    let bestand = row.get("Bestand").copied().unwrap_or("").trim();
    let notiz = row
        .get("Notiz")
        .copied()
        .unwrap_or("")
        .trim()
        .to_uppercase();

    let name_lower = name.to_lowercase();
    let note_says_cash = CASH_NOTE_MARKERS.iter().any(|m| notiz == *m || notiz.contains(m));
    let empty_bestand = bestand.is_empty() || bestand == "\"\"";
    let name_says_cash = name_lower.contains("konto") || name_lower.contains("cash");

    let marktwert = parse_european_decimal(row.get("Marktwert").copied().unwrap_or(""))
        .ok_or_else(|| "unparseable Marktwert value".to_string())?;

    if note_says_cash || empty_bestand || name_says_cash {
        return Ok(Some(RawPosition {
            name: name.to_string(),
            identifier: None,
            trade_symbol: None,
            instrument_type: InstrumentType::Cash,
            currency: "EUR".to_string(),
            quantity: 0.0,
            value: marktwert,
            declared_sector: None,
            note: non_empty(row.get("Notiz").copied()),
        }));
    }

    let quantity = parse_european_decimal(bestand).ok_or_else(|| "unparseable Bestand value".to_string())?;

    let symbol = row.get("Symbol").copied().unwrap_or("").trim();
    let identifier = row
        .get("ISIN")
        .copied()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let kurs = row.get("Kurs").copied().unwrap_or("").trim();
    let currency = extract_currency(kurs);

    let mut instrument_type = classify_security(name, symbol);
    if !notiz.is_empty() && CASH_NOTE_MARKERS.iter().any(|m| notiz.contains(m)) {
        instrument_type = InstrumentType::Cash;
    }

    let declared_sector = SECTOR_COLUMNS.iter().find_map(|col| {
        row.get(col)
            .copied()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(normalize_sector)
    });

    Ok(Some(RawPosition {
        name: name.to_string(),
        identifier,
        trade_symbol: non_empty(Some(symbol)),
        instrument_type,
        currency,
        quantity,
        value: marktwert,
        declared_sector,
        note: non_empty(row.get("Notiz").copied()),
    }))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// European convention: `.` is a thousands separator, `,` is the decimal point.
fn parse_european_decimal(raw: &str) -> Option<f64> {
    let trimmed = raw.trim().trim_matches('"');
    if trimmed.is_empty() {
        return None;
    }
    trimmed.replace('.', "").replace(',', ".").parse::<f64>().ok()
}

fn extract_currency(kurs: &str) -> String {
    if let Some((prefix, _)) = kurs.split_once(' ') {
        if prefix.len() == 3 && prefix.chars().all(|c| c.is_ascii_uppercase()) {
            return prefix.to_string();
        }
    }
    "EUR".to_string()
}

fn classify_security(name: &str, symbol: &str) -> InstrumentType {
    let name_upper = name.to_uppercase();
    let symbol_upper = symbol.to_uppercase();

    if MONEY_MARKET_KEYWORDS.iter().any(|k| name_upper.contains(k)) {
        return InstrumentType::Cash;
    }
    if FUND_KEYWORDS
        .iter()
        .any(|k| name_upper.contains(k) || symbol_upper.contains(k))
    {
        return InstrumentType::Fund;
    }
    if name_upper.contains("GOLD") || name_upper.contains("SILVER") || name_upper.contains("COMMODITY") {
        return InstrumentType::Commodity;
    }
    if name_upper.contains("BOND") || name_upper.contains("ANLEIHE") {
        return InstrumentType::Bond;
    }
    InstrumentType::Stock
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Bestand;Name;Symbol;Kurs;Marktwert;Anteil in %;Notiz\n\
10;APPLE INC;AAPL;USD 269,48;2.279,86;12,78;\n\
\"\";Testkonto;;;3.298,15;18,49;\n\
;Summe;;;5.578,01;100,00;\n";

    #[test]
    fn classifies_stock_and_cash_rows() {
        let (positions, summary) = parse_portfolio_csv(SAMPLE).unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(summary.total_positions, 2);
        assert!((summary.total_value - 5578.01).abs() < 1e-6);

        let stock = &positions[0];
        assert_eq!(stock.instrument_type, InstrumentType::Stock);
        assert_eq!(stock.currency, "USD");
        assert!((stock.value - 2279.86).abs() < 1e-6);

        let cash = &positions[1];
        assert_eq!(cash.instrument_type, InstrumentType::Cash);
        assert!((cash.value - 3298.15).abs() < 1e-6);
    }

    #[test]
    fn drops_summe_row_silently() {
        let (positions, _) = parse_portfolio_csv(SAMPLE).unwrap();
        assert!(positions.iter().all(|p| p.name != "Summe"));
    }

    #[test]
    fn empty_snapshot_is_ingestion_empty() {
        let content = "Bestand;Name;Symbol;Kurs;Marktwert;Anteil in %;Notiz\n;Summe;;;0,00;100,00;\n";
        let result = parse_portfolio_csv(content);
        assert!(matches!(result, Err(ClusterRiskError::IngestionEmpty)));
    }

    #[test]
    fn classifies_etf_by_keyword() {
        assert_eq!(classify_security("iShares Core MSCI World UCITS ETF", "EUNL"), InstrumentType::Fund);
        assert_eq!(classify_security("Xtrackers MSCI World", ""), InstrumentType::Fund);
    }

    #[test]
    fn extracts_currency_prefix() {
        assert_eq!(extract_currency("USD 269,48"), "USD");
        assert_eq!(extract_currency("148,314"), "EUR");
    }
}
