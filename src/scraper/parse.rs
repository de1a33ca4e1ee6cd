//! HTML extraction for a single justETF-style profile page (§4.2 steps 1-2). Grounded on
//! `original_source/src/etf_detail_generator.py::JustETFScraper`'s `_parse_*` family.

use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;

/// A raw `(name, weight)` row scraped from a holdings/country/sector table, weight already a
/// plain percentage (0-100), before any currency/sector normalisation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAllocationRow {
    pub name: String,
    pub weight: f64,
}

/// A raw top-holding row, optionally carrying the constituent's own identifier extracted from
/// its detail-page link.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHoldingRow {
    pub name: String,
    pub weight: f64,
    pub identifier: Option<String>,
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid CSS")
}

fn text_of(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Percentage text in any of "24.5%", "24,5 %", "24.5 %" -> `24.5`.
pub fn parse_percentage(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let numeric: String = trimmed
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if numeric.is_empty() {
        return None;
    }
    numeric.replace(',', ".").parse::<f64>().ok()
}

/// ETF display name, read off the first `<h1>` on the page (§4.2 "display-name (from first
/// heading)").
pub fn parse_name(document: &Html) -> Option<String> {
    document
        .select(&selector("h1"))
        .next()
        .map(text_of)
        .filter(|s| !s.is_empty())
}

const METADATA_KEYS: &[(&str, &str)] = &[
    ("ter", "ter"),
    ("total expense", "ter"),
    ("gesamtkosten", "ter"),
    ("fund currency", "currency"),
    ("fondswährung", "currency"),
    ("replication", "replication"),
    ("replikation", "replication"),
    ("fund size", "fund_size"),
    ("fondsgröße", "fund_size"),
    ("distribution", "distribution"),
    ("ausschüttung", "distribution"),
    ("ertragsverwendung", "distribution"),
    ("fund domicile", "domicile"),
    ("fondsdomizil", "domicile"),
];

/// Scans every `<table>` row for labelled metadata pairs: expense ratio, fund currency,
/// replication method, fund size, distribution policy, domicile, index name (§4.2 step 2).
pub fn parse_metadata(document: &Html) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    let row_sel = selector("tr");
    let cell_sel = selector("td, th");

    for table in document.select(&selector("table")) {
        for row in table.select(&row_sel) {
            let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
            if cells.len() < 2 {
                continue;
            }
            let key = text_of(cells[0]).to_lowercase();
            let value = text_of(cells[1]);

            if key.trim() == "index" {
                metadata.insert("index".to_string(), value.clone());
                continue;
            }
            for (needle, field) in METADATA_KEYS {
                if key.contains(needle) {
                    let stored = if *field == "ter" {
                        extract_ter(&value).unwrap_or(value.clone())
                    } else {
                        value.clone()
                    };
                    metadata.insert((*field).to_string(), stored);
                    break;
                }
            }
        }
    }
    metadata
}

fn extract_ter(value: &str) -> Option<String> {
    let percent_idx = value.find('%')?;
    let before = &value[..percent_idx];
    let digits: String = before
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',' || c.is_whitespace())
        .collect::<String>()
        .chars()
        .rev()
        .collect();
    let trimmed = digits.trim().replace(',', ".");
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Extracts a 12-char alphanumeric identifier from an href of the shape
/// `/stock-profiles/IE00B4L5Y983`.
fn identifier_from_href(href: &str) -> Option<String> {
    let idx = href.find("/stock-profiles/")?;
    let candidate = &href[idx + "/stock-profiles/".len()..];
    let id: String = candidate.chars().take_while(|c| c.is_ascii_alphanumeric()).collect();
    if id.len() == 12 {
        Some(id)
    } else {
        None
    }
}

/// Top-holdings rows via `data-testid` selectors, falling back to a generic table scan when
/// the primary selectors find nothing (§4.2 step 2, "with a fallback generic-table scan").
pub fn parse_holdings(document: &Html) -> Vec<RawHoldingRow> {
    let row_sel = selector(r#"tr[data-testid="etf-holdings_top-holdings_row"]"#);
    let link_sel = selector("a");
    let mut rows: Vec<RawHoldingRow> = Vec::new();

    for row in document.select(&row_sel) {
        let name_el = row
            .select(&selector(r#"[data-testid*="top-holdings"][data-testid*="name"]"#))
            .next();
        let weight_el = row
            .select(&selector(r#"[data-testid*="top-holdings"][data-testid*="percentage"]"#))
            .next();
        let (Some(name_el), Some(weight_el)) = (name_el, weight_el) else {
            continue;
        };
        let Some(weight) = parse_percentage(&text_of(weight_el)) else {
            continue;
        };
        let name = text_of(name_el);
        let identifier = name_el
            .select(&link_sel)
            .next()
            .or_else(|| row.select(&link_sel).next())
            .and_then(|a| a.value().attr("href"))
            .and_then(identifier_from_href);
        rows.push(RawHoldingRow { name, weight, identifier });
    }

    if rows.is_empty() {
        rows = parse_holdings_fallback(document);
    }
    rows
}

/// Generic table scan used when the site's `data-testid` markup is absent: the first table
/// whose header mentions "holding"/"position"/"name" is treated as the holdings table.
fn parse_holdings_fallback(document: &Html) -> Vec<RawHoldingRow> {
    let row_sel = selector("tr");
    let cell_sel = selector("td");

    for table in document.select(&selector("table")) {
        let rows: Vec<ElementRef> = table.select(&row_sel).collect();
        if rows.len() < 2 {
            continue;
        }
        let header = text_of(rows[0]).to_lowercase();
        if !(header.contains("holding") || header.contains("position") || header.contains("name")) {
            continue;
        }
        let mut out = Vec::new();
        for row in &rows[1..] {
            let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
            if cells.len() < 2 {
                continue;
            }
            let name = text_of(cells[0]);
            if let Some(weight) = parse_percentage(&text_of(cells[1])) {
                if !name.is_empty() {
                    out.push(RawHoldingRow { name, weight, identifier: None });
                }
            }
        }
        if !out.is_empty() {
            return out;
        }
    }
    Vec::new()
}

fn parse_allocation_rows(document: &Html, testid: &str) -> Vec<RawAllocationRow> {
    let row_sel = selector(&format!(r#"tr[data-testid="{testid}"]"#));
    let name_attr = testid.replace("_row", "").replace("etf-holdings_", "");
    let name_sel = selector(&format!(r#"[data-testid*="{name_attr}"][data-testid*="name"]"#));
    let weight_sel = selector(&format!(r#"[data-testid*="{name_attr}"][data-testid*="percentage"]"#));

    document
        .select(&row_sel)
        .filter_map(|row| {
            let name_el = row.select(&name_sel).next()?;
            let weight_el = row.select(&weight_sel).next()?;
            let weight = parse_percentage(&text_of(weight_el))?;
            Some(RawAllocationRow { name: text_of(name_el), weight })
        })
        .collect()
}

pub fn parse_countries(document: &Html) -> Vec<RawAllocationRow> {
    parse_allocation_rows(document, "etf-holdings_countries_row")
}

pub fn parse_sectors(document: &Html) -> Vec<RawAllocationRow> {
    parse_allocation_rows(document, "etf-holdings_sectors_row")
}

/// Holdings reference date, if the page publishes one.
pub fn parse_holdings_date(document: &Html) -> Option<String> {
    document
        .select(&selector(r#"[data-testid="tl_etf-holdings_reference-date"]"#))
        .next()
        .map(text_of)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_percentage_with_comma_decimal() {
        assert_eq!(parse_percentage("24,5 %"), Some(24.5));
        assert_eq!(parse_percentage("24.5%"), Some(24.5));
        assert_eq!(parse_percentage(""), None);
    }

    #[test]
    fn parses_name_from_first_heading() {
        let html = Html::parse_document("<html><body><h1>iShares Core MSCI World</h1></body></html>");
        assert_eq!(parse_name(&html).as_deref(), Some("iShares Core MSCI World"));
    }

    #[test]
    fn parses_metadata_table_rows() {
        let html = Html::parse_document(
            r#"<table>
                 <tr><td>Total expense ratio (TER)</td><td>0.20% p.a.</td></tr>
                 <tr><td>Fund currency</td><td>USD</td></tr>
                 <tr><td>Replication</td><td>Physical (Full replication)</td></tr>
               </table>"#,
        );
        let metadata = parse_metadata(&html);
        assert_eq!(metadata.get("ter").map(String::as_str), Some("0.20"));
        assert_eq!(metadata.get("currency").map(String::as_str), Some("USD"));
        assert_eq!(metadata.get("replication").map(String::as_str), Some("Physical (Full replication)"));
    }

    #[test]
    fn parses_holdings_via_data_testid() {
        let html = Html::parse_document(
            r#"<table><tbody>
                 <tr data-testid="etf-holdings_top-holdings_row">
                   <td data-testid="etf-holdings_top-holdings_name"><a href="/en/stock-profiles/US0378331005">Apple Inc</a></td>
                   <td data-testid="etf-holdings_top-holdings_percentage">4.98%</td>
                 </tr>
               </tbody></table>"#,
        );
        let holdings = parse_holdings(&html);
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].name, "Apple Inc");
        assert!((holdings[0].weight - 4.98).abs() < 1e-6);
        assert_eq!(holdings[0].identifier.as_deref(), Some("US0378331005"));
    }

    #[test]
    fn falls_back_to_generic_table_when_no_testid_rows() {
        let html = Html::parse_document(
            r#"<table>
                 <tr><td>Holding Name</td><td>Weight</td></tr>
                 <tr><td>Apple Inc</td><td>4.98%</td></tr>
                 <tr><td>Microsoft Corp</td><td>3.95%</td></tr>
               </table>"#,
        );
        let holdings = parse_holdings(&html);
        assert_eq!(holdings.len(), 2);
        assert_eq!(holdings[0].name, "Apple Inc");
    }

    #[test]
    fn parses_country_allocation_rows() {
        let html = Html::parse_document(
            r#"<table><tbody>
                 <tr data-testid="etf-holdings_countries_row">
                   <td data-testid="etf-holdings_countries_name">United States</td>
                   <td data-testid="etf-holdings_countries_percentage">65.0%</td>
                 </tr>
               </tbody></table>"#,
        );
        let countries = parse_countries(&html);
        assert_eq!(countries, vec![RawAllocationRow { name: "United States".to_string(), weight: 65.0 }]);
    }
}
