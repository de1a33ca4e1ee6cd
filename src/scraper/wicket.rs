//! Parses the site's incremental-load ("Wicket") AJAX response: an XML envelope whose body is a
//! CDATA-wrapped HTML fragment containing the fully-loaded allocation table (§4.2 step 3).
//! Grounded on `original_source/src/etf_detail_generator.py::JustETFScraper._expand_allocation`,
//! reimplemented with `quick_xml` the way the example pack's IBKR clients parse FIX/AJAX XML
//! envelopes instead of regex-scraping the CDATA by hand.

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use scraper::Html;

use crate::error::{ClusterRiskError, Result};
use crate::scraper::parse::{parse_percentage, RawAllocationRow};

/// Pulls every CDATA section out of a Wicket `<ajax-response>` envelope and concatenates them;
/// the allocation fragment is normally the single `<component>` payload, but the envelope may
/// carry more than one component (e.g. a focus-restore script) so all of them are scanned.
fn extract_cdata(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text = false;
    let mut buf = Vec::new();
    let mut fragments = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::CData(cdata)) => {
                let bytes = cdata.into_inner();
                fragments.push_str(&String::from_utf8_lossy(&bytes));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ClusterRiskError::ScrapeParse {
                    identifier: "wicket-envelope".to_string(),
                    reason: e.to_string(),
                })
            }
        }
        buf.clear();
    }

    if fragments.is_empty() {
        return Err(ClusterRiskError::ScrapeParse {
            identifier: "wicket-envelope".to_string(),
            reason: "no CDATA section found in AJAX response".to_string(),
        });
    }
    Ok(fragments)
}

/// Extracts `(name, weight)` rows from the fully-loaded allocation table embedded in a Wicket
/// AJAX response body, matching on a `name_attr_hint` substring (e.g. `"countries"` or
/// `"sectors"`) the same way the live-page parser keys off `data-testid`, with a fallback to a
/// plain two-column `<tr>` scan when the fragment carries no such attributes.
pub fn expand_allocation(xml: &str, name_attr_hint: &str) -> Result<Vec<RawAllocationRow>> {
    let fragment = extract_cdata(xml)?;
    let document = Html::parse_fragment(&fragment);

    let row_selector = scraper::Selector::parse("tr").expect("static selector is valid CSS");
    let mut rows = Vec::new();

    for row in document.select(&row_selector) {
        let cells: Vec<_> = row
            .select(&scraper::Selector::parse("td, th").expect("static selector is valid CSS"))
            .collect();
        if cells.len() < 2 {
            continue;
        }
        let name_cell = cells[0];
        let weight_cell = cells[1];

        let matches_hint = name_attr_hint.is_empty()
            || name_cell
                .value()
                .attr("data-testid")
                .map(|v| v.contains(name_attr_hint))
                .unwrap_or(true);
        if !matches_hint {
            continue;
        }

        let name = name_cell.text().collect::<String>().trim().to_string();
        let Some(weight) = parse_percentage(&weight_cell.text().collect::<String>()) else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        rows.push(RawAllocationRow { name, weight });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENVELOPE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ajax-response>
  <component id="countries-table"><![CDATA[
    <table>
      <tr><td data-testid="countries-name">United States</td><td>65.2%</td></tr>
      <tr><td data-testid="countries-name">Japan</td><td>6.1%</td></tr>
      <tr><td data-testid="countries-name">United Kingdom</td><td>3.8%</td></tr>
    </table>
  ]]></component>
</ajax-response>"#;

    #[test]
    fn expands_full_country_allocation_from_cdata() {
        let rows = expand_allocation(ENVELOPE, "countries").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].name, "United States");
        assert!((rows[0].weight - 65.2).abs() < 1e-6);
        assert_eq!(rows[2].name, "United Kingdom");
    }

    #[test]
    fn errors_when_envelope_has_no_cdata() {
        let err = extract_cdata("<ajax-response></ajax-response>");
        assert!(err.is_err());
    }
}
