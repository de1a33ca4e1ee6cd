//! Fund-Detail Scraper: fetches a justETF-style profile page and the site's incremental-load
//! AJAX endpoint, derives a full [`FundDetail`], and writes it through the Fund-Detail Store
//! (§4.2). Grounded on `original_source/src/etf_detail_generator.py::JustETFScraper` /
//! `generate_etf_detail_file`; HTTP client conventions grounded on
//! `src/ticker_cache/providers.rs` and the teacher's `src/quotes/yahoo.rs`.

mod parse;
mod quality;
mod wicket;

use std::time::Duration;

use anyhow::anyhow;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use scraper::Html;

use crate::error::{ClusterRiskError, Result};
use crate::models::{AllocationEntry, FundDetail, HoldingEntry};
use crate::normalize::normalize_sector;
use quality::QualityVerdict;

const DESKTOP_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

const PROFILE_BASE_URL: &str = "https://www.justetf.com/en/etf-profile.html";
const AJAX_BASE_URL: &str = "https://www.justetf.com/servlet/etfsDataAjax";

/// One profile page's worth of parsed, not-yet-enriched data (§4.2 steps 1-3).
struct ScrapedPage {
    display_name: Option<String>,
    metadata: std::collections::HashMap<String, String>,
    holdings: Vec<parse::RawHoldingRow>,
    countries: Vec<parse::RawAllocationRow>,
    sectors: Vec<parse::RawAllocationRow>,
    holdings_date: Option<String>,
}

/// Builds a session-scoped client: a cookie jar so that whatever the landing page sets rides
/// along on the AJAX follow-ups (§4.2 step 1 "persistent session").
fn create_session() -> anyhow::Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(DESKTOP_USER_AGENT));
    reqwest::Client::builder()
        .default_headers(headers)
        .cookie_store(true)
        .timeout(Duration::from_secs(crate::config::HTTP_TIMEOUT_SECS))
        .build()
        .map_err(|e| anyhow!("failed to build scraper HTTP session: {e}"))
}

fn profile_url(identifier: &str) -> String {
    format!("{PROFILE_BASE_URL}?isin={identifier}")
}

fn ajax_url(identifier: &str, table: &str) -> String {
    format!(
        "{AJAX_BASE_URL}?0-1.-content-etfsTable-etfsTableRow-{table}-tableFilter=&isin={}&dt={}",
        urlencoding::encode(identifier),
        table
    )
}

async fn fetch_text(session: &reqwest::Client, identifier: &str, url: &str) -> Result<String> {
    let response = session
        .get(url)
        .send()
        .await
        .map_err(|e| ClusterRiskError::ScrapeNetwork { identifier: identifier.to_string(), source: anyhow!(e) })?;

    if !response.status().is_success() {
        return Err(ClusterRiskError::ScrapeNetwork {
            identifier: identifier.to_string(),
            source: anyhow!("HTTP {}", response.status()),
        });
    }

    response
        .text()
        .await
        .map_err(|e| ClusterRiskError::ScrapeNetwork { identifier: identifier.to_string(), source: anyhow!(e) })
}

/// Identical to [`fetch_text`] but marks the request as an incremental-load call, the way the
/// site's own JS distinguishes a full page load from an in-page table expansion (§6 "a marker
/// header that instructs the server to return the fragment envelope").
async fn fetch_ajax_text(session: &reqwest::Client, identifier: &str, url: &str) -> Result<String> {
    let response = session
        .get(url)
        .header("Wicket-Ajax", "true")
        .header("Wicket-Ajax-BaseURL", ".")
        .header("Accept", "application/xml")
        .send()
        .await
        .map_err(|e| ClusterRiskError::ScrapeNetwork { identifier: identifier.to_string(), source: anyhow!(e) })?;

    if !response.status().is_success() {
        return Err(ClusterRiskError::ScrapeNetwork {
            identifier: identifier.to_string(),
            source: anyhow!("HTTP {}", response.status()),
        });
    }

    response
        .text()
        .await
        .map_err(|e| ClusterRiskError::ScrapeNetwork { identifier: identifier.to_string(), source: anyhow!(e) })
}

/// Fetches and parses one profile page, then expands its country and sector allocations via
/// the incremental-load endpoint (§4.2 steps 1-3).
async fn scrape_page(session: &reqwest::Client, identifier: &str) -> Result<ScrapedPage> {
    let html = fetch_text(session, identifier, &profile_url(identifier)).await?;
    let document = Html::parse_document(&html);

    let display_name = parse::parse_name(&document);
    let metadata = parse::parse_metadata(&document);
    let holdings = parse::parse_holdings(&document);
    let holdings_date = parse::parse_holdings_date(&document);

    let mut countries = parse::parse_countries(&document);
    if let Ok(body) = fetch_ajax_text(session, identifier, &ajax_url(identifier, "countries")).await {
        if let Ok(expanded) = wicket::expand_allocation(&body, "countries") {
            if !expanded.is_empty() {
                countries = expanded;
            }
        }
    }

    let mut sectors = parse::parse_sectors(&document);
    if let Ok(body) = fetch_ajax_text(session, identifier, &ajax_url(identifier, "sectors")).await {
        if let Ok(expanded) = wicket::expand_allocation(&body, "sectors") {
            if !expanded.is_empty() {
                sectors = expanded;
            }
        }
    }

    Ok(ScrapedPage { display_name, metadata, holdings, countries, sectors, holdings_date })
}

/// Rescales a percentage-scale allocation table (0-100, as scraped) into the weight-fraction
/// scale (0-1) the rest of the crate works in.
fn to_fraction_scale(entries: Vec<AllocationEntry>) -> Vec<AllocationEntry> {
    entries
        .into_iter()
        .map(|e| AllocationEntry { name: e.name, weight: e.weight / 100.0 })
        .collect()
}

fn parse_expense_ratio(metadata: &std::collections::HashMap<String, String>) -> Option<f64> {
    metadata.get("ter").and_then(|v| v.parse::<f64>().ok())
}

/// Builds and writes a [`FundDetail`] for `identifier`/`trade_symbol` (§4.2 full algorithm).
/// `proxy_identifier`, when present, is scraped separately for allocations and holdings while
/// the primary identifier's metadata is kept (step 4).
pub async fn generate_fund_detail(
    identifier: &str,
    trade_symbol: &str,
    fund_type: &str,
    region: Option<&str>,
    proxy_identifier: Option<&str>,
) -> Result<()> {
    let session = create_session().map_err(|e| ClusterRiskError::ScrapeNetwork {
        identifier: identifier.to_string(),
        source: e,
    })?;

    let primary = scrape_page(&session, identifier).await?;

    let (allocation_source, source_tag) = if let Some(proxy_id) = proxy_identifier {
        let proxy = scrape_page(&session, proxy_id).await?;
        (proxy, format!("via Proxy: {proxy_id}"))
    } else {
        (
            ScrapedPage {
                display_name: primary.display_name.clone(),
                metadata: primary.metadata.clone(),
                holdings: primary.holdings.clone(),
                countries: primary.countries.clone(),
                sectors: primary.sectors.clone(),
                holdings_date: primary.holdings_date.clone(),
            },
            "Auto".to_string(),
        )
    };

    let verdict = quality::check_data_quality(&allocation_source.holdings, &allocation_source.countries, &allocation_source.sectors);
    if let QualityVerdict::Unusable { reason } = &verdict {
        if proxy_identifier.is_none() {
            return Err(ClusterRiskError::ScrapeUnusable {
                symbol: trade_symbol.to_string(),
                reason: reason.clone(),
                proxy_hint: true,
            });
        }
    }
    if let QualityVerdict::Usable { warnings } = &verdict {
        for warning in warnings {
            log::warn!("fund detail for {trade_symbol}: {warning}");
            crate::diagnostics::add_warning("scraper", warning.clone(), trade_symbol.to_string());
        }
    }

    let country_allocation: Vec<AllocationEntry> = allocation_source
        .countries
        .iter()
        .map(|row| AllocationEntry { name: row.name.clone(), weight: row.weight })
        .collect();
    let sector_allocation: Vec<AllocationEntry> = allocation_source
        .sectors
        .iter()
        .map(|row| AllocationEntry { name: normalize_sector(&row.name), weight: row.weight })
        .collect();
    let currency_allocation = quality::derive_currency_allocation(&country_allocation);

    let mut top_holdings: Vec<HoldingEntry> = allocation_source
        .holdings
        .iter()
        .map(|row| HoldingEntry {
            name: row.name.clone(),
            weight: row.weight,
            currency: String::new(),
            sector: String::new(),
            country: String::new(),
            identifier: row.identifier.clone(),
        })
        .collect();
    quality::enrich_holdings(&mut top_holdings);
    quality::append_residual_holding(&mut top_holdings);

    let base_currency = primary
        .metadata
        .get("currency")
        .cloned()
        .or_else(|| currency_allocation.first().map(|c| c.name.clone()))
        .unwrap_or_else(|| "USD".to_string());

    // Everything above this point works in the percentage scale the page itself displays
    // (quality::derive_currency_allocation's 0.1 threshold is "0.1%", append_residual_holding's
    // gap is "100 - sum"); the rest of the crate (FundDetail, the store's on-disk format,
    // the Resolver) works in weight fractions in [0, 1], so the four tables are rescaled once
    // here before they're folded into the record.
    let country_allocation = to_fraction_scale(country_allocation);
    let sector_allocation = to_fraction_scale(sector_allocation);
    let currency_allocation = to_fraction_scale(currency_allocation);
    for holding in &mut top_holdings {
        holding.weight /= 100.0;
    }

    let detail = FundDetail {
        identifier: identifier.to_string(),
        trade_symbol: trade_symbol.to_string(),
        display_name: primary.display_name.unwrap_or_else(|| trade_symbol.to_string()),
        fund_type: fund_type.to_string(),
        index_name: primary.metadata.get("index").cloned(),
        region: region.map(str::to_string),
        base_currency,
        expense_ratio: parse_expense_ratio(&primary.metadata),
        last_updated: Utc::now().date_naive(),
        proxy_identifier: proxy_identifier.map(str::to_string),
        source_tag,
        country_allocation,
        sector_allocation,
        currency_allocation,
        top_holdings,
    };

    if let Some(date) = &allocation_source.holdings_date {
        log::debug!("holdings for {trade_symbol} as of {date}");
    }
    crate::fund_store::put(&detail)
}

/// A scrape performed for inspection only (§4.2 "Status/preview operations"): runs steps 1-3
/// without touching the Fund-Detail Store, so a caller can review a composition before
/// committing it with [`generate_fund_detail`].
#[derive(Debug, Clone)]
pub struct FundDetailPreview {
    pub display_name: Option<String>,
    pub country_allocation: Vec<AllocationEntry>,
    pub sector_allocation: Vec<AllocationEntry>,
    pub currency_allocation: Vec<AllocationEntry>,
    pub top_holdings: Vec<HoldingEntry>,
    pub quality: QualityVerdict,
}

pub async fn preview_fund_detail(identifier: &str, proxy_identifier: Option<&str>) -> Result<FundDetailPreview> {
    let session = create_session().map_err(|e| ClusterRiskError::ScrapeNetwork {
        identifier: identifier.to_string(),
        source: e,
    })?;

    let primary = scrape_page(&session, identifier).await?;
    let allocation_source = if let Some(proxy_id) = proxy_identifier {
        scrape_page(&session, proxy_id).await?
    } else {
        primary
    };

    let quality = quality::check_data_quality(
        &allocation_source.holdings,
        &allocation_source.countries,
        &allocation_source.sectors,
    );

    let country_allocation: Vec<AllocationEntry> = allocation_source
        .countries
        .iter()
        .map(|row| AllocationEntry { name: row.name.clone(), weight: row.weight })
        .collect();
    let sector_allocation: Vec<AllocationEntry> = allocation_source
        .sectors
        .iter()
        .map(|row| AllocationEntry { name: normalize_sector(&row.name), weight: row.weight })
        .collect();
    let currency_allocation = quality::derive_currency_allocation(&country_allocation);

    let mut top_holdings: Vec<HoldingEntry> = allocation_source
        .holdings
        .iter()
        .map(|row| HoldingEntry {
            name: row.name.clone(),
            weight: row.weight,
            currency: String::new(),
            sector: String::new(),
            country: String::new(),
            identifier: row.identifier.clone(),
        })
        .collect();
    quality::enrich_holdings(&mut top_holdings);
    quality::append_residual_holding(&mut top_holdings);

    let country_allocation = to_fraction_scale(country_allocation);
    let sector_allocation = to_fraction_scale(sector_allocation);
    let currency_allocation = to_fraction_scale(currency_allocation);
    for holding in &mut top_holdings {
        holding.weight /= 100.0;
    }

    Ok(FundDetailPreview {
        display_name: allocation_source.display_name,
        country_allocation,
        sector_allocation,
        currency_allocation,
        top_holdings,
        quality,
    })
}

/// Re-scrapes every auto-generated record older than the staleness threshold, skipping
/// manually-maintained entries, and waiting [`crate::config::SCRAPE_BATCH_DELAY_MS`] between
/// requests so the site isn't hammered (§4.2 "Freshness" / "Batch update detail").
///
/// `only_stale` mirrors the original's filter toggle: when `false`, every auto-generated record
/// is re-scraped regardless of age. Manually-maintained records are always skipped. `progress`
/// is invoked once per processed record with `(current, total, trade_symbol)`; cancellation is
/// observed only between items (§5), which this simple loop shape gives for free.
pub async fn batch_update(
    only_stale: bool,
    mut progress: impl FnMut(usize, usize, &str),
) -> Vec<(String, Result<()>)> {
    let mut results = Vec::new();
    let candidates: Vec<_> = crate::fund_store::enumerate()
        .into_iter()
        .filter(|summary| !only_stale || summary.is_stale)
        .filter(|summary| summary.data_source != crate::models::DataSource::Manual)
        .collect();
    let total = candidates.len();

    for (idx, summary) in candidates.iter().enumerate() {
        progress(idx + 1, total, &summary.trade_symbol);

        let Some(detail) = crate::fund_store::get(&summary.trade_symbol) else {
            continue;
        };

        let outcome = generate_fund_detail(
            &detail.identifier,
            &detail.trade_symbol,
            &detail.fund_type,
            detail.region.as_deref(),
            detail.proxy_identifier.as_deref(),
        )
        .await;
        results.push((summary.trade_symbol.clone(), outcome));

        if idx + 1 < total {
            tokio::time::sleep(Duration::from_millis(crate::config::SCRAPE_BATCH_DELAY_MS)).await;
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_url_embeds_identifier() {
        assert_eq!(profile_url("IE00B4L5Y983"), "https://www.justetf.com/en/etf-profile.html?isin=IE00B4L5Y983");
    }

    #[test]
    fn ajax_url_embeds_identifier_and_table() {
        let url = ajax_url("IE00B4L5Y983", "countries");
        assert!(url.contains("isin=IE00B4L5Y983"));
        assert!(url.contains("countries"));
    }

    #[test]
    fn fraction_scale_rescales_percent_to_unit_interval() {
        let entries = vec![
            AllocationEntry { name: "United States".to_string(), weight: 65.0 },
            AllocationEntry { name: "Germany".to_string(), weight: 20.0 },
        ];
        let rescaled = to_fraction_scale(entries);
        assert!((rescaled[0].weight - 0.65).abs() < 1e-9);
        assert!((rescaled[1].weight - 0.20).abs() < 1e-9);
    }

    #[test]
    fn parses_expense_ratio_from_metadata() {
        let mut metadata = std::collections::HashMap::new();
        metadata.insert("ter".to_string(), "0.20".to_string());
        assert_eq!(parse_expense_ratio(&metadata), Some(0.20));
    }
}

pub use quality::QualityVerdict as FundDetailQualityVerdict;
