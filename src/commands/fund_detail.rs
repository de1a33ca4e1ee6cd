//! Fund-Detail Store + Scraper commands (§4.2, §4.3).

use serde::{Deserialize, Serialize};
use tauri::{command, AppHandle, Emitter};

use crate::fund_store;
use crate::models::FundDetail;
use crate::scraper::{self, FundDetailPreview};

#[command]
pub fn get_fund_detail(trade_symbol: String) -> Result<Option<FundDetail>, String> {
    Ok(fund_store::get(&trade_symbol))
}

#[command]
pub fn list_fund_details() -> Result<Vec<fund_store::FundDetailSummary>, String> {
    Ok(fund_store::enumerate())
}

#[command]
pub async fn scrape_fund_detail(
    identifier: String,
    trade_symbol: String,
    fund_type: String,
    region: Option<String>,
    proxy_identifier: Option<String>,
) -> Result<(), String> {
    scraper::generate_fund_detail(
        &identifier,
        &trade_symbol,
        &fund_type,
        region.as_deref(),
        proxy_identifier.as_deref(),
    )
    .await
    .map_err(|e| e.to_string())
}

/// DTO mirroring [`FundDetailPreview`] — `QualityVerdict` derives `Serialize` directly, but the
/// preview struct itself stays internal so the wire shape is this command's to own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundDetailPreviewDto {
    pub display_name: Option<String>,
    pub country_allocation: Vec<crate::models::AllocationEntry>,
    pub sector_allocation: Vec<crate::models::AllocationEntry>,
    pub currency_allocation: Vec<crate::models::AllocationEntry>,
    pub top_holdings: Vec<crate::models::HoldingEntry>,
    pub quality: scraper::FundDetailQualityVerdict,
}

impl From<FundDetailPreview> for FundDetailPreviewDto {
    fn from(preview: FundDetailPreview) -> Self {
        Self {
            display_name: preview.display_name,
            country_allocation: preview.country_allocation,
            sector_allocation: preview.sector_allocation,
            currency_allocation: preview.currency_allocation,
            top_holdings: preview.top_holdings,
            quality: preview.quality,
        }
    }
}

#[command]
pub async fn preview_fund_detail(
    identifier: String,
    proxy_identifier: Option<String>,
) -> Result<FundDetailPreviewDto, String> {
    scraper::preview_fund_detail(&identifier, proxy_identifier.as_deref())
        .await
        .map(FundDetailPreviewDto::from)
        .map_err(|e| e.to_string())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchUpdateProgress {
    current: usize,
    total: usize,
    trade_symbol: String,
}

/// Re-scrapes stale (or, with `only_stale = false`, every auto-generated) Fund-Detail records,
/// emitting a `fund-detail://batch-update-progress` event per item so a front-end progress bar
/// can track the run (§4.2 "Batch update detail", §5 per-item cancellation observation point).
#[command]
pub async fn batch_update_fund_details(
    app: AppHandle,
    only_stale: bool,
) -> Result<Vec<(String, Result<(), String>)>, String> {
    let results = scraper::batch_update(only_stale, |current, total, trade_symbol| {
        let _ = app.emit(
            "fund-detail://batch-update-progress",
            BatchUpdateProgress { current, total, trade_symbol: trade_symbol.to_string() },
        );
    })
    .await;

    Ok(results
        .into_iter()
        .map(|(symbol, outcome)| (symbol, outcome.map_err(|e| e.to_string())))
        .collect())
}
