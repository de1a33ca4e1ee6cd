//! Analysis run + Analysis History commands: the Ingestion -> Resolver -> Aggregator -> History
//! pipeline wired end to end (§2 "Control flow is strictly pipelined"), plus the retrieval/
//! deletion surface the (out-of-scope) front-end drives.

use serde::{Deserialize, Serialize};
use tauri::command;

use crate::models::{AnalysisRecord, InstrumentType, RiskTable};
use crate::{aggregator, diagnostics, history, ingestion, resolver};

/// Everything one `run_analysis` call hands back to the caller: the persisted record's id, the
/// computed tables, and the diagnostics collected while producing them (§7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRunResult {
    pub analysis_id: Option<i64>,
    pub total_value: f64,
    pub total_positions: usize,
    pub etf_count: usize,
    pub stock_count: usize,
    pub risk_tables: Vec<RiskTable>,
    pub diagnostics: Vec<crate::diagnostics::Diagnostic>,
}

/// Runs one full analysis over `csv_content` (§4.1-§4.6). The diagnostics buffer is reset at
/// the start of the run per §7; a `HistoryWriteFailed` does not invalidate the in-memory
/// result, matching the policy table in §7.
#[command]
pub async fn run_analysis(csv_content: String) -> Result<AnalysisRunResult, String> {
    diagnostics::reset();

    let (positions, summary) = ingestion::parse_portfolio_csv(&csv_content).map_err(|e| e.to_string())?;
    let etf_count = positions.iter().filter(|p| p.instrument_type == InstrumentType::Fund).count();
    let stock_count = positions.iter().filter(|p| p.instrument_type == InstrumentType::Stock).count();

    let holdings = resolver::resolve_all(&positions).await;
    let risk_tables = aggregator::aggregate(&holdings);

    let record = AnalysisRecord {
        id: None,
        timestamp: chrono::Utc::now(),
        total_value: summary.total_value,
        total_positions: summary.total_positions,
        etf_count,
        stock_count,
        risk_tables: risk_tables.clone(),
    };

    let analysis_id = match history::insert(&record) {
        Ok(id) => Some(id),
        Err(e) => {
            log::warn!("failed to persist analysis run: {e}");
            diagnostics::add_warning("History", "analysis run was not saved to history", e.to_string());
            None
        }
    };

    Ok(AnalysisRunResult {
        analysis_id,
        total_value: record.total_value,
        total_positions: record.total_positions,
        etf_count: record.etf_count,
        stock_count: record.stock_count,
        risk_tables,
        diagnostics: diagnostics::all(),
    })
}

#[command]
pub fn list_analyses() -> Result<Vec<history::AnalysisSummary>, String> {
    history::list().map_err(|e| e.to_string())
}

#[command]
pub fn get_analysis(id: i64) -> Result<Option<AnalysisRecord>, String> {
    history::get(id).map_err(|e| e.to_string())
}

#[command]
pub fn delete_analysis(id: i64) -> Result<bool, String> {
    history::delete(id).map_err(|e| e.to_string())
}

#[command]
pub fn clear_analyses() -> Result<(), String> {
    history::clear_all().map_err(|e| e.to_string())
}

#[command]
pub fn get_analysis_timeline(category: String) -> Result<Vec<history::TimelinePoint>, String> {
    history::timeline(&category).map_err(|e| e.to_string())
}
