//! Diagnostics buffer commands (§7) — readable by the surrounding (out-of-scope) UI; distinct
//! from the `log` facade's operator-facing output.

use tauri::command;

use crate::diagnostics::{self, Diagnostic, DiagnosticsSummary};

#[command]
pub fn get_diagnostics() -> Result<Vec<Diagnostic>, String> {
    Ok(diagnostics::all())
}

#[command]
pub fn get_diagnostics_summary() -> Result<DiagnosticsSummary, String> {
    Ok(diagnostics::summary())
}
