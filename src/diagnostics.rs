//! Per-run diagnostics buffer, readable by the surrounding (out-of-scope) UI.
//!
//! Distinct from `log` output: logging is for operators, this buffer is the structured,
//! user-facing record of what happened during one analysis run. Grounded on
//! `original_source/src/diagnostics.py`'s `DiagnosticsCollector`/`DiagnosticLevel`, kept as a
//! process-wide singleton the way the teacher keeps its database connection (`src/db/mod.rs`).

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub category: String,
    pub message: String,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticsSummary {
    pub total: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

#[derive(Debug, Default)]
pub struct DiagnosticsCollector {
    messages: Vec<Diagnostic>,
}

impl DiagnosticsCollector {
    pub fn add_info(&mut self, category: impl Into<String>, message: impl Into<String>) {
        self.push(DiagnosticLevel::Info, category, message, None);
    }

    pub fn add_warning(
        &mut self,
        category: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) {
        self.push(DiagnosticLevel::Warning, category, message, Some(details.into()));
    }

    pub fn add_error(
        &mut self,
        category: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) {
        self.push(DiagnosticLevel::Error, category, message, Some(details.into()));
    }

    fn push(
        &mut self,
        level: DiagnosticLevel,
        category: impl Into<String>,
        message: impl Into<String>,
        details: Option<String>,
    ) {
        self.messages.push(Diagnostic {
            level,
            category: category.into(),
            message: message.into(),
            details,
        });
    }

    pub fn has_warnings(&self) -> bool {
        self.messages.iter().any(|d| d.level == DiagnosticLevel::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|d| d.level == DiagnosticLevel::Error)
    }

    pub fn by_category(&self, category: &str) -> Vec<Diagnostic> {
        self.messages
            .iter()
            .filter(|d| d.category == category)
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<Diagnostic> {
        self.messages.clone()
    }

    pub fn summary(&self) -> DiagnosticsSummary {
        let mut summary = DiagnosticsSummary {
            total: self.messages.len(),
            ..Default::default()
        };
        for d in &self.messages {
            match d.level {
                DiagnosticLevel::Error => summary.errors += 1,
                DiagnosticLevel::Warning => summary.warnings += 1,
                DiagnosticLevel::Info => summary.infos += 1,
            }
        }
        summary
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

pub static DIAGNOSTICS: once_cell::sync::Lazy<Mutex<DiagnosticsCollector>> =
    once_cell::sync::Lazy::new(|| Mutex::new(DiagnosticsCollector::default()));

/// Resetting the buffer is an explicit step at run start (§7).
pub fn reset() {
    if let Ok(mut guard) = DIAGNOSTICS.lock() {
        guard.clear();
    }
}

pub fn add_warning(category: &str, message: impl Into<String>, details: impl Into<String>) {
    if let Ok(mut guard) = DIAGNOSTICS.lock() {
        guard.add_warning(category, message, details);
    }
}

pub fn add_error(category: &str, message: impl Into<String>, details: impl Into<String>) {
    if let Ok(mut guard) = DIAGNOSTICS.lock() {
        guard.add_error(category, message, details);
    }
}

pub fn add_info(category: &str, message: impl Into<String>) {
    if let Ok(mut guard) = DIAGNOSTICS.lock() {
        guard.add_info(category, message);
    }
}

pub fn summary() -> DiagnosticsSummary {
    DIAGNOSTICS
        .lock()
        .map(|g| g.summary())
        .unwrap_or_default()
}

pub fn all() -> Vec<Diagnostic> {
    DIAGNOSTICS.lock().map(|g| g.all()).unwrap_or_default()
}
