//! Analysis History store: a single keyed SQLite table recording every completed run so that
//! later runs form a time series (§4, §6). Grounded on
//! `original_source/src/database.py::HistoryDatabase`; the connection singleton is the one
//! opened by `src/db/mod.rs::init_database`, matching the teacher's single-connection pattern.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::{ClusterRiskError, Result};
use crate::models::{AnalysisRecord, RiskTable};

/// Summary row returned by [`list`] — the full `risk_tables` body is left out until [`get`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub total_value: f64,
    pub total_positions: usize,
    pub etf_count: usize,
    pub stock_count: usize,
}

/// Appends a completed run. Each insert is a single transaction; the caller's in-memory
/// results remain valid even if this fails (§7 `HistoryWriteFailed` policy).
pub fn insert(record: &AnalysisRecord) -> Result<i64> {
    let guard = crate::db::get_connection().map_err(|e| ClusterRiskError::HistoryWriteFailed(e.to_string()))?;
    let conn = guard
        .as_ref()
        .ok_or_else(|| ClusterRiskError::HistoryWriteFailed("history database not initialised".to_string()))?;

    let risk_data = serde_json::to_string(&record.risk_tables)
        .map_err(|e| ClusterRiskError::HistoryWriteFailed(e.to_string()))?;

    conn.execute(
        "INSERT INTO analyses (timestamp, total_value, total_positions, etf_count, stock_count, risk_data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.timestamp.to_rfc3339(),
            record.total_value,
            record.total_positions as i64,
            record.etf_count as i64,
            record.stock_count as i64,
            risk_data,
        ],
    )
    .map_err(|e| ClusterRiskError::HistoryWriteFailed(e.to_string()))?;

    Ok(conn.last_insert_rowid())
}

/// Lists every run's summary, most recent first.
pub fn list() -> Result<Vec<AnalysisSummary>> {
    let guard = crate::db::get_connection().map_err(|e| ClusterRiskError::HistoryWriteFailed(e.to_string()))?;
    let conn = guard
        .as_ref()
        .ok_or_else(|| ClusterRiskError::HistoryWriteFailed("history database not initialised".to_string()))?;

    let mut stmt = conn
        .prepare(
            "SELECT id, timestamp, total_value, total_positions, etf_count, stock_count
             FROM analyses ORDER BY timestamp DESC",
        )
        .map_err(|e| ClusterRiskError::HistoryWriteFailed(e.to_string()))?;

    let rows = stmt
        .query_map([], |row| {
            let timestamp_str: String = row.get(1)?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());
            Ok(AnalysisSummary {
                id: row.get(0)?,
                timestamp,
                total_value: row.get(2)?,
                total_positions: row.get::<_, i64>(3)? as usize,
                etf_count: row.get::<_, i64>(4)? as usize,
                stock_count: row.get::<_, i64>(5)? as usize,
            })
        })
        .map_err(|e| ClusterRiskError::HistoryWriteFailed(e.to_string()))?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| ClusterRiskError::HistoryWriteFailed(e.to_string()))
}

/// Returns the full record (including its risk tables) for one run.
pub fn get(id: i64) -> Result<Option<AnalysisRecord>> {
    let guard = crate::db::get_connection().map_err(|e| ClusterRiskError::HistoryWriteFailed(e.to_string()))?;
    let conn = guard
        .as_ref()
        .ok_or_else(|| ClusterRiskError::HistoryWriteFailed("history database not initialised".to_string()))?;

    let row = conn
        .query_row(
            "SELECT timestamp, total_value, total_positions, etf_count, stock_count, risk_data
             FROM analyses WHERE id = ?1",
            params![id],
            |row| {
                let timestamp_str: String = row.get(0)?;
                let risk_data: String = row.get(5)?;
                Ok((
                    timestamp_str,
                    row.get::<_, f64>(1)?,
                    row.get::<_, i64>(2)? as usize,
                    row.get::<_, i64>(3)? as usize,
                    row.get::<_, i64>(4)? as usize,
                    risk_data,
                ))
            },
        )
        .optional()
        .map_err(|e| ClusterRiskError::HistoryWriteFailed(e.to_string()))?;

    let Some((timestamp_str, total_value, total_positions, etf_count, stock_count, risk_data)) = row else {
        return Ok(None);
    };

    let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let risk_tables: Vec<RiskTable> =
        serde_json::from_str(&risk_data).map_err(|e| ClusterRiskError::HistoryWriteFailed(e.to_string()))?;

    Ok(Some(AnalysisRecord {
        id: Some(id),
        timestamp,
        total_value,
        total_positions,
        etf_count,
        stock_count,
        risk_tables,
    }))
}

/// Deletes a single run. Immutable except via this explicit step (§3 invariant).
pub fn delete(id: i64) -> Result<bool> {
    let guard = crate::db::get_connection().map_err(|e| ClusterRiskError::HistoryWriteFailed(e.to_string()))?;
    let conn = guard
        .as_ref()
        .ok_or_else(|| ClusterRiskError::HistoryWriteFailed("history database not initialised".to_string()))?;

    let affected = conn
        .execute("DELETE FROM analyses WHERE id = ?1", params![id])
        .map_err(|e| ClusterRiskError::HistoryWriteFailed(e.to_string()))?;
    Ok(affected > 0)
}

/// Clears every run and reclaims the freed space (§6 "clear-all (followed by space reclamation)").
pub fn clear_all() -> Result<()> {
    let guard = crate::db::get_connection().map_err(|e| ClusterRiskError::HistoryWriteFailed(e.to_string()))?;
    let conn = guard
        .as_ref()
        .ok_or_else(|| ClusterRiskError::HistoryWriteFailed("history database not initialised".to_string()))?;

    conn.execute("DELETE FROM analyses", [])
        .map_err(|e| ClusterRiskError::HistoryWriteFailed(e.to_string()))?;
    conn.execute("VACUUM", [])
        .map_err(|e| ClusterRiskError::HistoryWriteFailed(e.to_string()))?;
    Ok(())
}

/// A single point of the `timeline(category)` time series (§4.7 "Timeline query").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Returns the time series of a single numeric field across every run, oldest first. Only
/// `total_value` is implemented; other categories are a named, documented gap rather than a
/// silent no-op (§4.7), matching the original's own `unimplemented!`/`todo!` for them.
pub fn timeline(category: &str) -> Result<Vec<TimelinePoint>> {
    if category != "total_value" {
        return Err(ClusterRiskError::HistoryWriteFailed(format!(
            "timeline category \"{category}\" is not implemented (only \"total_value\" is)"
        )));
    }

    let guard = crate::db::get_connection().map_err(|e| ClusterRiskError::HistoryWriteFailed(e.to_string()))?;
    let conn = guard
        .as_ref()
        .ok_or_else(|| ClusterRiskError::HistoryWriteFailed("history database not initialised".to_string()))?;

    let mut stmt = conn
        .prepare("SELECT timestamp, total_value FROM analyses ORDER BY timestamp ASC")
        .map_err(|e| ClusterRiskError::HistoryWriteFailed(e.to_string()))?;

    let rows = stmt
        .query_map([], |row| {
            let timestamp_str: String = row.get(0)?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());
            Ok(TimelinePoint { timestamp, value: row.get(1)? })
        })
        .map_err(|e| ClusterRiskError::HistoryWriteFailed(e.to_string()))?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| ClusterRiskError::HistoryWriteFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RiskDimension, RiskLevel};

    fn init_test_db() {
        let path = std::env::temp_dir().join(format!("cluster_risk_test_history_{}.db", uuid::Uuid::new_v4()));
        crate::db::init_database(&path).unwrap();
    }

    fn sample_record() -> AnalysisRecord {
        AnalysisRecord {
            id: None,
            timestamp: Utc::now(),
            total_value: 1000.0,
            total_positions: 2,
            etf_count: 1,
            stock_count: 1,
            risk_tables: vec![RiskTable {
                dimension: RiskDimension::AssetClass,
                rows: vec![],
                risk_level: RiskLevel::Low,
            }],
        }
    }

    #[test]
    fn insert_then_list_then_get_round_trips() {
        init_test_db();
        let id = insert(&sample_record()).unwrap();
        let summaries = list().unwrap();
        assert!(summaries.iter().any(|s| s.id == id));

        let fetched = get(id).unwrap().unwrap();
        assert_eq!(fetched.risk_tables.len(), 1);
        assert!((fetched.total_value - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn delete_removes_record() {
        init_test_db();
        let id = insert(&sample_record()).unwrap();
        assert!(delete(id).unwrap());
        assert!(get(id).unwrap().is_none());
    }

    #[test]
    fn timeline_returns_total_value_series_oldest_first() {
        init_test_db();
        insert(&sample_record()).unwrap();
        insert(&sample_record()).unwrap();
        let series = timeline("total_value").unwrap();
        assert_eq!(series.len(), 2);
        assert!(series.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn timeline_rejects_unimplemented_category() {
        init_test_db();
        assert!(timeline("sharpe_ratio").is_err());
    }

    #[test]
    fn clear_all_empties_store() {
        init_test_db();
        insert(&sample_record()).unwrap();
        insert(&sample_record()).unwrap();
        clear_all().unwrap();
        assert!(list().unwrap().is_empty());
    }
}
