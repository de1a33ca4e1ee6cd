//! Structured error kinds for the core analysis pipeline.
//!
//! Free-form causal chains (I/O, HTTP, HTML/XML parsing) travel as `anyhow::Error` inside
//! each component; at a component boundary they are wrapped into the matching
//! `ClusterRiskError` variant so callers further up the pipeline can match on kind instead
//! of message text (this is what lets the resolver's fallback chain decide "try the next
//! source" from `FundDetailMissing` rather than from a string comparison).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterRiskError {
    #[error("failed to parse row {row}: {reason}")]
    IngestionParseRow { row: usize, reason: String },

    #[error("snapshot contained zero parseable rows")]
    IngestionEmpty,

    #[error("network error fetching fund detail for {identifier}: {source}")]
    ScrapeNetwork {
        identifier: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to parse fund detail page for {identifier}: {reason}")]
    ScrapeParse { identifier: String, reason: String },

    #[error("fund detail for {symbol} is unusable: {reason}{}", if *.proxy_hint { " (consider supplying a proxy identifier)" } else { "" })]
    ScrapeUnusable {
        symbol: String,
        reason: String,
        proxy_hint: bool,
    },

    #[error("no fund detail available for identifier {0}")]
    FundDetailMissing(String),

    #[error("fund detail store write failed: {0}")]
    FundDetailWriteFailed(String),

    #[error("no currency mapping for country {0}")]
    CurrencyLookupMissing(String),

    #[error("ticker lookup failed for symbol {0}")]
    TickerLookupFailed(String),

    #[error("history store write failed: {0}")]
    HistoryWriteFailed(String),
}

pub type Result<T> = std::result::Result<T, ClusterRiskError>;
