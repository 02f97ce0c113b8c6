use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a snapshot from being read at all.
///
/// Problems with individual records never surface here; they are collected as
/// [`RecordFailure`]s next to the accepted records.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to read snapshot file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot has an unexpected shape: {0}")]
    Shape(String),
}

/// The kind of record a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Project,
    Cost,
    Billing,
    Receivable,
    MarginSnapshot,
    Budget,
    CashForecast,
    Ledger,
    ClosedPeriod,
    CloseEvent,
}

impl RecordKind {
    /// The top-level snapshot key holding records of this kind.
    pub fn section(&self) -> &'static str {
        match self {
            RecordKind::Project => "projects",
            RecordKind::Cost => "costs",
            RecordKind::Billing => "billing",
            RecordKind::Receivable => "receivables",
            RecordKind::MarginSnapshot => "margin_snapshots",
            RecordKind::Budget => "budgets",
            RecordKind::CashForecast => "cash_forecast",
            RecordKind::Ledger => "ledger",
            RecordKind::ClosedPeriod => "closed_periods",
            RecordKind::CloseEvent => "close_log",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section())
    }
}

/// A record that was rejected at ingestion, with enough context to find and fix it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    pub kind: RecordKind,
    /// Position of the record within its section.
    pub index: usize,
    pub record_id: Option<String>,
    pub field: String,
    pub message: String,
}

impl fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.kind, self.index)?;
        if let Some(id) = &self.record_id {
            write!(f, " (id {id})")?;
        }
        write!(f, " field '{}': {}", self.field, self.message)
    }
}
