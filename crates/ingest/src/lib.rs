//! # Ledger Ingestion
//!
//! The input boundary between the accounting sync and the analytics engine. A ledger snapshot
//! is a JSON document with one array per record kind (`projects`, `costs`, `billing`,
//! `receivables`, `margin_snapshots`, `budgets`, `cash_forecast`, `ledger`, `closed_periods`,
//! `close_log`). Every record is deserialized into its `core-types` shape and validated on its own:
//!
//! - A malformed record is rejected with its section, index, id and offending field.
//! - A rejected record never aborts the rest of the batch.
//! - Values are never clamped or coerced into range.

pub mod error;
pub mod snapshot;

pub use error::{IngestError, RecordFailure, RecordKind};
pub use snapshot::{
    Batch, LedgerRecord, LedgerSnapshot, ingest, ingest_projects, load_snapshot, parse_snapshot,
};
