//! # Job-Cost Core Types
//!
//! The record shapes produced by the accounting feed and consumed by every other crate in the
//! workspace. Records carry their own domain validation (`validate`) so that ingestion can reject
//! a malformed record with the offending field named, instead of clamping it.

pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{
    CloseAction, CostCategory, LedgerSection, PeriodStatus, ReceivableStatus, StepStatus,
};
pub use error::CoreError;
pub use structs::AMOUNT_LIMIT;
pub use structs::{
    BillingRecord, CashForecastLine, CloseEvent, ClosedPeriod, CostCodeBudget, CostRecord,
    MarginSnapshot, PeriodLedgerLine, Project, ReceivableRecord,
};
