//! # Job-Cost Analytics Engine
//!
//! Turns contract, cost, billing and receivable records into the numbers a construction
//! back office reports on: earned value and CPI, the WIP schedule, profit fade severity,
//! receivables aging and dimensional cost rollups.
//!
//! ## Architectural Principles
//!
//! - **Pure Logic:** Every calculation is a synchronous function over borrowed, immutable
//!   records. Nothing here reads the clock or touches I/O; the caller supplies the as-of date.
//! - **Undefined Is Not Zero:** Ratios that would divide by zero (CPI with no cost, EAC with no
//!   progress) come back as `None` and are never scored as healthy or unhealthy.
//! - **Parallel By Project:** Per-project evaluation is independent, so `JobCostEngine` maps it
//!   across the rayon pool and joins before any portfolio totals are taken.
//!
//! ## Public API
//!
//! - `group_and_total`: the generic group-by used by every rollup.
//! - `bucketize` / `AgingReport`: receivables aging.
//! - `evaluate`: earned value for one project.
//! - `wip_line` / `wip_schedule` / `roll_up`: the WIP schedule.
//! - `classify` / `trend` / `fade_drivers`: profit fade.
//! - `rollup` / `CostFilter`: historical cost views.
//! - `forecast` / `runway`: weekly cash projection.
//! - `JobCostEngine`: whole-portfolio evaluation.

pub mod aggregation;
pub mod aging;
pub mod cash_flow;
pub mod costs;
pub mod earned_value;
pub mod engine;
pub mod error;
pub mod profit_fade;
pub mod report;
pub mod wip;

pub use aggregation::{group_and_total, percent_of, share, Group};
pub use aging::{bucketize, AgedReceivable, AgingBucket, AgingGroupBy, AgingReport, AgingTotals};
pub use cash_flow::{forecast, runway, ForecastWeek, Runway, Scenario};
pub use costs::{rollup, CostFilter, Dimension, UNASSIGNED};
pub use earned_value::{evaluate, EarnedValue};
pub use engine::{fade_dashboard, JobCostEngine, PortfolioEvaluation, ProjectEvaluation};
pub use error::AnalyticsError;
pub use profit_fade::{
    classify, classify_values, derive_snapshot, fade_drivers, fade_percent, latest_snapshots,
    sort_dashboard, trend, FadeClassification, FadeDriver, Severity,
};
pub use report::{AggregationRow, AgingRow, FadeRow, InvoiceAging};
pub use wip::{roll_up, wip_line, wip_schedule, BillingPosition, WipLine, WipTotals};
