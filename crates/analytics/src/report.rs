use crate::aging::AgingBucket;
use crate::profit_fade::Severity;
use core_types::ReceivableStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One dimension value of a cost rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationRow {
    pub key: String,
    pub total: Decimal,
    pub count: usize,
    /// Fraction of the grand total.
    pub pct_of_grand: Decimal,
}

/// Outstanding receivables of one client or project, split by age.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgingRow {
    pub group_key: String,
    pub current: Decimal,
    pub d1_30: Decimal,
    pub d31_60: Decimal,
    pub d60plus: Decimal,
    pub total: Decimal,
}

/// One open invoice on the aging detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceAging {
    pub id: String,
    pub client: String,
    pub project_id: Option<String>,
    pub balance: Decimal,
    pub age_days: i64,
    pub bucket: AgingBucket,
    pub status: ReceivableStatus,
}

/// One project on the profit fade dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FadeRow {
    pub project_id: String,
    pub project: String,
    pub severity: Severity,
    pub cpi: Option<Decimal>,
    pub margin_original: Decimal,
    pub margin_current: Option<Decimal>,
    pub margin_projected: Option<Decimal>,
    pub fade_percent: Option<Decimal>,
    /// Revenue earned but not yet invoiced.
    pub unbilled: Decimal,
}
