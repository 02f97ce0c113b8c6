use crate::aggregation::group_and_total;
use crate::error::AnalyticsError;
use crate::report::AggregationRow;
use chrono::NaiveDate;
use core_types::{CostCategory, CostRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Group key for records missing an optional reference.
pub const UNASSIGNED: &str = "Unassigned";

/// A dimension cost records can be rolled up along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Project,
    Vendor,
    CostCode,
    Category,
    /// Calendar month of the posting date, as `YYYY-MM`.
    Month,
}

impl Dimension {
    pub fn key(&self, record: &CostRecord) -> String {
        let or_unassigned =
            |v: &Option<String>| v.clone().unwrap_or_else(|| UNASSIGNED.to_string());
        match self {
            Dimension::Project => or_unassigned(&record.project_id),
            Dimension::Vendor => or_unassigned(&record.vendor),
            Dimension::CostCode => or_unassigned(&record.cost_code),
            Dimension::Category => record.category.to_string(),
            Dimension::Month => record.posted_on.format("%Y-%m").to_string(),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Dimension::Project => "project",
            Dimension::Vendor => "vendor",
            Dimension::CostCode => "cost_code",
            Dimension::Category => "category",
            Dimension::Month => "month",
        };
        f.write_str(s)
    }
}

impl FromStr for Dimension {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "project" | "job" => Ok(Dimension::Project),
            "vendor" => Ok(Dimension::Vendor),
            "cost_code" | "code" => Ok(Dimension::CostCode),
            "category" => Ok(Dimension::Category),
            "month" => Ok(Dimension::Month),
            other => Err(AnalyticsError::InvalidArgument(format!(
                "unknown rollup dimension '{other}'"
            ))),
        }
    }
}

/// Narrows a set of cost records. Every criterion is optional; an empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CostFilter {
    pub project: Option<String>,
    pub category: Option<CostCategory>,
    pub vendor: Option<String>,
    pub cost_code: Option<String>,
    /// Inclusive.
    pub from: Option<NaiveDate>,
    /// Inclusive.
    pub to: Option<NaiveDate>,
    /// Case-insensitive substring of description, vendor or cost code.
    pub search: Option<String>,
}

impl CostFilter {
    pub fn matches(&self, record: &CostRecord) -> bool {
        let same = |want: &Option<String>, have: &Option<String>| match want {
            Some(want) => have.as_deref() == Some(want.as_str()),
            None => true,
        };

        same(&self.project, &record.project_id)
            && same(&self.vendor, &record.vendor)
            && same(&self.cost_code, &record.cost_code)
            && self.category.is_none_or(|c| c == record.category)
            && self.from.is_none_or(|d| record.posted_on >= d)
            && self.to.is_none_or(|d| record.posted_on <= d)
            && self.search.as_deref().is_none_or(|needle| {
                let needle = needle.to_lowercase();
                [&record.description, &record.vendor, &record.cost_code]
                    .into_iter()
                    .flatten()
                    .any(|field| field.to_lowercase().contains(&needle))
            })
    }

    /// Key for caching a result computed from this filter on `as_of`.
    pub fn cache_key(&self, as_of: NaiveDate) -> (NaiveDate, CostFilter) {
        (as_of, self.clone())
    }
}

/// Filters `records` and totals them per value of `dimension`, largest first.
pub fn rollup(
    records: &[CostRecord],
    filter: &CostFilter,
    dimension: Dimension,
) -> Vec<AggregationRow> {
    let selected: Vec<&CostRecord> = records.iter().filter(|r| filter.matches(r)).collect();
    let rows: Vec<AggregationRow> = group_and_total(&selected, |r| dimension.key(r), |r| r.amount)
        .iter()
        .map(|g| g.to_row())
        .collect();

    tracing::info!(
        %dimension,
        matched = selected.len(),
        of = records.len(),
        groups = rows.len(),
        "Cost rollup computed."
    );
    rows
}
