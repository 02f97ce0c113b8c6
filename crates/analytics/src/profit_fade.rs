use crate::aggregation::{group_and_total, percent_of};
use crate::costs::UNASSIGNED;
use crate::earned_value;
use crate::report::FadeRow;
use crate::wip::{self, WipLine};
use chrono::NaiveDate;
use configuration::FadeThresholds;
use core_types::{CostCodeBudget, CostRecord, MarginSnapshot, Project};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Margin erosion tier. Variants are declared in rank order so the derived `Ord` matches
/// [`Severity::rank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Watch,
    Warning,
    Critical,
}

impl Severity {
    pub fn rank(&self) -> u8 {
        match self {
            Severity::None => 0,
            Severity::Watch => 1,
            Severity::Warning => 2,
            Severity::Critical => 3,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::None => "none",
            Severity::Watch => "watch",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FadeClassification {
    pub fade_percent: Option<Decimal>,
    pub severity: Severity,
}

/// `original - projected`; `None` until a projected margin exists.
pub fn fade_percent(snapshot: &MarginSnapshot) -> Option<Decimal> {
    snapshot
        .projected_margin_pct
        .map(|projected| snapshot.original_margin_pct - projected)
}

/// Classifies a single snapshot.
pub fn classify(snapshot: &MarginSnapshot, thresholds: &FadeThresholds) -> FadeClassification {
    let fade_percent = fade_percent(snapshot);
    let severity = classify_values(fade_percent, snapshot.cpi, thresholds);
    tracing::debug!(
        project = %snapshot.project_id,
        as_of = %snapshot.as_of,
        ?fade_percent,
        %severity,
        "Snapshot classified."
    );
    FadeClassification {
        fade_percent,
        severity,
    }
}

/// First matching tier wins, checked from critical down.
///
/// A snapshot that is not yet forecastable (`fade_percent` is `None`) is never scored, whatever its
/// CPI. A `None` CPI only disables the CPI clauses.
pub fn classify_values(
    fade_percent: Option<Decimal>,
    cpi: Option<Decimal>,
    thresholds: &FadeThresholds,
) -> Severity {
    let Some(fade) = fade_percent else {
        return Severity::None;
    };
    let cpi_below = |limit: Decimal| cpi.is_some_and(|c| c < limit);

    if fade > thresholds.critical_fade_pct || cpi_below(thresholds.critical_cpi) {
        Severity::Critical
    } else if fade > thresholds.warning_fade_pct || cpi_below(thresholds.warning_cpi) {
        Severity::Warning
    } else if fade > thresholds.watch_fade_pct {
        Severity::Watch
    } else {
        Severity::None
    }
}

/// The snapshots of `project_id`, oldest first. Snapshots sharing a date keep their input order.
pub fn trend<'a>(project_id: &str, snapshots: &'a [MarginSnapshot]) -> Vec<&'a MarginSnapshot> {
    let mut series: Vec<&MarginSnapshot> = snapshots
        .iter()
        .filter(|s| s.project_id == project_id)
        .collect();
    series.sort_by_key(|s| s.as_of);
    series
}

/// The most recent snapshot of each project dated on or before `as_of`. Among snapshots sharing
/// a date the later input wins.
pub fn latest_snapshots(
    snapshots: &[MarginSnapshot],
    as_of: NaiveDate,
) -> HashMap<&str, &MarginSnapshot> {
    let mut latest: HashMap<&str, &MarginSnapshot> = HashMap::new();
    for snapshot in snapshots.iter().filter(|s| s.as_of <= as_of) {
        let slot = latest.entry(snapshot.project_id.as_str()).or_insert(snapshot);
        if snapshot.as_of >= slot.as_of {
            *slot = snapshot;
        }
    }
    latest
}

/// Builds a snapshot from the project's current figures.
pub fn derive_snapshot(project: &Project, as_of: NaiveDate) -> MarginSnapshot {
    let ev = earned_value::evaluate(project);
    let current_margin_pct =
        percent_of(ev.earned_revenue - project.costs_to_date, ev.earned_revenue);
    let projected_margin_pct =
        wip::estimated_cost_at_completion(project.costs_to_date, project.percent_complete)
            .and_then(|eac| percent_of(ev.revised_contract - eac, ev.revised_contract));

    MarginSnapshot {
        project_id: project.id.clone(),
        as_of,
        original_margin_pct: project.budgeted_margin_pct,
        current_margin_pct,
        projected_margin_pct,
        cpi: ev.cpi,
    }
}

/// Builds the dashboard row for `project` from its snapshot and WIP line.
pub fn fade_row(
    project: &Project,
    snapshot: &MarginSnapshot,
    line: &WipLine,
    thresholds: &FadeThresholds,
) -> FadeRow {
    let classification = classify(snapshot, thresholds);
    FadeRow {
        project_id: project.id.clone(),
        project: project.name.clone(),
        severity: classification.severity,
        cpi: snapshot.cpi.map(|c| c.round_dp(6)),
        margin_original: snapshot.original_margin_pct,
        margin_current: snapshot.current_margin_pct,
        margin_projected: snapshot.projected_margin_pct,
        fade_percent: classification.fade_percent,
        unbilled: line.unbilled(),
    }
}

/// Severity rank descending, then fade descending with unknown fades last, then project id.
pub fn sort_dashboard(rows: &mut [FadeRow]) {
    rows.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| match (a.fade_percent, b.fade_percent) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| a.project_id.cmp(&b.project_id))
    });
}

/// Budget versus actual for one cost code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FadeDriver {
    pub cost_code: String,
    pub description: Option<String>,
    pub budget: Decimal,
    pub actual: Decimal,
    /// `budget - actual`; negative is an overrun.
    pub variance: Decimal,
    /// `None` when the code has no budget.
    pub overage_pct: Option<Decimal>,
}

/// Joins the cost-code budgets of `project_id` to its posted costs, worst overrun first.
///
/// Codes with spend but no budget are reported with a zero budget.
pub fn fade_drivers(
    project_id: &str,
    budgets: &[CostCodeBudget],
    costs: &[CostRecord],
) -> Vec<FadeDriver> {
    let project_costs: Vec<&CostRecord> = costs
        .iter()
        .filter(|c| c.project_id.as_deref() == Some(project_id))
        .collect();
    let actuals = group_and_total(
        &project_costs,
        |c| c.cost_code.clone().unwrap_or_else(|| UNASSIGNED.to_string()),
        |c| c.amount,
    );

    let mut joined: BTreeMap<String, (Option<String>, Decimal, Decimal)> = BTreeMap::new();
    for budget in budgets.iter().filter(|b| b.project_id == project_id) {
        let entry = joined
            .entry(budget.cost_code.clone())
            .or_insert_with(|| (budget.description.clone(), Decimal::ZERO, Decimal::ZERO));
        entry.1 += budget.budget;
    }
    for group in actuals {
        joined.entry(group.key).or_insert((None, Decimal::ZERO, Decimal::ZERO)).2 = group.total;
    }

    let mut drivers: Vec<FadeDriver> = joined
        .into_iter()
        .map(|(cost_code, (description, budget, actual))| FadeDriver {
            cost_code,
            description,
            budget,
            actual,
            variance: budget - actual,
            overage_pct: percent_of(actual - budget, budget),
        })
        .collect();
    drivers.sort_by(|a, b| a.variance.cmp(&b.variance));
    drivers
}
