use crate::earned_value::{self, EarnedValue};
use crate::profit_fade::{self, FadeClassification, Severity};
use crate::report::FadeRow;
use crate::wip::{self, WipLine, WipTotals};
use chrono::NaiveDate;
use configuration::FadeThresholds;
use core_types::{BillingRecord, MarginSnapshot, Project};
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Stateless calculator that evaluates a whole portfolio in one pass.
#[derive(Debug, Clone, Default)]
pub struct JobCostEngine {
    thresholds: FadeThresholds,
}

/// Everything computed for a single project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectEvaluation {
    pub project_id: String,
    pub earned_value: EarnedValue,
    pub wip: WipLine,
    /// The latest recorded snapshot, or one derived from current figures.
    pub snapshot: MarginSnapshot,
    pub snapshot_derived: bool,
    pub classification: FadeClassification,
    pub fade: FadeRow,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioEvaluation {
    pub as_of: NaiveDate,
    /// Project id order.
    pub projects: Vec<ProjectEvaluation>,
    pub wip_totals: WipTotals,
}

impl PortfolioEvaluation {
    /// Dashboard rows, most severe first.
    pub fn fade_rows(&self) -> Vec<FadeRow> {
        let mut rows: Vec<FadeRow> = self.projects.iter().map(|p| p.fade.clone()).collect();
        profit_fade::sort_dashboard(&mut rows);
        rows
    }

    pub fn severity_counts(&self) -> BTreeMap<Severity, usize> {
        let mut counts = BTreeMap::new();
        for p in &self.projects {
            *counts.entry(p.classification.severity).or_insert(0) += 1;
        }
        counts
    }

    /// Sum of the under-billed amounts; over-billed projects contribute nothing.
    pub fn total_unbilled(&self) -> Decimal {
        self.projects.iter().map(|p| p.fade.unbilled).sum()
    }
}

impl JobCostEngine {
    pub fn new(thresholds: FadeThresholds) -> Self {
        Self { thresholds }
    }

    /// Evaluates every active project as of `as_of`. Snapshots dated after `as_of` are ignored.
    ///
    /// Projects are independent and are evaluated on the rayon pool. The WIP roll-up runs only
    /// after every project has been collected.
    pub fn evaluate_portfolio(
        &self,
        projects: &[Project],
        billing: &[BillingRecord],
        snapshots: &[MarginSnapshot],
        as_of: NaiveDate,
    ) -> PortfolioEvaluation {
        let mut billed: HashMap<&str, Decimal> = HashMap::new();
        for record in billing {
            *billed.entry(record.project_id.as_str()).or_default() += record.this_period;
        }

        let latest = profit_fade::latest_snapshots(snapshots, as_of);

        let mut evaluations: Vec<ProjectEvaluation> = projects
            .par_iter()
            .filter(|p| p.is_active())
            .map(|project| {
                let billed_to_date = billed.get(project.id.as_str()).copied().unwrap_or_default();
                let recorded = latest.get(project.id.as_str()).copied();
                self.evaluate_project(project, billed_to_date, recorded, as_of)
            })
            .collect();
        evaluations.sort_by(|a, b| a.project_id.cmp(&b.project_id));

        let lines: Vec<WipLine> = evaluations.iter().map(|e| e.wip.clone()).collect();
        let wip_totals = wip::roll_up(&lines);

        tracing::info!(
            projects = evaluations.len(),
            earned = %wip_totals.earned_revenue,
            under_over_billed = %wip_totals.under_over_billed,
            "Portfolio evaluated."
        );

        PortfolioEvaluation {
            as_of,
            projects: evaluations,
            wip_totals,
        }
    }

    fn evaluate_project(
        &self,
        project: &Project,
        billed_to_date: Decimal,
        recorded: Option<&MarginSnapshot>,
        as_of: NaiveDate,
    ) -> ProjectEvaluation {
        let ev = earned_value::evaluate(project);
        let line = wip::wip_line_from(project, &ev, billed_to_date);
        let (snapshot, snapshot_derived) = match recorded {
            Some(s) => (s.clone(), false),
            None => (profit_fade::derive_snapshot(project, as_of), true),
        };
        let fade = profit_fade::fade_row(project, &snapshot, &line, &self.thresholds);
        let classification = FadeClassification {
            fade_percent: fade.fade_percent,
            severity: fade.severity,
        };

        ProjectEvaluation {
            project_id: project.id.clone(),
            earned_value: ev,
            wip: line,
            snapshot,
            snapshot_derived,
            classification,
            fade,
        }
    }
}

/// The profit fade dashboard of the active projects, most severe first.
pub fn fade_dashboard(
    projects: &[Project],
    snapshots: &[MarginSnapshot],
    billing: &[BillingRecord],
    thresholds: &FadeThresholds,
    as_of: NaiveDate,
) -> Vec<FadeRow> {
    JobCostEngine::new(thresholds.clone())
        .evaluate_portfolio(projects, billing, snapshots, as_of)
        .fade_rows()
}
