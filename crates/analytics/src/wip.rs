use crate::aggregation::percent_of;
use crate::earned_value::{self, EarnedValue};
use core_types::{BillingRecord, Project};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Whether a project has invoiced ahead of or behind the work performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingPosition {
    /// Earned but not yet invoiced; carried as an asset.
    UnderBilled,
    /// Invoiced ahead of work; carried as a liability.
    OverBilled,
    Even,
}

/// One row of the WIP schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WipLine {
    pub project_id: String,
    pub project: String,
    pub revised_contract: Decimal,
    pub costs_to_date: Decimal,
    /// `None` when the project shows no progress yet.
    pub estimated_cost_at_completion: Option<Decimal>,
    pub percent_complete: Decimal,
    pub earned_revenue: Decimal,
    pub billed_to_date: Decimal,
    /// `billed_to_date - earned_revenue`; negative is under-billed.
    pub under_over_billed: Decimal,
}

impl WipLine {
    pub fn position(&self) -> BillingPosition {
        if self.under_over_billed.is_zero() {
            BillingPosition::Even
        } else if self.under_over_billed.is_sign_negative() {
            BillingPosition::UnderBilled
        } else {
            BillingPosition::OverBilled
        }
    }

    /// Revenue earned but not yet invoiced; zero when over-billed.
    pub fn unbilled(&self) -> Decimal {
        (-self.under_over_billed).max(Decimal::ZERO)
    }
}

/// `costs / (pct / 100)`, undefined at zero progress or when the extrapolation is out of range.
pub fn estimated_cost_at_completion(
    costs_to_date: Decimal,
    percent_complete: Decimal,
) -> Option<Decimal> {
    if percent_complete > Decimal::ZERO {
        costs_to_date.checked_mul(dec!(100))?.checked_div(percent_complete)
    } else {
        None
    }
}

/// Cumulative `this_period` over every draw submitted for `project_id`.
pub fn billed_to_date<'a, I>(project_id: &str, billing: I) -> Decimal
where
    I: IntoIterator<Item = &'a BillingRecord>,
{
    billing
        .into_iter()
        .filter(|b| b.project_id == project_id)
        .map(|b| b.this_period)
        .sum()
}

/// Builds the WIP line of `project` from its billing history. Records of other projects are
/// ignored.
pub fn wip_line(project: &Project, billing: &[BillingRecord]) -> WipLine {
    let ev = earned_value::evaluate(project);
    wip_line_from(project, &ev, billed_to_date(&project.id, billing))
}

pub(crate) fn wip_line_from(
    project: &Project,
    ev: &EarnedValue,
    billed_to_date: Decimal,
) -> WipLine {
    WipLine {
        project_id: project.id.clone(),
        project: project.name.clone(),
        revised_contract: ev.revised_contract,
        costs_to_date: project.costs_to_date,
        estimated_cost_at_completion: estimated_cost_at_completion(
            project.costs_to_date,
            project.percent_complete,
        ),
        percent_complete: project.percent_complete,
        earned_revenue: ev.earned_revenue,
        billed_to_date,
        under_over_billed: billed_to_date - ev.earned_revenue,
    }
}

/// Portfolio totals of a WIP schedule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WipTotals {
    pub projects: usize,
    pub revised_contract: Decimal,
    pub costs_to_date: Decimal,
    /// Sum over the lines that could be forecast.
    pub estimated_cost_at_completion: Decimal,
    /// Lines left out of `estimated_cost_at_completion`.
    pub unforecastable: usize,
    /// Earned-weighted: `Σearned / Σrevised * 100`.
    pub percent_complete: Decimal,
    pub earned_revenue: Decimal,
    pub billed_to_date: Decimal,
    /// Algebraic sum; under- and over-billings offset each other.
    pub under_over_billed: Decimal,
}

/// Sums every field across `lines`.
pub fn roll_up(lines: &[WipLine]) -> WipTotals {
    let mut totals = lines.iter().fold(WipTotals::default(), |mut acc, line| {
        acc.projects += 1;
        acc.revised_contract += line.revised_contract;
        acc.costs_to_date += line.costs_to_date;
        match line.estimated_cost_at_completion {
            Some(eac) => acc.estimated_cost_at_completion += eac,
            None => acc.unforecastable += 1,
        }
        acc.earned_revenue += line.earned_revenue;
        acc.billed_to_date += line.billed_to_date;
        acc.under_over_billed += line.under_over_billed;
        acc
    });

    totals.percent_complete =
        percent_of(totals.earned_revenue, totals.revised_contract).unwrap_or_default();
    totals
}

/// The WIP schedule of all active projects, in project id order.
pub fn wip_schedule(projects: &[Project], billing: &[BillingRecord]) -> Vec<WipLine> {
    let mut billed: HashMap<&str, Decimal> = HashMap::new();
    for record in billing {
        *billed.entry(record.project_id.as_str()).or_default() += record.this_period;
    }

    let mut lines: Vec<WipLine> = projects
        .iter()
        .filter(|p| p.is_active())
        .map(|p| {
            let ev = earned_value::evaluate(p);
            let billed = billed.get(p.id.as_str()).copied().unwrap_or_default();
            wip_line_from(p, &ev, billed)
        })
        .collect();
    lines.sort_by(|a, b| a.project_id.cmp(&b.project_id));

    tracing::info!(lines = lines.len(), "WIP schedule generated.");
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(id: &str, pct: Decimal, costs: Decimal) -> Project {
        Project {
            id: id.to_string(),
            name: format!("Project {id}"),
            original_contract: dec!(500000),
            change_orders: dec!(10000),
            percent_complete: pct,
            costs_to_date: costs,
            budgeted_margin_pct: dec!(18),
            archived: false,
        }
    }

    fn draw(id: &str, project_id: &str, this_period: Decimal) -> BillingRecord {
        BillingRecord {
            id: id.to_string(),
            project_id: project_id.to_string(),
            scheduled_value: dec!(510000),
            previously_billed: Decimal::ZERO,
            this_period,
            balance_to_bill: dec!(510000) - this_period,
            billed_on: None,
        }
    }

    #[test]
    fn billed_to_date_is_cumulative_across_draws() {
        let billing = vec![
            draw("D1", "X", dec!(120000)),
            draw("D2", "X", dec!(220000)),
            draw("D3", "Y", dec!(999999)),
        ];
        let line = wip_line(&project("X", dec!(70), dec!(280000)), &billing);
        assert_eq!(line.billed_to_date, dec!(340000));
        assert_eq!(line.under_over_billed, dec!(-17000));
        assert_eq!(line.position(), BillingPosition::UnderBilled);
        assert_eq!(line.unbilled(), dec!(17000));
    }

    #[test]
    fn eac_is_undefined_at_zero_progress() {
        let line = wip_line(&project("X", Decimal::ZERO, dec!(5000)), &[]);
        assert_eq!(line.estimated_cost_at_completion, None);
        assert_eq!(line.earned_revenue, Decimal::ZERO);
    }

    #[test]
    fn eac_is_undefined_when_progress_is_vanishingly_small() {
        let line = wip_line(&project("X", Decimal::new(1, 28), dec!(1000000000000000)), &[]);
        assert_eq!(line.estimated_cost_at_completion, None);
    }

    #[test]
    fn eac_extrapolates_costs() {
        let line = wip_line(&project("X", dec!(70), dec!(280000)), &[]);
        assert_eq!(line.estimated_cost_at_completion, Some(dec!(400000)));
    }

    #[test]
    fn over_billed_has_no_unbilled_amount() {
        let line = wip_line(
            &project("X", dec!(10), dec!(40000)),
            &[draw("D1", "X", dec!(60000))],
        );
        assert_eq!(line.under_over_billed, dec!(9000));
        assert_eq!(line.position(), BillingPosition::OverBilled);
        assert_eq!(line.unbilled(), Decimal::ZERO);
    }

    #[test]
    fn roll_up_is_algebraic_and_skips_archived_projects() {
        let mut archived = project("Z", dec!(50), dec!(1));
        archived.archived = true;
        let projects = vec![
            project("Y", dec!(10), dec!(40000)),
            project("X", dec!(70), dec!(280000)),
            project("W", Decimal::ZERO, Decimal::ZERO),
            archived,
        ];
        let billing = vec![
            draw("D1", "X", dec!(340000)),
            draw("D2", "Y", dec!(60000)),
        ];

        let lines = wip_schedule(&projects, &billing);
        let ids: Vec<_> = lines.iter().map(|l| l.project_id.as_str()).collect();
        assert_eq!(ids, vec!["W", "X", "Y"]);

        let totals = roll_up(&lines);
        assert_eq!(totals.projects, 3);
        assert_eq!(totals.under_over_billed, dec!(-17000) + dec!(9000));
        assert_eq!(totals.unforecastable, 1);
        assert_eq!(totals.estimated_cost_at_completion, dec!(400000) + dec!(400000));
        assert_eq!(totals.earned_revenue, dec!(357000) + dec!(51000));
        assert_eq!(
            totals.percent_complete,
            (dec!(408000) / dec!(1530000)) * dec!(100)
        );
    }

    #[test]
    fn empty_roll_up_is_zeroed() {
        assert_eq!(roll_up(&[]), WipTotals::default());
    }
}
