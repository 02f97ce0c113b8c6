use core_types::Project;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Earned value figures for a single project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarnedValue {
    pub revised_contract: Decimal,
    pub earned_revenue: Decimal,
    /// `None` while no cost has been posted; callers treat it as insufficient data.
    pub cpi: Option<Decimal>,
    /// Positive is favorable.
    pub cost_variance: Decimal,
}

impl EarnedValue {
    pub fn is_over_budget(&self) -> bool {
        self.cost_variance.is_sign_negative() && !self.cost_variance.is_zero()
    }
}

/// Computes the earned value metrics of `project`.
///
/// Pure: no clock reads, identical inputs give identical outputs.
pub fn evaluate(project: &Project) -> EarnedValue {
    let revised_contract = project.revised_contract();
    let earned_revenue = earned_revenue(revised_contract, project.percent_complete);
    EarnedValue {
        revised_contract,
        earned_revenue,
        cpi: cpi(earned_revenue, project.costs_to_date),
        cost_variance: earned_revenue - project.costs_to_date,
    }
}

pub fn earned_revenue(revised_contract: Decimal, percent_complete: Decimal) -> Decimal {
    revised_contract * percent_complete / dec!(100)
}

/// `earned / costs`, undefined when nothing has been spent or the ratio is out of range.
pub fn cpi(earned_revenue: Decimal, costs_to_date: Decimal) -> Option<Decimal> {
    if costs_to_date > Decimal::ZERO {
        earned_revenue.checked_div(costs_to_date)
    } else {
        None
    }
}
