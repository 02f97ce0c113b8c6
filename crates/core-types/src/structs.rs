use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::enums::{CloseAction, CostCategory, LedgerSection, ReceivableStatus};
use crate::error::CoreError;

/// Largest magnitude accepted for any amount or percentage. Sums and products of accepted
/// values stay far inside `Decimal`'s range.
pub const AMOUNT_LIMIT: Decimal = dec!(1000000000000000);

fn within_limit(field: &'static str, value: Decimal) -> Result<(), CoreError> {
    if value.abs() > AMOUNT_LIMIT {
        return Err(CoreError::invalid(
            field,
            format!("magnitude exceeds {AMOUNT_LIMIT} (got {value})"),
        ));
    }
    Ok(())
}

fn non_negative(field: &'static str, value: Decimal) -> Result<(), CoreError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(CoreError::invalid(field, format!("must not be negative (got {value})")));
    }
    within_limit(field, value)
}

fn not_blank(field: &'static str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::MissingField(field));
    }
    Ok(())
}

/// A contract in the portfolio, as of the latest cost posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub original_contract: Decimal,
    /// Approved change-order total.
    #[serde(default)]
    pub change_orders: Decimal,
    /// 0 to 100.
    pub percent_complete: Decimal,
    pub costs_to_date: Decimal,
    pub budgeted_margin_pct: Decimal,
    /// Archived projects are excluded from portfolio roll-ups.
    #[serde(default)]
    pub archived: bool,
}

impl Project {
    pub fn validate(&self) -> Result<(), CoreError> {
        not_blank("id", &self.id)?;
        non_negative("original_contract", self.original_contract)?;
        non_negative("change_orders", self.change_orders)?;
        non_negative("costs_to_date", self.costs_to_date)?;
        within_limit("budgeted_margin_pct", self.budgeted_margin_pct)?;
        if self.percent_complete < Decimal::ZERO || self.percent_complete > Decimal::ONE_HUNDRED {
            return Err(CoreError::invalid(
                "percent_complete",
                format!("must be within [0, 100] (got {})", self.percent_complete),
            ));
        }
        Ok(())
    }

    /// Original contract plus approved change orders.
    pub fn revised_contract(&self) -> Decimal {
        self.original_contract + self.change_orders
    }

    pub fn is_active(&self) -> bool {
        !self.archived
    }
}

/// A posted job cost. Immutable once posted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    pub id: String,
    /// `None` when the feed could not assign the cost to a project.
    pub project_id: Option<String>,
    pub cost_code: Option<String>,
    pub vendor: Option<String>,
    pub amount: Decimal,
    pub posted_on: NaiveDate,
    pub category: CostCategory,
    #[serde(default)]
    pub description: Option<String>,
}

impl CostRecord {
    pub fn validate(&self) -> Result<(), CoreError> {
        not_blank("id", &self.id)?;
        non_negative("amount", self.amount)
    }
}

/// One line of a draw / pay application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingRecord {
    pub id: String,
    pub project_id: String,
    pub scheduled_value: Decimal,
    #[serde(default)]
    pub previously_billed: Decimal,
    pub this_period: Decimal,
    #[serde(default)]
    pub balance_to_bill: Decimal,
    #[serde(default)]
    pub billed_on: Option<NaiveDate>,
}

impl BillingRecord {
    pub fn validate(&self) -> Result<(), CoreError> {
        not_blank("id", &self.id)?;
        not_blank("project_id", &self.project_id)?;
        non_negative("scheduled_value", self.scheduled_value)?;
        non_negative("previously_billed", self.previously_billed)?;
        non_negative("this_period", self.this_period)?;
        non_negative("balance_to_bill", self.balance_to_bill)
    }
}

/// An issued invoice awaiting (or having received) payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivableRecord {
    pub id: String,
    pub client: String,
    pub project_id: Option<String>,
    pub invoice_amount: Decimal,
    /// Remaining balance; decreases only through recorded payments.
    pub balance: Decimal,
    pub issued_on: NaiveDate,
    pub due_on: Option<NaiveDate>,
    pub status: ReceivableStatus,
}

impl ReceivableRecord {
    pub fn validate(&self) -> Result<(), CoreError> {
        not_blank("id", &self.id)?;
        non_negative("invoice_amount", self.invoice_amount)?;
        non_negative("balance", self.balance)?;
        if self.balance > self.invoice_amount {
            return Err(CoreError::invalid(
                "balance",
                format!(
                    "remaining balance {} exceeds invoice amount {}",
                    self.balance, self.invoice_amount
                ),
            ));
        }
        if let Some(due) = self.due_on {
            if due < self.issued_on {
                return Err(CoreError::invalid(
                    "due_on",
                    format!("due date {due} precedes issue date {}", self.issued_on),
                ));
            }
        }
        Ok(())
    }

    /// The date aging is measured from: the due date, or the issue date when none was supplied.
    pub fn aging_date(&self) -> NaiveDate {
        self.due_on.unwrap_or(self.issued_on)
    }

    /// Effective status on `as_of`: zero balance reads as paid, a sent invoice past due as overdue.
    pub fn status_as_of(&self, as_of: NaiveDate) -> ReceivableStatus {
        if self.balance.is_zero() {
            return ReceivableStatus::Paid;
        }
        match (self.status, self.due_on) {
            (ReceivableStatus::Sent, Some(due)) if as_of > due => ReceivableStatus::Overdue,
            (status, _) => status,
        }
    }
}

/// Per-period margin health record. One per project per reporting period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginSnapshot {
    pub project_id: String,
    pub as_of: NaiveDate,
    pub original_margin_pct: Decimal,
    pub current_margin_pct: Option<Decimal>,
    /// `None` means not yet forecastable.
    pub projected_margin_pct: Option<Decimal>,
    pub cpi: Option<Decimal>,
}

impl MarginSnapshot {
    pub fn validate(&self) -> Result<(), CoreError> {
        not_blank("project_id", &self.project_id)?;
        within_limit("original_margin_pct", self.original_margin_pct)?;
        if let Some(current) = self.current_margin_pct {
            within_limit("current_margin_pct", current)?;
        }
        if let Some(projected) = self.projected_margin_pct {
            within_limit("projected_margin_pct", projected)?;
        }
        if let Some(cpi) = self.cpi {
            non_negative("cpi", cpi)?;
        }
        Ok(())
    }
}

/// Budgeted amount for one cost code of one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostCodeBudget {
    pub project_id: String,
    pub cost_code: String,
    #[serde(default)]
    pub description: Option<String>,
    pub budget: Decimal,
}

impl CostCodeBudget {
    pub fn validate(&self) -> Result<(), CoreError> {
        not_blank("project_id", &self.project_id)?;
        not_blank("cost_code", &self.cost_code)?;
        non_negative("budget", self.budget)
    }
}

/// A planned inflow/outflow for a forecast week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashForecastLine {
    pub week_starting: NaiveDate,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub amount_in: Decimal,
    #[serde(default)]
    pub amount_out: Decimal,
}

impl CashForecastLine {
    pub fn validate(&self) -> Result<(), CoreError> {
        non_negative("amount_in", self.amount_in)?;
        non_negative("amount_out", self.amount_out)
    }
}

/// A manual P&L line for a period (revenue recognized, accruals, overhead not in the cost feed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodLedgerLine {
    pub period_id: String,
    pub section: LedgerSection,
    pub label: String,
    pub amount: Decimal,
}

impl PeriodLedgerLine {
    pub fn validate(&self) -> Result<(), CoreError> {
        not_blank("period_id", &self.period_id)?;
        not_blank("label", &self.label)?;
        non_negative("amount", self.amount)
    }
}

/// Revenue and expense totals of a period that has already been closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedPeriod {
    pub period_id: String,
    pub revenue: Decimal,
    pub expense: Decimal,
}

impl ClosedPeriod {
    pub fn validate(&self) -> Result<(), CoreError> {
        not_blank("period_id", &self.period_id)?;
        non_negative("revenue", self.revenue)?;
        non_negative("expense", self.expense)
    }
}

/// A recorded action against a close step, replayed in order to rebuild the workflow state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseEvent {
    pub period_id: String,
    pub ordinal: usize,
    pub action: CloseAction,
    pub by: String,
    pub at: NaiveDateTime,
}

impl CloseEvent {
    pub fn validate(&self) -> Result<(), CoreError> {
        not_blank("period_id", &self.period_id)?;
        not_blank("by", &self.by)?;
        if self.ordinal == 0 {
            return Err(CoreError::invalid("ordinal", "step ordinals start at 1"));
        }
        Ok(())
    }
}
