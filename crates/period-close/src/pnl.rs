use crate::anomaly::PeriodSummary;
use analytics::{group_and_total, percent_of};
use core_types::{CostCategory, CostRecord, LedgerSection, PeriodLedgerLine, PeriodStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PnlLine {
    pub label: String,
    pub amount: Decimal,
}

/// Profit and loss of one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnlRollup {
    pub period_id: String,
    pub revenue: Vec<PnlLine>,
    pub direct_costs: Vec<PnlLine>,
    pub overhead: Vec<PnlLine>,
    pub total_revenue: Decimal,
    pub total_direct_costs: Decimal,
    pub total_overhead: Decimal,
    pub gross_profit: Decimal,
    pub net_income: Decimal,
    /// `None` when the period has no revenue.
    pub gross_margin_pct: Option<Decimal>,
}

impl PnlRollup {
    /// Builds the P&L of `period_id`.
    ///
    /// `costs` are the cost records posted in the period; direct categories are totalled one line
    /// per category and overhead-category costs land in overhead. Ledger lines of other periods are
    /// ignored.
    pub fn build(period_id: &str, ledger: &[PeriodLedgerLine], costs: &[CostRecord]) -> Self {
        let lines_in = |section: LedgerSection| -> Vec<PnlLine> {
            ledger
                .iter()
                .filter(|l| l.period_id == period_id && l.section == section)
                .map(|l| PnlLine {
                    label: l.label.clone(),
                    amount: l.amount,
                })
                .collect()
        };

        let revenue = lines_in(LedgerSection::Revenue);

        let mut direct_costs: Vec<PnlLine> = group_and_total(costs, |c| c.category, |c| c.amount)
            .into_iter()
            .filter(|g| g.key.is_direct())
            .map(|g| PnlLine {
                label: category_label(g.key).to_string(),
                amount: g.total,
            })
            .collect();
        direct_costs.extend(lines_in(LedgerSection::DirectCost));

        let overhead_costs: Decimal = costs
            .iter()
            .filter(|c| !c.category.is_direct())
            .map(|c| c.amount)
            .sum();
        let mut overhead = Vec::new();
        if !overhead_costs.is_zero() {
            overhead.push(PnlLine {
                label: category_label(CostCategory::Overhead).to_string(),
                amount: overhead_costs,
            });
        }
        overhead.extend(lines_in(LedgerSection::Overhead));

        let total = |lines: &[PnlLine]| lines.iter().map(|l| l.amount).sum::<Decimal>();
        let total_revenue = total(&revenue);
        let total_direct_costs = total(&direct_costs);
        let total_overhead = total(&overhead);
        let gross_profit = total_revenue - total_direct_costs;
        let net_income = gross_profit - total_overhead;
        let gross_margin_pct = percent_of(gross_profit, total_revenue);

        tracing::info!(
            period = period_id,
            revenue = %total_revenue,
            net_income = %net_income,
            "Period P&L rolled up."
        );

        Self {
            period_id: period_id.to_string(),
            revenue,
            direct_costs,
            overhead,
            total_revenue,
            total_direct_costs,
            total_overhead,
            gross_profit,
            net_income,
            gross_margin_pct,
        }
    }

    /// Builds the P&L of `period_id` (`YYYY-MM`) from every cost posted in that month.
    pub fn for_period(period_id: &str, ledger: &[PeriodLedgerLine], costs: &[CostRecord]) -> Self {
        let posted: Vec<CostRecord> = costs
            .iter()
            .filter(|c| c.posted_on.format("%Y-%m").to_string() == period_id)
            .cloned()
            .collect();
        Self::build(period_id, ledger, &posted)
    }

    pub fn total_expense(&self) -> Decimal {
        self.total_direct_costs + self.total_overhead
    }

    pub fn summary(&self, status: PeriodStatus) -> PeriodSummary {
        PeriodSummary {
            period_id: self.period_id.clone(),
            status,
            revenue: self.total_revenue,
            expense: self.total_expense(),
            net: self.net_income,
            anomaly: None,
        }
    }
}

fn category_label(category: CostCategory) -> &'static str {
    match category {
        CostCategory::Material => "Materials",
        CostCategory::Labor => "Direct Labor",
        CostCategory::Subcontract => "Subcontractors",
        CostCategory::Equipment => "Equipment",
        CostCategory::Overhead => "Overhead Costs",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn ledger(
        period: &str,
        section: LedgerSection,
        label: &str,
        amount: Decimal,
    ) -> PeriodLedgerLine {
        PeriodLedgerLine {
            period_id: period.to_string(),
            section,
            label: label.to_string(),
            amount,
        }
    }

    fn cost(category: CostCategory, amount: Decimal) -> CostRecord {
        CostRecord {
            id: format!("{category}-{amount}"),
            project_id: Some("PRJ-1".to_string()),
            cost_code: None,
            vendor: None,
            amount,
            posted_on: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            category,
            description: None,
        }
    }

    #[test]
    fn rolls_up_revenue_costs_and_overhead() {
        let lines = vec![
            ledger("2026-01", LedgerSection::Revenue, "Contract Revenue", dec!(400000)),
            ledger("2026-01", LedgerSection::Revenue, "Change Orders", dec!(20000)),
            ledger("2026-01", LedgerSection::DirectCost, "Permits", dec!(5000)),
            ledger("2026-01", LedgerSection::Overhead, "Office Rent", dec!(8000)),
            ledger("2025-12", LedgerSection::Revenue, "Contract Revenue", dec!(999999)),
        ];
        let costs = vec![
            cost(CostCategory::Subcontract, dec!(150000)),
            cost(CostCategory::Material, dec!(90000)),
            cost(CostCategory::Labor, dec!(60000)),
            cost(CostCategory::Material, dec!(10000)),
            cost(CostCategory::Overhead, dec!(12000)),
        ];

        let pnl = PnlRollup::build("2026-01", &lines, &costs);
        assert_eq!(pnl.total_revenue, dec!(420000));
        assert_eq!(pnl.direct_costs[0].label, "Subcontractors");
        assert_eq!(pnl.direct_costs[1].label, "Materials");
        assert_eq!(pnl.direct_costs[1].amount, dec!(100000));
        assert_eq!(pnl.direct_costs.last().unwrap().label, "Permits");
        assert_eq!(pnl.total_direct_costs, dec!(315000));
        assert_eq!(pnl.total_overhead, dec!(20000));
        assert_eq!(pnl.gross_profit, dec!(105000));
        assert_eq!(pnl.net_income, dec!(85000));
        assert_eq!(pnl.gross_margin_pct, Some(dec!(25)));

        let summary = pnl.summary(PeriodStatus::Locked);
        assert_eq!(summary.expense, dec!(335000));
        assert_eq!(summary.net, dec!(85000));
    }

    #[test]
    fn period_rollup_only_takes_costs_posted_that_month() {
        let lines = vec![ledger("2026-01", LedgerSection::Revenue, "Contract Revenue", dec!(1000))];
        let mut december = cost(CostCategory::Labor, dec!(300));
        december.posted_on = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        let costs = vec![cost(CostCategory::Labor, dec!(400)), december];

        let pnl = PnlRollup::for_period("2026-01", &lines, &costs);
        assert_eq!(pnl.total_direct_costs, dec!(400));
        assert_eq!(pnl.gross_margin_pct, Some(dec!(60)));
    }

    #[test]
    fn margin_on_a_vanishing_revenue_is_undefined() {
        let lines = vec![ledger(
            "2026-01",
            LedgerSection::Revenue,
            "Contract Revenue",
            dec!(0.0000000000000000000000001),
        )];
        let costs = vec![cost(CostCategory::Labor, dec!(900000000000000))];
        let pnl = PnlRollup::build("2026-01", &lines, &costs);
        assert_eq!(pnl.gross_margin_pct, None);
    }

    #[test]
    fn margin_is_undefined_without_revenue() {
        let pnl = PnlRollup::build("2026-01", &[], &[cost(CostCategory::Labor, dec!(100))]);
        assert_eq!(pnl.gross_margin_pct, None);
        assert_eq!(pnl.net_income, dec!(-100));
    }
}
