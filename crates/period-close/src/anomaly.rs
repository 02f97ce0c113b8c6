use crate::pnl::PnlRollup;
use crate::workflow::PeriodClose;
use configuration::CloseSettings;
use core_types::{ClosedPeriod, CostRecord, PeriodLedgerLine, PeriodStatus};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Headline figures of one period, as shown on the close history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub period_id: String,
    pub status: PeriodStatus,
    pub revenue: Decimal,
    pub expense: Decimal,
    pub net: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomaly: Option<String>,
}

impl From<&ClosedPeriod> for PeriodSummary {
    fn from(period: &ClosedPeriod) -> Self {
        Self {
            period_id: period.period_id.clone(),
            status: PeriodStatus::Locked,
            revenue: period.revenue,
            expense: period.expense,
            net: period.revenue - period.expense,
            anomaly: None,
        }
    }
}

/// Flags periods whose revenue falls well below the recent trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnomalyCheck {
    /// How many prior locked periods are averaged.
    pub window: usize,
    /// Fraction below the average that triggers a note.
    pub threshold: Decimal,
}

impl From<&CloseSettings> for AnomalyCheck {
    fn from(settings: &CloseSettings) -> Self {
        Self {
            window: settings.anomaly_window,
            threshold: settings.anomaly_threshold,
        }
    }
}

impl AnomalyCheck {
    /// Returns `periods` (oldest first) with an anomaly note on each locked period whose revenue
    /// is more than `threshold` below the average of the `window` locked periods before it.
    ///
    /// Advisory only. Periods with fewer than `window` locked predecessors are left alone, and
    /// periods that are not locked neither get a note nor count toward later averages.
    pub fn annotate(&self, periods: &[PeriodSummary]) -> Vec<PeriodSummary> {
        let mut trailing: Vec<Decimal> = Vec::with_capacity(periods.len());
        let mut annotated = Vec::with_capacity(periods.len());

        for period in periods {
            let mut period = period.clone();
            if period.status != PeriodStatus::Locked {
                annotated.push(period);
                continue;
            }

            if self.window > 0 && trailing.len() >= self.window {
                let recent = &trailing[trailing.len() - self.window..];
                let average = recent.iter().copied().sum::<Decimal>() / Decimal::from(self.window);
                if let Some(note) = self.note(period.revenue, average) {
                    tracing::warn!(period = %period.period_id, %note, "Revenue anomaly detected.");
                    period.anomaly = Some(note);
                }
            }
            trailing.push(period.revenue);
            annotated.push(period);
        }
        annotated
    }

    fn note(&self, revenue: Decimal, average: Decimal) -> Option<String> {
        if average <= Decimal::ZERO {
            return None;
        }
        let shortfall = (average - revenue).checked_div(average)?;
        if shortfall > self.threshold {
            Some(format!(
                "Revenue {} is {}% below the trailing {}-period average of {}",
                revenue.round_dp(2),
                (shortfall * dec!(100)).round_dp(1),
                self.window,
                average.round_dp(2),
            ))
        } else {
            None
        }
    }
}

/// Builds the close history, oldest first.
///
/// Locked periods come from `closed`. Each replayed period missing from `closed` is summarised
/// from its ledger lines and the costs posted in its month, with its current status.
pub fn close_history(
    closed: &[ClosedPeriod],
    periods: &[PeriodClose],
    ledger: &[PeriodLedgerLine],
    costs: &[CostRecord],
) -> Vec<PeriodSummary> {
    let mut history: Vec<PeriodSummary> = closed.iter().map(PeriodSummary::from).collect();
    for period in periods {
        if history.iter().any(|h| h.period_id == period.period_id) {
            continue;
        }
        let pnl = PnlRollup::for_period(&period.period_id, ledger, costs);
        history.push(pnl.summary(period.status));
    }
    history.sort_by(|a, b| a.period_id.cmp(&b.period_id));
    history
}

/// Copies each anomaly note in `history` onto the period with the same id.
pub fn attach_notes(periods: &mut [PeriodClose], history: &[PeriodSummary]) {
    for summary in history {
        let Some(note) = &summary.anomaly else {
            continue;
        };
        if let Some(period) = periods.iter_mut().find(|p| p.period_id == summary.period_id) {
            period.attach_anomaly(note.clone());
        }
    }
}
