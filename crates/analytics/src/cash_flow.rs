use crate::error::AnalyticsError;
use chrono::NaiveDate;
use core_types::CashForecastLine;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Forecast scenario. Inflows are scaled by the multiplier, outflows by `2 - multiplier`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    #[default]
    Expected,
    Best,
    Worst,
}

impl Scenario {
    pub fn multiplier(&self) -> Decimal {
        match self {
            Scenario::Expected => Decimal::ONE,
            Scenario::Best => dec!(1.15),
            Scenario::Worst => dec!(0.75),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scenario::Expected => "expected",
            Scenario::Best => "best",
            Scenario::Worst => "worst",
        };
        f.write_str(s)
    }
}

impl FromStr for Scenario {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "expected" | "base" => Ok(Scenario::Expected),
            "best" => Ok(Scenario::Best),
            "worst" => Ok(Scenario::Worst),
            other => Err(AnalyticsError::InvalidArgument(format!(
                "unknown scenario '{other}' (expected, best or worst)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastWeek {
    pub week_starting: NaiveDate,
    pub inflow: Decimal,
    pub outflow: Decimal,
    pub net: Decimal,
    pub starting_cash: Decimal,
    pub ending_cash: Decimal,
}

/// Scales each week's flows for `scenario` and carries the balance forward.
///
/// Lines sharing a `week_starting` are summed. Only the first `horizon` weeks are kept.
pub fn forecast(
    lines: &[CashForecastLine],
    starting_cash: Decimal,
    scenario: Scenario,
    horizon: usize,
) -> Result<Vec<ForecastWeek>, AnalyticsError> {
    if lines.is_empty() {
        return Err(AnalyticsError::NotEnoughData(
            "no cash forecast lines".to_string(),
        ));
    }

    let mut weeks: BTreeMap<NaiveDate, (Decimal, Decimal)> = BTreeMap::new();
    for line in lines {
        let week = weeks.entry(line.week_starting).or_default();
        week.0 += line.amount_in;
        week.1 += line.amount_out;
    }

    let in_factor = scenario.multiplier();
    let out_factor = dec!(2) - in_factor;
    let flows: Vec<(NaiveDate, Decimal, Decimal)> = weeks
        .into_iter()
        .take(horizon)
        .map(|(week, (inflow, outflow))| (week, inflow * in_factor, outflow * out_factor))
        .collect();

    let forecast = running_balances(starting_cash, &flows);
    tracing::info!(%scenario, weeks = forecast.len(), "Cash forecast computed.");
    Ok(forecast)
}

/// `ending[i] = ending[i - 1] + net[i]`, with `starting[i] = ending[i - 1]`.
fn running_balances(
    opening: Decimal,
    flows: &[(NaiveDate, Decimal, Decimal)],
) -> Vec<ForecastWeek> {
    flows
        .iter()
        .scan(opening, |balance, &(week_starting, inflow, outflow)| {
            let starting_cash = *balance;
            let net = inflow - outflow;
            *balance += net;
            Some(ForecastWeek {
                week_starting,
                inflow,
                outflow,
                net,
                starting_cash,
                ending_cash: *balance,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Runway {
    pub current_cash: Decimal,
    pub min_threshold: Decimal,
    /// Week number (from 1) whose ending cash first drops below the threshold, or the horizon
    /// length.
    pub runway_weeks: usize,
    pub breach_week: Option<NaiveDate>,
    /// The breach falls within the alarm window.
    pub is_alarm: bool,
    pub lowest_projected: Decimal,
}

pub fn runway(forecast: &[ForecastWeek], min_threshold: Decimal, alarm_weeks: usize) -> Runway {
    let current_cash = forecast.first().map(|w| w.starting_cash).unwrap_or_default();
    let breach = forecast
        .iter()
        .position(|w| w.ending_cash < min_threshold);
    let runway_weeks = breach.map_or(forecast.len(), |i| i + 1);
    let is_alarm = breach.is_some() && runway_weeks <= alarm_weeks;
    let lowest_projected = forecast
        .iter()
        .map(|w| w.ending_cash)
        .min()
        .unwrap_or(current_cash);

    if is_alarm {
        tracing::warn!(
            runway_weeks,
            %lowest_projected,
            %min_threshold,
            "Cash runway below alarm window."
        );
    }

    Runway {
        current_cash,
        min_threshold,
        runway_weeks,
        breach_week: breach.map(|i| forecast[i].week_starting),
        is_alarm,
        lowest_projected,
    }
}
