use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::error::ConfigError;

/// Largest cash figure accepted, matching the cap on ledger amounts.
const CASH_LIMIT: Decimal = dec!(1000000000000000);

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fade: FadeThresholds,
    pub close: CloseSettings,
    pub cash_flow: CashFlowSettings,
    pub logging: LoggingSettings,
    pub output: OutputSettings,
}

impl Config {
    /// Rejects threshold combinations that would make the severity tiers overlap.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fade.validate()?;
        self.close.validate()?;
        self.cash_flow.validate()
    }
}

/// Tier boundaries for the profit fade detector.
///
/// Fade percentages are margin points (original minus projected). A tier fires when the fade
/// is strictly greater than its boundary, or the CPI strictly below its CPI boundary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FadeThresholds {
    pub critical_fade_pct: Decimal,
    pub warning_fade_pct: Decimal,
    pub watch_fade_pct: Decimal,
    pub critical_cpi: Decimal,
    pub warning_cpi: Decimal,
}

impl Default for FadeThresholds {
    fn default() -> Self {
        Self {
            critical_fade_pct: dec!(10),
            warning_fade_pct: dec!(5),
            watch_fade_pct: dec!(2),
            critical_cpi: dec!(0.85),
            warning_cpi: dec!(0.90),
        }
    }
}

impl FadeThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.critical_fade_pct > self.warning_fade_pct
            && self.warning_fade_pct > self.watch_fade_pct
            && self.watch_fade_pct >= Decimal::ZERO)
        {
            return Err(ConfigError::ValidationError(format!(
                "fade thresholds must satisfy critical > warning > watch >= 0 (got {} / {} / {})",
                self.critical_fade_pct, self.warning_fade_pct, self.watch_fade_pct
            )));
        }
        if !(self.critical_cpi > Decimal::ZERO && self.critical_cpi <= self.warning_cpi) {
            return Err(ConfigError::ValidationError(format!(
                "cpi thresholds must satisfy 0 < critical <= warning (got {} / {})",
                self.critical_cpi, self.warning_cpi
            )));
        }
        Ok(())
    }
}

/// Period close workflow settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CloseSettings {
    /// Number of trailing closed periods the revenue anomaly check averages over.
    pub anomaly_window: usize,
    /// Fraction below the trailing average that triggers an anomaly note (0.40 = 40%).
    pub anomaly_threshold: Decimal,
    /// Ordered names of the close steps created when a period opens.
    pub steps: Vec<String>,
}

impl Default for CloseSettings {
    fn default() -> Self {
        Self {
            anomaly_window: 3,
            anomaly_threshold: dec!(0.40),
            steps: [
                "All Transactions Posted",
                "Bank Statement Reconciliation",
                "Payroll Reconciliation",
                "Job Cost Review",
                "Accrue Unbilled Liabilities",
                "Revenue Recognition / WIP Schedule",
                "Generate Financial Statements",
                "Lock Period",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl CloseSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.steps.is_empty() {
            return Err(ConfigError::ValidationError(
                "close.steps must name at least one step".to_string(),
            ));
        }
        if self.anomaly_window == 0 {
            return Err(ConfigError::ValidationError(
                "close.anomaly_window must be at least 1".to_string(),
            ));
        }
        if self.anomaly_threshold <= Decimal::ZERO || self.anomaly_threshold >= Decimal::ONE {
            return Err(ConfigError::ValidationError(format!(
                "close.anomaly_threshold must be between 0 and 1 (got {})",
                self.anomaly_threshold
            )));
        }
        Ok(())
    }
}

/// Cash-flow forecast and runway settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CashFlowSettings {
    pub starting_cash: Decimal,
    /// Cash floor the runway is measured against.
    pub min_cash_threshold: Decimal,
    /// A breach within this many weeks raises the alarm.
    pub alarm_weeks: usize,
    pub horizon_weeks: usize,
}

impl Default for CashFlowSettings {
    fn default() -> Self {
        Self {
            starting_cash: Decimal::ZERO,
            min_cash_threshold: dec!(50000),
            alarm_weeks: 8,
            horizon_weeks: 13,
        }
    }
}

impl CashFlowSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.horizon_weeks == 0 {
            return Err(ConfigError::ValidationError(
                "cash_flow.horizon_weeks must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("starting_cash", self.starting_cash),
            ("min_cash_threshold", self.min_cash_threshold),
        ] {
            if value.abs() > CASH_LIMIT {
                return Err(ConfigError::ValidationError(format!(
                    "cash_flow.{name} must be within +/-{CASH_LIMIT} (got {value})"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// When set, logs are also written to a daily rolling file in this directory.
    pub directory: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub format: OutputFormat,
}

/// How report rows are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
        assert_eq!(CloseSettings::default().steps.len(), 8);
    }

    #[test]
    fn overlapping_fade_tiers_are_rejected() {
        let mut fade = FadeThresholds::default();
        fade.warning_fade_pct = dec!(12);
        assert!(matches!(fade.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn inverted_cpi_tiers_are_rejected() {
        let mut fade = FadeThresholds::default();
        fade.critical_cpi = dec!(0.95);
        assert!(fade.validate().is_err());
    }

    #[test]
    fn cash_figures_beyond_the_ledger_cap_are_rejected() {
        let mut cash = CashFlowSettings::default();
        cash.starting_cash = Decimal::MAX;
        assert!(matches!(cash.validate(), Err(ConfigError::ValidationError(_))));
        cash.starting_cash = dec!(-1000000000000000);
        assert!(cash.validate().is_ok());
    }

    #[test]
    fn anomaly_threshold_must_be_a_fraction() {
        let mut close = CloseSettings::default();
        close.anomaly_threshold = dec!(40);
        assert!(close.validate().is_err());
    }
}
