use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// The job-cost category a posted cost belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum CostCategory {
    Material,
    Labor,
    Subcontract,
    Equipment,
    Overhead,
}

impl CostCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CostCategory::Material => "material",
            CostCategory::Labor => "labor",
            CostCategory::Subcontract => "subcontract",
            CostCategory::Equipment => "equipment",
            CostCategory::Overhead => "overhead",
        }
    }

    /// Direct job costs are everything except overhead.
    pub fn is_direct(&self) -> bool {
        !matches!(self, CostCategory::Overhead)
    }
}

impl fmt::Display for CostCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CostCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "material" | "materials" => Ok(CostCategory::Material),
            "labor" | "labour" => Ok(CostCategory::Labor),
            "subcontract" | "subcontractor" => Ok(CostCategory::Subcontract),
            "equipment" => Ok(CostCategory::Equipment),
            "overhead" => Ok(CostCategory::Overhead),
            other => Err(CoreError::invalid(
                "category",
                format!("unknown cost category '{other}'"),
            )),
        }
    }
}

/// Collection status of an invoice as recorded by the accounting system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum ReceivableStatus {
    Sent,
    Paid,
    Overdue,
}

impl fmt::Display for ReceivableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReceivableStatus::Sent => "sent",
            ReceivableStatus::Paid => "paid",
            ReceivableStatus::Overdue => "overdue",
        };
        f.write_str(s)
    }
}

impl FromStr for ReceivableStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sent" => Ok(ReceivableStatus::Sent),
            "paid" => Ok(ReceivableStatus::Paid),
            "overdue" => Ok(ReceivableStatus::Overdue),
            other => Err(CoreError::invalid(
                "status",
                format!("unknown receivable status '{other}'"),
            )),
        }
    }
}

/// Lifecycle of a single close step. `Complete` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Complete,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::InProgress => "in_progress",
            StepStatus::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// Lifecycle of an accounting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodStatus {
    Open,
    InProgress,
    Locked,
}

impl fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PeriodStatus::Open => "open",
            PeriodStatus::InProgress => "in_progress",
            PeriodStatus::Locked => "locked",
        };
        f.write_str(s)
    }
}

/// An action a user takes on a close step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum CloseAction {
    Start,
    Complete,
}

impl FromStr for CloseAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(CloseAction::Start),
            "complete" => Ok(CloseAction::Complete),
            other => Err(CoreError::invalid("action", format!("unknown close action '{other}'"))),
        }
    }
}

/// Where a manual ledger line lands in the period P&L.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum LedgerSection {
    Revenue,
    DirectCost,
    Overhead,
}

impl FromStr for LedgerSection {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "revenue" => Ok(LedgerSection::Revenue),
            "direct_cost" | "direct" => Ok(LedgerSection::DirectCost),
            "overhead" => Ok(LedgerSection::Overhead),
            other => Err(CoreError::invalid(
                "section",
                format!("unknown ledger section '{other}'"),
            )),
        }
    }
}

// Feeds spell these loosely, so deserialization goes through `FromStr`.
impl TryFrom<String> for CostCategory {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<String> for ReceivableStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<String> for CloseAction {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<String> for LedgerSection {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
