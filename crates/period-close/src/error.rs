use core_types::StepStatus;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CloseError {
    #[error("Close steps run in order: step {expected} is next, step {attempted} was requested")]
    SequenceViolation { expected: usize, attempted: usize },

    #[error("Period '{0}' is locked; open an adjustment period to make corrections")]
    PeriodLocked(String),

    #[error("Period '{0}' is already locked")]
    AlreadyLocked(String),

    #[error("Step {ordinal} changed concurrently: expected {expected}, found {actual}")]
    StatusConflict {
        ordinal: usize,
        expected: StepStatus,
        actual: StepStatus,
    },

    #[error("Period has no step {0}")]
    UnknownStep(usize),

    #[error("Period '{0}' is not locked; adjustments can only be opened against a locked period")]
    NotLocked(String),

    #[error("A period needs at least one close step")]
    NoSteps,
}
