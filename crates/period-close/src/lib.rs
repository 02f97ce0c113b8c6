//! # Period Close
//!
//! The month-end close checklist as a state machine, plus the period P&L and the revenue
//! anomaly check shown alongside the close history.
//!
//! Steps run strictly in order (`pending -> in_progress -> complete`) and completing the last
//! one locks the period. A locked period is read-only; corrections go into an adjustment period
//! opened against it. Rejected transitions leave the period untouched.

pub mod anomaly;
pub mod error;
pub mod pnl;
pub mod workflow;

pub use anomaly::{AnomalyCheck, PeriodSummary, attach_notes, close_history};
pub use error::CloseError;
pub use pnl::{PnlLine, PnlRollup};
pub use workflow::{CloseStep, PeriodClose, PeriodKind, RejectedEvent, Replay, SharedPeriodClose};
