use crate::error::CloseError;
use chrono::NaiveDateTime;
use core_types::{CloseAction, CloseEvent, PeriodStatus, StepStatus};
use serde::{Deserialize, Serialize, Serializer};
use std::sync::{Arc, Mutex, PoisonError};

/// Whether a period is a regular month-end or a correction to a locked one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum PeriodKind {
    Regular,
    Adjustment { adjusts: String },
}

/// One task of the close checklist. Step `n` depends on step `n - 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseStep {
    pub ordinal: usize,
    pub name: String,
    pub status: StepStatus,
    pub completed_by: Option<String>,
    pub completed_at: Option<NaiveDateTime>,
}

/// A recorded close event that replay could not apply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedEvent {
    pub event: CloseEvent,
    #[serde(serialize_with = "as_message")]
    pub error: CloseError,
}

fn as_message<S: Serializer>(error: &CloseError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// A period rebuilt from its close log, with the events that were skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Replay {
    pub period: PeriodClose,
    pub rejected: Vec<RejectedEvent>,
}

/// The close state of one accounting period.
///
/// Every transition validates before it mutates, so a rejected call leaves the period exactly as
/// it was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodClose {
    pub period_id: String,
    pub status: PeriodStatus,
    pub kind: PeriodKind,
    pub steps: Vec<CloseStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomaly: Option<String>,
}

impl PeriodClose {
    /// Opens a period with one pending step per name, numbered from 1.
    pub fn open<S: AsRef<str>>(
        period_id: impl Into<String>,
        step_names: &[S],
    ) -> Result<Self, CloseError> {
        Self::open_as(period_id.into(), PeriodKind::Regular, step_names)
    }

    /// Opens a correction period against `locked`, which must already be locked.
    pub fn open_adjustment<S: AsRef<str>>(
        locked: &PeriodClose,
        period_id: impl Into<String>,
        step_names: &[S],
    ) -> Result<Self, CloseError> {
        if !locked.is_locked() {
            return Err(CloseError::NotLocked(locked.period_id.clone()));
        }
        let kind = PeriodKind::Adjustment {
            adjusts: locked.period_id.clone(),
        };
        Self::open_as(period_id.into(), kind, step_names)
    }

    fn open_as<S: AsRef<str>>(
        period_id: String,
        kind: PeriodKind,
        step_names: &[S],
    ) -> Result<Self, CloseError> {
        if step_names.is_empty() {
            return Err(CloseError::NoSteps);
        }
        let steps = step_names
            .iter()
            .enumerate()
            .map(|(i, name)| CloseStep {
                ordinal: i + 1,
                name: name.as_ref().to_string(),
                status: StepStatus::Pending,
                completed_by: None,
                completed_at: None,
            })
            .collect();

        tracing::info!(period = %period_id, ?kind, "Period opened for close.");
        Ok(Self {
            period_id,
            status: PeriodStatus::Open,
            kind,
            steps,
            anomaly: None,
        })
    }

    /// Rebuilds a period by applying its recorded events in timestamp order.
    ///
    /// Events for other periods are ignored. An event the workflow rejects is recorded and
    /// skipped; it leaves the period unchanged and replay continues with the next one.
    pub fn replay<S: AsRef<str>>(
        period_id: impl Into<String>,
        step_names: &[S],
        events: &[CloseEvent],
    ) -> Result<Replay, CloseError> {
        let mut period = Self::open(period_id, step_names)?;
        let mut ordered: Vec<&CloseEvent> = events
            .iter()
            .filter(|e| e.period_id == period.period_id)
            .collect();
        ordered.sort_by_key(|e| e.at);

        let mut rejected = Vec::new();
        for event in ordered {
            if let Err(error) = period.apply(event) {
                rejected.push(RejectedEvent {
                    event: event.clone(),
                    error,
                });
            }
        }
        Ok(Replay { period, rejected })
    }

    pub fn apply(&mut self, event: &CloseEvent) -> Result<(), CloseError> {
        match event.action {
            CloseAction::Start => self.start_step(event.ordinal),
            CloseAction::Complete => self.complete_step(event.ordinal, &event.by, event.at),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.status == PeriodStatus::Locked
    }

    /// The lowest-ordinal step that is not complete.
    pub fn next_step(&self) -> Option<&CloseStep> {
        self.steps.iter().find(|s| s.status != StepStatus::Complete)
    }

    pub fn step(&self, ordinal: usize) -> Option<&CloseStep> {
        ordinal.checked_sub(1).and_then(|i| self.steps.get(i))
    }

    pub fn completed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Complete)
            .count()
    }

    /// Moves a pending step to in-progress. Every earlier step must be complete.
    pub fn start_step(&mut self, ordinal: usize) -> Result<(), CloseError> {
        let index = self.check_transition(ordinal, StepStatus::Pending)?;
        self.steps[index].status = StepStatus::InProgress;
        if self.status == PeriodStatus::Open {
            self.status = PeriodStatus::InProgress;
        }
        tracing::debug!(period = %self.period_id, ordinal, "Close step started.");
        Ok(())
    }

    /// Completes an in-progress step. Completing the last step locks the period.
    ///
    /// The step must still be in progress when the call lands; a second completion of the same
    /// step is rejected with [`CloseError::StatusConflict`].
    pub fn complete_step(
        &mut self,
        ordinal: usize,
        by: &str,
        at: NaiveDateTime,
    ) -> Result<(), CloseError> {
        let index = self.check_transition(ordinal, StepStatus::InProgress)?;
        let step = &mut self.steps[index];
        step.status = StepStatus::Complete;
        step.completed_by = Some(by.to_string());
        step.completed_at = Some(at);
        tracing::info!(period = %self.period_id, ordinal, by, "Close step completed.");

        if self.next_step().is_none() {
            self.status = PeriodStatus::Locked;
            tracing::info!(period = %self.period_id, "All close steps complete; period locked.");
        }
        Ok(())
    }

    /// Locks the period explicitly. Only valid once every step is complete.
    pub fn lock(&mut self) -> Result<(), CloseError> {
        if self.is_locked() {
            return Err(CloseError::AlreadyLocked(self.period_id.clone()));
        }
        if let Some(next) = self.next_step() {
            return Err(CloseError::SequenceViolation {
                expected: next.ordinal,
                attempted: self.steps.len(),
            });
        }
        self.status = PeriodStatus::Locked;
        Ok(())
    }

    /// Attaches an advisory note. Allowed on locked periods; it never changes step state.
    pub fn attach_anomaly(&mut self, note: impl Into<String>) {
        self.anomaly = Some(note.into());
    }

    /// Returns the index of `ordinal` if it may leave `from`.
    fn check_transition(&self, ordinal: usize, from: StepStatus) -> Result<usize, CloseError> {
        if self.is_locked() {
            return Err(self.reject(CloseError::PeriodLocked(self.period_id.clone())));
        }
        let index = ordinal
            .checked_sub(1)
            .filter(|i| *i < self.steps.len())
            .ok_or_else(|| self.reject(CloseError::UnknownStep(ordinal)))?;

        if let Some(blocking) = self.steps[..index]
            .iter()
            .find(|s| s.status != StepStatus::Complete)
        {
            return Err(self.reject(CloseError::SequenceViolation {
                expected: blocking.ordinal,
                attempted: ordinal,
            }));
        }

        let actual = self.steps[index].status;
        if actual != from {
            return Err(self.reject(CloseError::StatusConflict {
                ordinal,
                expected: from,
                actual,
            }));
        }
        Ok(index)
    }

    fn reject(&self, error: CloseError) -> CloseError {
        tracing::warn!(period = %self.period_id, %error, "Close transition rejected.");
        error
    }
}

/// A period shared between writers. Each transition runs under the lock, so of two racing
/// completions of the same step exactly one succeeds.
#[derive(Debug, Clone)]
pub struct SharedPeriodClose {
    inner: Arc<Mutex<PeriodClose>>,
}

impl SharedPeriodClose {
    pub fn new(period: PeriodClose) -> Self {
        Self {
            inner: Arc::new(Mutex::new(period)),
        }
    }

    pub fn start_step(&self, ordinal: usize) -> Result<(), CloseError> {
        self.with(|p| p.start_step(ordinal))
    }

    pub fn complete_step(
        &self,
        ordinal: usize,
        by: &str,
        at: NaiveDateTime,
    ) -> Result<(), CloseError> {
        self.with(|p| p.complete_step(ordinal, by, at))
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> PeriodClose {
        self.with(|p| p.clone())
    }

    fn with<R>(&self, f: impl FnOnce(&mut PeriodClose) -> R) -> R {
        // Transitions never leave a half-applied state; a poisoned lock still holds a valid period.
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const STEPS: [&str; 3] = ["Post Transactions", "Reconcile Bank", "Lock Period"];

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 3)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn finish(period: &mut PeriodClose, ordinal: usize) {
        period.start_step(ordinal).unwrap();
        period.complete_step(ordinal, "controller", at(9 + ordinal as u32)).unwrap();
    }

    #[test]
    fn opening_creates_pending_steps() {
        let period = PeriodClose::open("2026-01", &STEPS).unwrap();
        assert_eq!(period.status, PeriodStatus::Open);
        assert_eq!(period.kind, PeriodKind::Regular);
        assert_eq!(period.steps.len(), 3);
        assert!(period.steps.iter().all(|s| s.status == StepStatus::Pending));
        assert_eq!(period.step(2).map(|s| s.name.as_str()), Some("Reconcile Bank"));
        assert_eq!(period.next_step().map(|s| s.ordinal), Some(1));
    }

    #[test]
    fn empty_step_list_is_rejected() {
        let none: [&str; 0] = [];
        assert_eq!(PeriodClose::open("2026-01", &none), Err(CloseError::NoSteps));
    }

    #[test]
    fn completion_must_pass_through_in_progress() {
        let mut period = PeriodClose::open("2026-01", &STEPS).unwrap();
        let err = period.complete_step(1, "controller", at(9)).unwrap_err();
        assert_eq!(
            err,
            CloseError::StatusConflict {
                ordinal: 1,
                expected: StepStatus::InProgress,
                actual: StepStatus::Pending,
            }
        );
        assert_eq!(period.step(1).unwrap().status, StepStatus::Pending);
    }

    #[test]
    fn starting_a_step_moves_the_period_in_progress() {
        let mut period = PeriodClose::open("2026-01", &STEPS).unwrap();
        period.start_step(1).unwrap();
        assert_eq!(period.status, PeriodStatus::InProgress);
        assert_eq!(period.step(1).unwrap().status, StepStatus::InProgress);
    }

    #[test]
    fn out_of_order_start_names_the_expected_step() {
        let mut period = PeriodClose::open("2026-01", &STEPS).unwrap();
        finish(&mut period, 1);
        let before = period.clone();
        assert_eq!(
            period.start_step(3),
            Err(CloseError::SequenceViolation {
                expected: 2,
                attempted: 3,
            })
        );
        assert_eq!(period, before);
    }

    #[test]
    fn final_completion_locks_the_period() {
        let mut period = PeriodClose::open("2026-01", &STEPS).unwrap();
        for ordinal in 1..=3 {
            finish(&mut period, ordinal);
        }
        assert!(period.is_locked());
        assert_eq!(period.completed_steps(), 3);
        let last = period.step(3).unwrap();
        assert_eq!(last.completed_by.as_deref(), Some("controller"));
        assert_eq!(last.completed_at, Some(at(12)));

        assert_eq!(
            period.start_step(1),
            Err(CloseError::PeriodLocked("2026-01".to_string()))
        );
        assert_eq!(
            period.lock(),
            Err(CloseError::AlreadyLocked("2026-01".to_string()))
        );
    }

    #[test]
    fn explicit_lock_requires_every_step() {
        let mut period = PeriodClose::open("2026-01", &STEPS).unwrap();
        finish(&mut period, 1);
        assert_eq!(
            period.lock(),
            Err(CloseError::SequenceViolation {
                expected: 2,
                attempted: 3,
            })
        );
        assert_eq!(period.status, PeriodStatus::InProgress);
    }

    #[test]
    fn unknown_ordinals_are_rejected() {
        let mut period = PeriodClose::open("2026-01", &STEPS).unwrap();
        assert_eq!(period.start_step(0), Err(CloseError::UnknownStep(0)));
        assert_eq!(period.start_step(4), Err(CloseError::UnknownStep(4)));
    }

    #[test]
    fn adjustments_require_a_locked_source() {
        let mut january = PeriodClose::open("2026-01", &STEPS).unwrap();
        assert_eq!(
            PeriodClose::open_adjustment(&january, "2026-01-ADJ", &STEPS),
            Err(CloseError::NotLocked("2026-01".to_string()))
        );

        for ordinal in 1..=3 {
            finish(&mut january, ordinal);
        }
        let adjustment = PeriodClose::open_adjustment(&january, "2026-01-ADJ", &STEPS).unwrap();
        assert_eq!(
            adjustment.kind,
            PeriodKind::Adjustment {
                adjusts: "2026-01".to_string()
            }
        );
        assert_eq!(adjustment.status, PeriodStatus::Open);
        assert!(january.is_locked());
    }

    #[test]
    fn replay_rebuilds_state_from_events() {
        let event = |ordinal: usize, action: CloseAction, hour: u32| CloseEvent {
            period_id: "2026-01".to_string(),
            ordinal,
            action,
            by: "controller".to_string(),
            at: at(hour),
        };
        let mut foreign = event(1, CloseAction::Start, 8);
        foreign.period_id = "2025-12".to_string();
        let events = vec![
            event(1, CloseAction::Complete, 10),
            event(1, CloseAction::Start, 9),
            foreign,
            event(2, CloseAction::Start, 11),
        ];

        let replay = PeriodClose::replay("2026-01", &STEPS, &events).unwrap();
        assert!(replay.rejected.is_empty());
        let period = replay.period;
        assert_eq!(period.step(1).unwrap().status, StepStatus::Complete);
        assert_eq!(period.step(2).unwrap().status, StepStatus::InProgress);
        assert_eq!(period.next_step().map(|s| s.ordinal), Some(2));
    }

    #[test]
    fn replay_skips_a_duplicate_completion_and_keeps_going() {
        let event = |ordinal: usize, action: CloseAction, hour: u32, by: &str| CloseEvent {
            period_id: "2026-01".to_string(),
            ordinal,
            action,
            by: by.to_string(),
            at: at(hour),
        };
        let events = vec![
            event(1, CloseAction::Start, 8, "sarah"),
            event(1, CloseAction::Complete, 9, "sarah"),
            event(1, CloseAction::Complete, 10, "mike"),
            event(2, CloseAction::Start, 11, "mike"),
            event(2, CloseAction::Complete, 12, "mike"),
        ];

        let replay = PeriodClose::replay("2026-01", &STEPS, &events).unwrap();
        assert_eq!(replay.rejected.len(), 1);
        let skipped = &replay.rejected[0];
        assert_eq!(skipped.event.by, "mike");
        assert_eq!(
            skipped.error,
            CloseError::StatusConflict {
                ordinal: 1,
                expected: StepStatus::InProgress,
                actual: StepStatus::Complete,
            }
        );

        let period = &replay.period;
        assert_eq!(period.step(1).unwrap().completed_by.as_deref(), Some("sarah"));
        assert_eq!(period.step(2).unwrap().status, StepStatus::Complete);
        assert_eq!(period.next_step().map(|s| s.ordinal), Some(3));

        let json = serde_json::to_value(&replay).unwrap();
        assert_eq!(json["rejected"][0]["event"]["ordinal"], 1);
        assert!(json["rejected"][0]["error"].as_str().unwrap().contains("Step 1"));
    }

    #[test]
    fn state_serializes_for_the_presentation_layer() {
        let mut period = PeriodClose::open("2026-01", &STEPS).unwrap();
        finish(&mut period, 1);
        let json = serde_json::to_value(&period).unwrap();
        assert_eq!(json["period_id"], "2026-01");
        assert_eq!(json["status"], "in_progress");
        assert_eq!(json["steps"][0]["status"], "complete");
        assert_eq!(json["steps"][0]["completed_by"], "controller");
        assert_eq!(json["steps"][1]["completed_at"], serde_json::Value::Null);
        assert!(json.get("anomaly").is_none());
    }

    #[test]
    fn racing_completions_have_one_winner() {
        let mut period = PeriodClose::open("2026-01", &STEPS).unwrap();
        period.start_step(1).unwrap();
        let shared = SharedPeriodClose::new(period);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let shared = shared.clone();
                std::thread::spawn(move || shared.complete_step(1, &format!("user-{i}"), at(10)))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().filter_map(|r| r.as_ref().err()).all(|e| matches!(
            e,
            CloseError::StatusConflict {
                actual: StepStatus::Complete,
                ..
            }
        )));
        assert_eq!(shared.snapshot().step(1).unwrap().status, StepStatus::Complete);
    }
}
