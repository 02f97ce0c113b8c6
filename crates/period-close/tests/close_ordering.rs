use chrono::NaiveDate;
use configuration::CloseSettings;
use core_types::{PeriodStatus, StepStatus};
use period_close::{CloseError, PeriodClose};

fn statuses(period: &PeriodClose) -> Vec<StepStatus> {
    period.steps.iter().map(|s| s.status).collect()
}

#[test]
fn completing_step_three_while_step_two_is_pending_fails_without_side_effects() {
    let settings = CloseSettings::default();
    let at = NaiveDate::from_ymd_opt(2026, 2, 2)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();

    let mut period = PeriodClose::open("2026-01", &settings.steps).unwrap();
    period.start_step(1).unwrap();
    period.complete_step(1, "controller", at).unwrap();
    let before = statuses(&period);

    let err = period.complete_step(3, "controller", at).unwrap_err();
    assert_eq!(
        err,
        CloseError::SequenceViolation {
            expected: 2,
            attempted: 3,
        }
    );
    assert_eq!(statuses(&period), before);
    assert_eq!(period.step(2).unwrap().status, StepStatus::Pending);
    assert_eq!(period.step(3).unwrap().status, StepStatus::Pending);
    assert_eq!(period.status, PeriodStatus::InProgress);
}

#[test]
fn full_default_checklist_locks_and_requires_adjustment() {
    let settings = CloseSettings::default();
    let at = NaiveDate::from_ymd_opt(2026, 2, 5)
        .unwrap()
        .and_hms_opt(17, 0, 0)
        .unwrap();

    let mut period = PeriodClose::open("2026-01", &settings.steps).unwrap();
    for ordinal in 1..=settings.steps.len() {
        assert!(!period.is_locked());
        period.start_step(ordinal).unwrap();
        period.complete_step(ordinal, "cfo", at).unwrap();
    }
    assert!(period.is_locked());
    assert_eq!(
        period.complete_step(1, "cfo", at),
        Err(CloseError::PeriodLocked("2026-01".to_string()))
    );

    let adjustment = PeriodClose::open_adjustment(&period, "2026-01-A", &settings.steps).unwrap();
    assert_eq!(adjustment.steps.len(), settings.steps.len());
    assert!(!adjustment.is_locked());
}
