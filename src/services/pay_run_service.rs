//! Mechanical side effects of a pay-run transition (§4.3): input locking,
//! `reopen_count`, and the approval/void stamps. [`super::state_machine`]
//! decides whether a transition is allowed; this module applies it.

use crate::domain::{PayInputAdjustment, PayRun, PayRunStatus, TimeEntry};
use crate::services::locking_service::LockingService;
use crate::services::state_machine::{InvalidTransition, PayRunStateMachine};
use chrono::{DateTime, NaiveDate, Utc};

pub struct PayRunService;

impl PayRunService {
    /// Approves a previewed run: validates the transition, locks every
    /// in-scope input row to it, and stamps `approved_at`/`approved_by`.
    /// Returns the number of rows newly locked.
    pub fn approve_run(
        pay_run: &mut PayRun,
        period_start: NaiveDate,
        period_end: NaiveDate,
        time_entries: &mut [TimeEntry],
        adjustments: &mut [PayInputAdjustment],
        approved_by: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<usize, InvalidTransition> {
        PayRunStateMachine::transition(pay_run, PayRunStatus::Approved, None)?;

        let locked = LockingService::lock_inputs_for_run(pay_run, period_start, period_end, time_entries, adjustments, at);
        pay_run.status = PayRunStatus::Approved;
        pay_run.approved_at = Some(at);
        pay_run.approved_by = Some(approved_by.into());
        Ok(locked)
    }

    /// Reopens an approved run back to preview: validates the transition,
    /// unlocks every row this run locked, and clears the approval stamps
    /// while bumping `reopen_count` (§8 P7). Returns the number of rows
    /// unlocked.
    pub fn reopen_run(
        pay_run: &mut PayRun,
        time_entries: &mut [TimeEntry],
        adjustments: &mut [PayInputAdjustment],
    ) -> Result<usize, InvalidTransition> {
        PayRunStateMachine::transition(pay_run, PayRunStatus::Preview, None)?;

        let unlocked = LockingService::unlock_inputs_for_run(pay_run.pay_run_id, time_entries, adjustments);
        pay_run.status = PayRunStatus::Preview;
        pay_run.approved_at = None;
        pay_run.approved_by = None;
        pay_run.reopen_count += 1;
        Ok(unlocked)
    }

    /// Voids a run for `reason`, which must be non-empty once trimmed
    /// (§4.3, §6). Rejected with [`InvalidTransition`] otherwise.
    pub fn void_run(pay_run: &mut PayRun, reason: impl Into<String>) -> Result<(), InvalidTransition> {
        let reason = reason.into();
        PayRunStateMachine::transition(pay_run, PayRunStatus::Voided, Some(&reason))?;

        pay_run.status = PayRunStatus::Voided;
        pay_run.voided_reason = Some(reason);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{EmployeeId, LegalEntityId, PayPeriodId, PayRunId, TimeEntryId};
    use crate::domain::PayRunEmployee;

    fn run_with_one_included_employee(status: PayRunStatus, employee: EmployeeId) -> PayRun {
        let mut run = PayRun::new(PayRunId::new(), LegalEntityId::new(), PayPeriodId::new());
        run.status = status;
        run.employees.push(PayRunEmployee::new(Default::default(), run.pay_run_id, employee));
        run
    }

    fn entry_for(employee: EmployeeId, work_date: chrono::NaiveDate) -> TimeEntry {
        TimeEntry {
            time_entry_id: TimeEntryId::new(),
            employee_id: employee,
            work_date,
            hours: Default::default(),
            job_id: None,
            project_id: None,
            department_id: None,
            worksite_id: None,
            rate_override: None,
            locked_by_pay_run_id: None,
            locked_at: None,
        }
    }

    #[test]
    fn approve_locks_inputs_and_stamps_approval() {
        let employee = EmployeeId::new();
        let mut run = run_with_one_included_employee(PayRunStatus::Preview, employee);
        let period_start = chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let period_end = chrono::NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let mut entries = vec![entry_for(employee, period_start)];
        let mut adjustments = vec![];

        let locked = PayRunService::approve_run(
            &mut run,
            period_start,
            period_end,
            &mut entries,
            &mut adjustments,
            "manager-1",
            Utc::now(),
        )
        .unwrap();

        assert_eq!(locked, 1);
        assert!(entries[0].is_locked());
        assert_eq!(run.status, PayRunStatus::Approved);
        assert!(run.approved_at.is_some());
        assert_eq!(run.approved_by.as_deref(), Some("manager-1"));
    }

    #[test]
    fn reopen_unlocks_inputs_clears_approval_and_bumps_reopen_count() {
        let employee = EmployeeId::new();
        let mut run = run_with_one_included_employee(PayRunStatus::Approved, employee);
        run.approved_at = Some(Utc::now());
        run.approved_by = Some("manager-1".to_string());

        let mut entries = vec![entry_for(employee, chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap())];
        entries[0].lock(run.pay_run_id, Utc::now()).unwrap();
        let mut adjustments = vec![];

        let unlocked = PayRunService::reopen_run(&mut run, &mut entries, &mut adjustments).unwrap();

        assert_eq!(unlocked, 1);
        assert!(!entries[0].is_locked());
        assert_eq!(run.status, PayRunStatus::Preview);
        assert!(run.approved_at.is_none());
        assert!(run.approved_by.is_none());
        assert_eq!(run.reopen_count, 1);
    }

    #[test]
    fn reopen_twice_bumps_reopen_count_twice() {
        let employee = EmployeeId::new();
        let mut run = run_with_one_included_employee(PayRunStatus::Approved, employee);
        let mut entries = vec![];
        let mut adjustments = vec![];

        PayRunService::reopen_run(&mut run, &mut entries, &mut adjustments).unwrap();
        run.status = PayRunStatus::Approved;
        PayRunService::reopen_run(&mut run, &mut entries, &mut adjustments).unwrap();

        assert_eq!(run.reopen_count, 2);
    }

    #[test]
    fn void_without_reason_is_rejected() {
        let mut run = run_with_one_included_employee(PayRunStatus::Committed, EmployeeId::new());
        let err = PayRunService::void_run(&mut run, "").unwrap_err();
        assert!(err.to_string().contains("non-empty reason"));
        assert_eq!(run.status, PayRunStatus::Committed);
        assert!(run.voided_reason.is_none());
    }

    #[test]
    fn void_with_reason_succeeds() {
        let mut run = run_with_one_included_employee(PayRunStatus::Committed, EmployeeId::new());
        PayRunService::void_run(&mut run, "duplicate run").unwrap();
        assert_eq!(run.status, PayRunStatus::Voided);
        assert_eq!(run.voided_reason.as_deref(), Some("duplicate run"));
    }
}
