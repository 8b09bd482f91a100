//! Input locking at approval time, and unlocking at reopen (§3 I7, §4.3).
//!
//! Locking prevents silent drift between preview and commit: once a time
//! entry or adjustment is locked to a run, it is frozen until that run is
//! reopened. This module operates on the rows handed to it by the caller
//! (the pay-run service, via a repository) — it has no persistence opinions
//! of its own.

use crate::domain::{PayInputAdjustment, PayRun, TimeEntry};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

pub struct LockingService;

impl LockingService {
    /// Locks every in-scope, not-yet-locked time entry and adjustment to
    /// `pay_run`. In-scope means: belongs to an included employee, and
    /// (for time entries) falls within the run's pay period, or (for
    /// adjustments) targets this run or its period. Returns the count newly
    /// locked.
    pub fn lock_inputs_for_run(
        pay_run: &PayRun,
        period_start: chrono::NaiveDate,
        period_end: chrono::NaiveDate,
        time_entries: &mut [TimeEntry],
        adjustments: &mut [PayInputAdjustment],
        locked_at: DateTime<Utc>,
    ) -> usize {
        let included: std::collections::HashSet<_> =
            pay_run.included_employees().map(|e| e.employee_id).collect();
        if included.is_empty() {
            return 0;
        }

        let mut locked = 0;
        for entry in time_entries.iter_mut() {
            if included.contains(&entry.employee_id)
                && entry.work_date >= period_start
                && entry.work_date <= period_end
                && !entry.is_locked()
                && entry.lock(pay_run.pay_run_id, locked_at).is_ok()
            {
                locked += 1;
            }
        }

        for adj in adjustments.iter_mut() {
            if included.contains(&adj.employee_id)
                && adj.targets(pay_run.pay_run_id, pay_run.pay_period_id)
                && !adj.is_locked()
                && adj.lock(pay_run.pay_run_id, locked_at).is_ok()
            {
                locked += 1;
            }
        }

        locked
    }

    /// Unlocks every row locked by `pay_run`. Returns the count unlocked
    /// (§8 P7: every row locked by r before reopen is unlocked after).
    pub fn unlock_inputs_for_run(
        pay_run_id: crate::domain::value_objects::PayRunId,
        time_entries: &mut [TimeEntry],
        adjustments: &mut [PayInputAdjustment],
    ) -> usize {
        let mut unlocked = 0;
        for entry in time_entries.iter_mut() {
            if entry.locked_by_pay_run_id == Some(pay_run_id) {
                entry.unlock();
                unlocked += 1;
            }
        }
        for adj in adjustments.iter_mut() {
            if adj.locked_by_pay_run_id == Some(pay_run_id) {
                adj.unlock();
                unlocked += 1;
            }
        }
        unlocked
    }

    /// Verifies every row this run locked is still locked to it (guards
    /// against a reopen racing a commit elsewhere).
    pub fn verify_locks_intact(
        pay_run_id: crate::domain::value_objects::PayRunId,
        time_entries: &[TimeEntry],
        adjustments: &[PayInputAdjustment],
    ) -> Vec<String> {
        let mut errors = Vec::new();
        for entry in time_entries {
            if entry.locked_by_pay_run_id == Some(pay_run_id) && !entry.is_locked() {
                errors.push(format!("time entry {} is no longer locked", entry.time_entry_id));
            }
        }
        for adj in adjustments {
            if adj.locked_by_pay_run_id == Some(pay_run_id) && !adj.is_locked() {
                errors.push(format!("adjustment {} is no longer locked", adj.pay_input_adjustment_id));
            }
        }
        errors
    }

    /// Deterministic snapshot hash of an effective-dated config entity,
    /// recorded at lock time so drift can later be detected.
    pub fn compute_snapshot_hash(data: &BTreeMap<String, String>) -> String {
        let json_str = serde_json::to_string(data).expect("btreemap serializes deterministically");
        let digest = Sha256::digest(json_str.as_bytes());
        hex::encode(digest)[..32].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{
        EmployeeId, LegalEntityId, PayInputAdjustmentId, PayPeriodId, PayRunId, TimeEntryId,
    };
    use crate::domain::{InclusionStatus, PayRunEmployee};

    fn sample_run(included: EmployeeId) -> PayRun {
        let mut run = PayRun::new(PayRunId::new(), LegalEntityId::new(), PayPeriodId::new());
        run.employees.push(PayRunEmployee::new(Default::default(), run.pay_run_id, included));
        run
    }

    #[test]
    fn locks_only_included_employees_in_period() {
        let employee = EmployeeId::new();
        let other_employee = EmployeeId::new();
        let run = sample_run(employee);
        let period_start = chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let period_end = chrono::NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();

        let mut entries = vec![
            TimeEntry {
                time_entry_id: TimeEntryId::new(),
                employee_id: employee,
                work_date: period_start,
                hours: Default::default(),
                job_id: None,
                project_id: None,
                department_id: None,
                worksite_id: None,
                rate_override: None,
                locked_by_pay_run_id: None,
                locked_at: None,
            },
            TimeEntry {
                time_entry_id: TimeEntryId::new(),
                employee_id: other_employee,
                work_date: period_start,
                hours: Default::default(),
                job_id: None,
                project_id: None,
                department_id: None,
                worksite_id: None,
                rate_override: None,
                locked_by_pay_run_id: None,
                locked_at: None,
            },
        ];
        let mut adjustments: Vec<PayInputAdjustment> = vec![];

        let locked = LockingService::lock_inputs_for_run(
            &run,
            period_start,
            period_end,
            &mut entries,
            &mut adjustments,
            Utc::now(),
        );
        assert_eq!(locked, 1);
        assert!(entries[0].is_locked());
        assert!(!entries[1].is_locked());
    }

    #[test]
    fn reopen_unlocks_every_row_this_run_locked() {
        let run_id = PayRunId::new();
        let mut entries = vec![TimeEntry {
            time_entry_id: TimeEntryId::new(),
            employee_id: EmployeeId::new(),
            work_date: chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            hours: Default::default(),
            job_id: None,
            project_id: None,
            department_id: None,
            worksite_id: None,
            rate_override: None,
            locked_by_pay_run_id: Some(run_id),
            locked_at: Some(Utc::now()),
        }];
        let mut adjustments: Vec<PayInputAdjustment> = vec![PayInputAdjustment {
            pay_input_adjustment_id: PayInputAdjustmentId::new(),
            employee_id: EmployeeId::new(),
            target_pay_run_id: Some(run_id),
            target_pay_period_id: None,
            amount: Default::default(),
            description: String::new(),
            locked_by_pay_run_id: Some(run_id),
            locked_at: Some(Utc::now()),
        }];

        let unlocked = LockingService::unlock_inputs_for_run(run_id, &mut entries, &mut adjustments);
        assert_eq!(unlocked, 2);
        assert!(!entries[0].is_locked());
        assert!(!adjustments[0].is_locked());
    }
}
