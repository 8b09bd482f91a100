//! Pay period / pay run / pay-run-employee / time entry / adjustment entities
//! (§3). Transition validation itself lives in [`crate::services::state_machine`];
//! this module owns the data shape and the mechanical effects of a
//! transition (locking fields, counters) so the state machine can stay a
//! pure predicate table.

use crate::domain::value_objects::{
    EmployeeId, LegalEntityId, PayInputAdjustmentId, PayPeriodId, PayRunEmployeeId, PayRunId,
    TimeEntryId,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::fmt;

#[derive(Clone, Debug)]
pub struct PayPeriod {
    pub pay_period_id: PayPeriodId,
    pub legal_entity_id: LegalEntityId,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub check_date: NaiveDate,
}

/// Pay run status (§4.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PayRunStatus {
    Draft,
    Preview,
    Approved,
    Committed,
    Paid,
    Voided,
}

impl fmt::Display for PayRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Preview => "preview",
            Self::Approved => "approved",
            Self::Committed => "committed",
            Self::Paid => "paid",
            Self::Voided => "voided",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InclusionStatus {
    Included,
    Excluded,
    Error,
}

#[derive(Clone, Debug)]
pub struct PayRun {
    pub pay_run_id: PayRunId,
    pub legal_entity_id: LegalEntityId,
    pub pay_period_id: PayPeriodId,
    pub status: PayRunStatus,
    pub reopen_count: u32,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub committed_at: Option<DateTime<Utc>>,
    pub voided_reason: Option<String>,
    pub employees: Vec<PayRunEmployee>,
}

impl PayRun {
    pub fn new(pay_run_id: PayRunId, legal_entity_id: LegalEntityId, pay_period_id: PayPeriodId) -> Self {
        Self {
            pay_run_id,
            legal_entity_id,
            pay_period_id,
            status: PayRunStatus::Draft,
            reopen_count: 0,
            approved_at: None,
            approved_by: None,
            committed_at: None,
            voided_reason: None,
            employees: Vec::new(),
        }
    }

    pub fn included_employees(&self) -> impl Iterator<Item = &PayRunEmployee> {
        self.employees.iter().filter(|e| e.status == InclusionStatus::Included)
    }

    pub fn has_error_employees(&self) -> bool {
        self.employees.iter().any(|e| e.status == InclusionStatus::Error)
    }
}

#[derive(Clone, Debug)]
pub struct PayRunEmployee {
    pub pay_run_employee_id: PayRunEmployeeId,
    pub pay_run_id: PayRunId,
    pub employee_id: EmployeeId,
    pub status: InclusionStatus,
    pub gross: Decimal,
    pub net: Decimal,
}

impl PayRunEmployee {
    pub fn new(pay_run_employee_id: PayRunEmployeeId, pay_run_id: PayRunId, employee_id: EmployeeId) -> Self {
        Self {
            pay_run_employee_id,
            pay_run_id,
            employee_id,
            status: InclusionStatus::Included,
            gross: Decimal::ZERO,
            net: Decimal::ZERO,
        }
    }
}

/// Mutable while the owning run's status permits; once
/// `locked_by_pay_run_id` is set the row is frozen until an explicit
/// unlock via reopen of that run (§3 I7).
#[derive(Clone, Debug)]
pub struct TimeEntry {
    pub time_entry_id: TimeEntryId,
    pub employee_id: EmployeeId,
    pub work_date: NaiveDate,
    pub hours: Decimal,
    pub job_id: Option<crate::domain::value_objects::JobId>,
    pub project_id: Option<crate::domain::value_objects::ProjectId>,
    pub department_id: Option<crate::domain::value_objects::DepartmentId>,
    pub worksite_id: Option<crate::domain::value_objects::WorksiteId>,
    pub rate_override: Option<Decimal>,
    pub locked_by_pay_run_id: Option<PayRunId>,
    pub locked_at: Option<DateTime<Utc>>,
}

impl TimeEntry {
    pub fn is_locked(&self) -> bool {
        self.locked_by_pay_run_id.is_some()
    }

    /// Fails if the row is already locked — callers must unlock (via
    /// reopen) before mutating (§3 I7).
    pub fn lock(&mut self, pay_run_id: PayRunId, at: DateTime<Utc>) -> Result<(), LockError> {
        if self.locked_by_pay_run_id.is_some() {
            return Err(LockError::AlreadyLocked);
        }
        self.locked_by_pay_run_id = Some(pay_run_id);
        self.locked_at = Some(at);
        Ok(())
    }

    pub fn unlock(&mut self) {
        self.locked_by_pay_run_id = None;
        self.locked_at = None;
    }
}

#[derive(Clone, Debug)]
pub struct PayInputAdjustment {
    pub pay_input_adjustment_id: PayInputAdjustmentId,
    pub employee_id: EmployeeId,
    pub target_pay_run_id: Option<PayRunId>,
    pub target_pay_period_id: Option<PayPeriodId>,
    pub amount: Decimal,
    pub description: String,
    pub locked_by_pay_run_id: Option<PayRunId>,
    pub locked_at: Option<DateTime<Utc>>,
}

impl PayInputAdjustment {
    pub fn is_locked(&self) -> bool {
        self.locked_by_pay_run_id.is_some()
    }

    pub fn lock(&mut self, pay_run_id: PayRunId, at: DateTime<Utc>) -> Result<(), LockError> {
        if self.locked_by_pay_run_id.is_some() {
            return Err(LockError::AlreadyLocked);
        }
        self.locked_by_pay_run_id = Some(pay_run_id);
        self.locked_at = Some(at);
        Ok(())
    }

    pub fn unlock(&mut self) {
        self.locked_by_pay_run_id = None;
        self.locked_at = None;
    }

    pub fn targets(&self, pay_run_id: PayRunId, pay_period_id: PayPeriodId) -> bool {
        self.target_pay_run_id == Some(pay_run_id) || self.target_pay_period_id == Some(pay_period_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    #[error("row is already locked by another pay run")]
    AlreadyLocked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locking_a_locked_time_entry_fails() {
        let mut entry = TimeEntry {
            time_entry_id: TimeEntryId::new(),
            employee_id: EmployeeId::new(),
            work_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            hours: Decimal::new(8, 0),
            job_id: None,
            project_id: None,
            department_id: None,
            worksite_id: None,
            rate_override: None,
            locked_by_pay_run_id: None,
            locked_at: None,
        };
        let run_id = PayRunId::new();
        entry.lock(run_id, Utc::now()).unwrap();
        assert!(entry.lock(PayRunId::new(), Utc::now()).is_err());
        entry.unlock();
        assert!(!entry.is_locked());
    }
}
