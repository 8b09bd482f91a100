//! Pay-run state machine with transition validation (§4.3).
//!
//! This module owns only the predicate table and the pre-checks that
//! accompany specific transitions (non-empty included roster, no
//! errored employees, a non-empty reason to void). The mechanical effects
//! of a transition — locking/unlocking rows, bumping `reopen_count`,
//! stamping timestamps — belong to [`crate::services::pay_run_service`],
//! which validates here first and then applies them.

use crate::domain::{InclusionStatus, PayRun, PayRunStatus};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: PayRunStatus,
    pub to: PayRunStatus,
    pub reason: Option<String>,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid transition from '{}' to '{}'", self.from, self.to)?;
        if let Some(reason) = &self.reason {
            write!(f, ": {reason}")?;
        }
        Ok(())
    }
}

impl std::error::Error for InvalidTransition {}

pub struct PayRunStateMachine;

impl PayRunStateMachine {
    fn valid_targets(from: PayRunStatus) -> &'static [PayRunStatus] {
        use PayRunStatus::*;
        match from {
            Draft => &[Preview],
            Preview => &[Approved],
            Approved => &[Preview, Committed],
            Committed => &[Paid, Voided],
            Paid => &[Voided],
            Voided => &[],
        }
    }

    pub fn can_transition(from: PayRunStatus, to: PayRunStatus) -> bool {
        Self::valid_targets(from).contains(&to)
    }

    pub fn is_reopen(from: PayRunStatus, to: PayRunStatus) -> bool {
        from == PayRunStatus::Approved && to == PayRunStatus::Preview
    }

    pub fn can_calculate(status: PayRunStatus) -> bool {
        matches!(status, PayRunStatus::Draft | PayRunStatus::Preview | PayRunStatus::Approved)
    }

    pub fn can_modify_inputs(status: PayRunStatus) -> bool {
        matches!(status, PayRunStatus::Draft | PayRunStatus::Preview)
    }

    pub fn are_results_immutable(status: PayRunStatus) -> bool {
        matches!(status, PayRunStatus::Committed | PayRunStatus::Paid | PayRunStatus::Voided)
    }

    /// Validates a transition against the table plus the per-transition
    /// pre-checks named in §4.3 (S2's "no included employees" case lives
    /// here). `void_reason` is the caller-supplied business reason for a
    /// `*→voided` move; it is ignored for every other target status.
    /// Returns every violation found, empty meaning the transition may
    /// proceed.
    pub fn validate_pay_run_for_transition(
        pay_run: &PayRun,
        to: PayRunStatus,
        void_reason: Option<&str>,
    ) -> Vec<String> {
        let from = pay_run.status;
        if !Self::can_transition(from, to) {
            return vec![format!("cannot transition from '{from}' to '{to}'")];
        }

        let mut errors = Vec::new();
        match to {
            PayRunStatus::Approved => {
                if pay_run.included_employees().next().is_none() {
                    errors.push("Pay run has no included employees".to_string());
                }
                if pay_run.has_error_employees() {
                    let count = pay_run.employees.iter().filter(|e| e.status == InclusionStatus::Error).count();
                    errors.push(format!("{count} employee(s) have calculation errors"));
                }
            }
            PayRunStatus::Committed => {
                if pay_run.has_error_employees() {
                    let count = pay_run.employees.iter().filter(|e| e.status == InclusionStatus::Error).count();
                    errors.push(format!("{count} employee(s) have errors"));
                }
            }
            PayRunStatus::Voided => {
                if void_reason.map(str::trim).unwrap_or("").is_empty() {
                    errors.push("voiding a pay run requires a non-empty reason".to_string());
                }
            }
            _ => {}
        }
        errors
    }

    /// Full check-and-apply: validates, then either returns
    /// [`InvalidTransition`] or the new status to assign. `void_reason` is
    /// only consulted when `to == Voided`.
    pub fn transition(
        pay_run: &PayRun,
        to: PayRunStatus,
        void_reason: Option<&str>,
    ) -> Result<PayRunStatus, InvalidTransition> {
        let errors = Self::validate_pay_run_for_transition(pay_run, to, void_reason);
        if !errors.is_empty() {
            return Err(InvalidTransition { from: pay_run.status, to, reason: Some(errors.join("; ")) });
        }
        Ok(to)
    }
}
