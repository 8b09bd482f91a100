//! Commits a calculated pay run into durable statements and line items,
//! advances `approved` to `committed`, and verifies the result (§4.4).
//!
//! The whole operation runs under the run's advisory lock so a retried
//! commit (same calculation results, same run) can never race itself; every
//! write beneath it is additionally idempotent on its own uniqueness
//! constraint, so a crash mid-commit leaves nothing to clean up — replaying
//! the same inputs just finishes the job.

use crate::calculators::{CalculationResult, LineItemBuilder, PayRunCalculationResult};
use crate::domain::events::{DomainEvent, EventMetadata, EventPublisher};
use crate::domain::value_objects::{PayLineItemId, PayRunEmployeeId, PayRunId, PayStatementId, TenantId};
use crate::domain::{InclusionStatus, PayInputAdjustment, PayLineItem, PayRun, PayRunStatus, PayStatement, TimeEntry};
use crate::services::locking_service::LockingService;
use crate::store::{advisory_lock_key, AdvisoryLock, PayRunRepository};
use chrono::{NaiveDate, Utc};

#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("pay run {0} not found")]
    PayRunNotFound(PayRunId),
    #[error("pay run {0} is '{1}', not 'approved' or already 'committed'")]
    NotApproved(PayRunId, PayRunStatus),
    #[error("pay run {0} has employees in error status")]
    EmployeesInError(PayRunId),
    #[error("pay run {0}'s input locks are no longer intact: {1:?}")]
    LocksNotIntact(PayRunId, Vec<String>),
    #[error("commit for pay run {0} is already in progress elsewhere; retry")]
    LockContended(PayRunId),
    #[error(
        "pay-run-employee {pay_run_employee_id} already has a statement with calculation_id \
         {existing_calculation_id}, but this commit computed {new_calculation_id}"
    )]
    CalculationMismatch {
        pay_run_employee_id: PayRunEmployeeId,
        existing_calculation_id: String,
        new_calculation_id: String,
    },
}

/// Outcome of a `commit_all_statements` call. `statements_existing` and
/// `lines_inserted` being zero on a retry is the expected idempotent case,
/// not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub statements_committed: usize,
    pub statements_existing: usize,
    pub lines_inserted: usize,
}

pub struct CommitService;

impl CommitService {
    /// §4.4 step 1: acquires the process-wide advisory lock keyed by
    /// `hash(pay_run_id)` before doing anything else, and releases it on
    /// every exit path — success, error, or panic-unwind through the
    /// `?`-propagated `CommitError`s below (§5, §7 `LockContended`).
    /// A busy lock fails fast rather than queuing, matching §7's "surfaced
    /// with retry hint" contract.
    pub async fn commit_all_statements(
        store: &(impl PayRunRepository + AdvisoryLock + ?Sized),
        events: &EventPublisher,
        tenant_id: TenantId,
        pay_run_id: PayRunId,
        check_date: NaiveDate,
        locked_time_entries: &[TimeEntry],
        locked_adjustments: &[PayInputAdjustment],
        calculation_results: &PayRunCalculationResult,
    ) -> Result<CommitSummary, CommitError> {
        let lock_key = advisory_lock_key(pay_run_id);
        if !store.try_acquire(lock_key).await {
            return Err(CommitError::LockContended(pay_run_id));
        }
        let result = Self::commit_all_statements_locked(
            store,
            events,
            tenant_id,
            pay_run_id,
            check_date,
            locked_time_entries,
            locked_adjustments,
            calculation_results,
        )
        .await;
        store.release(lock_key).await;
        result
    }

    async fn commit_all_statements_locked(
        store: &(impl PayRunRepository + ?Sized),
        events: &EventPublisher,
        tenant_id: TenantId,
        pay_run_id: PayRunId,
        check_date: NaiveDate,
        locked_time_entries: &[TimeEntry],
        locked_adjustments: &[PayInputAdjustment],
        calculation_results: &PayRunCalculationResult,
    ) -> Result<CommitSummary, CommitError> {
        let mut pay_run = store
            .get_pay_run(pay_run_id)
            .await
            .ok_or(CommitError::PayRunNotFound(pay_run_id))?;

        if pay_run.status != PayRunStatus::Approved && pay_run.status != PayRunStatus::Committed {
            return Err(CommitError::NotApproved(pay_run_id, pay_run.status));
        }
        if pay_run.has_error_employees() {
            return Err(CommitError::EmployeesInError(pay_run_id));
        }
        let lock_errors = LockingService::verify_locks_intact(pay_run_id, locked_time_entries, locked_adjustments);
        if !lock_errors.is_empty() {
            return Err(CommitError::LocksNotIntact(pay_run_id, lock_errors));
        }

        let already_committed = pay_run.status == PayRunStatus::Committed;
        let mut statements_committed = 0;
        let mut statements_existing = 0;
        let mut lines_inserted = 0;

        for pre in pay_run.employees.iter_mut().filter(|e| e.status == InclusionStatus::Included) {
            let Some(result) = calculation_results.results.get(&pre.employee_id) else {
                continue;
            };
            let CalculationResult::Success {
                calculation_id, gross, net, lines, ..
            } = result
            else {
                continue;
            };

            let statement = PayStatement {
                pay_statement_id: PayStatementId::new(),
                pay_run_employee_id: pre.pay_run_employee_id,
                check_date,
                calculation_id: calculation_id.clone(),
                gross: *gross,
                net_pay: *net,
                created_at: Utc::now(),
            };
            let (stored, inserted) = store.insert_statement_if_absent(statement).await;
            if inserted {
                statements_committed += 1;
            } else {
                statements_existing += 1;
                if stored.calculation_id != *calculation_id {
                    return Err(CommitError::CalculationMismatch {
                        pay_run_employee_id: pre.pay_run_employee_id,
                        existing_calculation_id: stored.calculation_id,
                        new_calculation_id: calculation_id.clone(),
                    });
                }
            }

            for line in lines {
                let item = PayLineItem {
                    pay_line_item_id: PayLineItemId::new(),
                    pay_statement_id: stored.pay_statement_id,
                    calculation_id: calculation_id.clone(),
                    line_hash: LineItemBuilder::compute_line_hash(line),
                    line_type: line.line_type,
                    amount: line.amount,
                    earning_code_id: line.earning_code_id,
                    deduction_code_id: line.deduction_code_id,
                    tax_agency_id: line.tax_agency_id,
                    jurisdiction_id: line.jurisdiction_id,
                    quantity: line.quantity,
                    rate: line.rate,
                    source_input_id: line.source_input_id,
                    rule_id: line.rule_id,
                    rule_version_id: line.rule_version_id,
                };
                if store.insert_line_if_absent(item).await {
                    lines_inserted += 1;
                }
            }

            pre.gross = *gross;
            pre.net = *net;
        }

        if !already_committed {
            pay_run.status = PayRunStatus::Committed;
            pay_run.committed_at = Some(Utc::now());
            store.save_pay_run(pay_run).await;

            events.publish(DomainEvent::PayRunCommitted {
                metadata: EventMetadata::new(tenant_id, None, "commit_service"),
                pay_run_id,
                statements_committed: statements_committed as u32,
                statements_existing: statements_existing as u32,
            });
        } else {
            store.save_pay_run(pay_run).await;
        }

        Ok(CommitSummary {
            statements_committed,
            statements_existing,
            lines_inserted,
        })
    }

    /// Recomputes a statement's net pay from its persisted lines (excluding
    /// `EMPLOYER_TAX`, which is not part of net) and compares it against the
    /// stored value. A read-only consistency check, not part of the commit
    /// write path (§4.4 supplement).
    pub async fn verify_statement_integrity(
        store: &(impl PayRunRepository + ?Sized),
        pay_run_employee_id: PayRunEmployeeId,
    ) -> (bool, Vec<String>) {
        let Some(statement) = store.statement_by_pay_run_employee(pay_run_employee_id).await else {
            return (false, vec![format!(
                "no statement found for pay-run-employee {pay_run_employee_id}"
            )]);
        };

        let lines = store.lines_for_statement(statement.pay_statement_id).await;
        let recomputed_net = crate::domain::value_objects::round_to_cents(
            lines
                .iter()
                .filter(|l| l.line_type != crate::calculators::types::LineType::EmployerTax)
                .map(|l| l.amount)
                .sum(),
        );

        let mut errors = Vec::new();
        if recomputed_net != statement.net_pay {
            errors.push(format!(
                "statement {} net_pay {} does not match recomputed net {} from {} lines",
                statement.pay_statement_id,
                statement.net_pay,
                recomputed_net,
                lines.len()
            ));
        }
        (errors.is_empty(), errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::types::LineType;
    use crate::domain::value_objects::{EmployeeId, LegalEntityId, PayPeriodId};
    use crate::domain::PayRunEmployee;
    use crate::store::memory::InMemoryStore;
    use rust_decimal_macros::dec;

    fn approved_run_with_one_employee() -> (PayRun, EmployeeId) {
        let employee_id = EmployeeId::new();
        let mut run = PayRun::new(PayRunId::new(), LegalEntityId::new(), PayPeriodId::new());
        run.status = PayRunStatus::Approved;
        run.employees.push(PayRunEmployee::new(PayRunEmployeeId::new(), run.pay_run_id, employee_id));
        (run, employee_id)
    }

    fn success_result(employee_id: EmployeeId) -> PayRunCalculationResult {
        let line = crate::calculators::types::LineCandidate {
            amount: dec!(100.00),
            ..crate::calculators::types::LineCandidate::blank(LineType::Earning)
        };
        let mut results = std::collections::BTreeMap::new();
        results.insert(
            employee_id,
            CalculationResult::Success {
                employee_id,
                calculation_id: "calc-1".to_string(),
                gross: dec!(100.00),
                net: dec!(100.00),
                lines: vec![line],
                inputs_fingerprint: "if-1".to_string(),
                rules_fingerprint: "rf-1".to_string(),
            },
        );
        PayRunCalculationResult { results }
    }

    #[tokio::test]
    async fn commits_included_employees_and_emits_once() {
        let store = InMemoryStore::new();
        let events = EventPublisher::new();
        let (run, employee_id) = approved_run_with_one_employee();
        let pay_run_id = run.pay_run_id;
        store.save_pay_run(run).await;
        let results = success_result(employee_id);

        let summary = CommitService::commit_all_statements(
            &store,
            &events,
            TenantId::new(),
            pay_run_id,
            chrono::NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            &[],
            &[],
            &results,
        )
        .await
        .unwrap();

        assert_eq!(summary.statements_committed, 1);
        assert_eq!(summary.lines_inserted, 1);
        let committed = store.get_pay_run(pay_run_id).await.unwrap();
        assert_eq!(committed.status, PayRunStatus::Committed);

        let events_logged = events.store.query(&Default::default());
        let commits = events_logged.iter().filter(|e| e.event_type() == "PayRunCommitted").count();
        assert_eq!(commits, 1);
    }

    #[tokio::test]
    async fn retried_commit_is_idempotent_and_does_not_re_emit() {
        let store = InMemoryStore::new();
        let events = EventPublisher::new();
        let (run, employee_id) = approved_run_with_one_employee();
        let pay_run_id = run.pay_run_id;
        store.save_pay_run(run).await;
        let results = success_result(employee_id);

        CommitService::commit_all_statements(
            &store,
            &events,
            TenantId::new(),
            pay_run_id,
            chrono::NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            &[],
            &[],
            &results,
        )
        .await
        .unwrap();

        let summary = CommitService::commit_all_statements(
            &store,
            &events,
            TenantId::new(),
            pay_run_id,
            chrono::NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            &[],
            &[],
            &results,
        )
        .await
        .unwrap();

        assert_eq!(summary.statements_committed, 0);
        assert_eq!(summary.statements_existing, 1);
        assert_eq!(summary.lines_inserted, 0);

        let events_logged = events.store.query(&Default::default());
        let commits = events_logged.iter().filter(|e| e.event_type() == "PayRunCommitted").count();
        assert_eq!(commits, 1);
    }

    #[tokio::test]
    async fn calculation_mismatch_is_rejected() {
        let store = InMemoryStore::new();
        let events = EventPublisher::new();
        let (run, employee_id) = approved_run_with_one_employee();
        let pay_run_id = run.pay_run_id;
        store.save_pay_run(run).await;
        let first = success_result(employee_id);

        CommitService::commit_all_statements(
            &store,
            &events,
            TenantId::new(),
            pay_run_id,
            chrono::NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            &[],
            &[],
            &first,
        )
        .await
        .unwrap();

        let mut second = first.clone();
        if let Some(CalculationResult::Success { calculation_id, .. }) = second.results.get_mut(&employee_id) {
            *calculation_id = "calc-2".to_string();
        }

        let err = CommitService::commit_all_statements(
            &store,
            &events,
            TenantId::new(),
            pay_run_id,
            chrono::NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            &[],
            &[],
            &second,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CommitError::CalculationMismatch { .. }));
    }

    #[tokio::test]
    async fn verify_statement_integrity_detects_net_drift() {
        let store = InMemoryStore::new();
        let events = EventPublisher::new();
        let (run, employee_id) = approved_run_with_one_employee();
        let pay_run_id = run.pay_run_id;
        let pay_run_employee_id = run.employees[0].pay_run_employee_id;
        store.save_pay_run(run).await;
        let results = success_result(employee_id);

        CommitService::commit_all_statements(
            &store,
            &events,
            TenantId::new(),
            pay_run_id,
            chrono::NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            &[],
            &[],
            &results,
        )
        .await
        .unwrap();

        let (is_valid, errors) = CommitService::verify_statement_integrity(&store, pay_run_employee_id).await;
        assert!(is_valid, "expected no drift, got {errors:?}");
    }

    #[tokio::test]
    async fn commit_fails_fast_when_advisory_lock_is_held() {
        let store = InMemoryStore::new();
        let events = EventPublisher::new();
        let (run, employee_id) = approved_run_with_one_employee();
        let pay_run_id = run.pay_run_id;
        store.save_pay_run(run).await;
        let results = success_result(employee_id);

        assert!(store.try_acquire(crate::store::advisory_lock_key(pay_run_id)).await);

        let err = CommitService::commit_all_statements(
            &store,
            &events,
            TenantId::new(),
            pay_run_id,
            chrono::NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            &[],
            &[],
            &results,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CommitError::LockContended(id) if id == pay_run_id));
    }
}
