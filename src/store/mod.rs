//! Persistence boundary (§6).
//!
//! The core treats storage as an external collaborator: a transactional
//! store exposing row-level uniqueness on the constraints named in §3, an
//! advisory-lock facility keyed by a 64-bit hash of a string, and CAS-style
//! conditional update-by-predicate. This module names that boundary as a
//! set of repository traits and ships one concrete implementation,
//! [`memory::InMemoryStore`], built on `dashmap`, standing in for an
//! out-of-scope SQL schema and migration runner.
//!
//! Every "insert if absent" method returns `(row, true)` when it performed
//! the insert and `(existing_row, false)` on an idempotent replay (§3 I3,
//! P1) — callers never need to re-fetch to find out which happened.

pub mod memory;

use crate::domain::aggregates::{
    FundingGateEvaluation, LedgerAccount, LedgerEntry, PayInputAdjustment, PayLineItem,
    PayRun, PaymentAttempt, PaymentInstruction, PayStatement, Reservation, ReservationStatus,
    Settlement, TimeEntry,
};
use crate::domain::events::{DomainEvent, EventQuery};
use crate::domain::value_objects::{
    LedgerAccountId, LegalEntityId, PayPeriodId, PayRunEmployeeId, PayRunId, PayStatementId,
    PaymentInstructionId, ReservationId,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

/// Calculation and pay-run-side persistence: runs, their staging inputs,
/// and the statements/line items the commit service produces (§3, §4.4).
#[async_trait]
pub trait PayRunRepository: Send + Sync {
    async fn get_pay_run(&self, pay_run_id: PayRunId) -> Option<PayRun>;
    async fn save_pay_run(&self, pay_run: PayRun);

    async fn time_entries_in_period(
        &self,
        legal_entity_id: LegalEntityId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<TimeEntry>;
    async fn save_time_entry(&self, entry: TimeEntry);

    async fn adjustments_targeting(
        &self,
        pay_run_id: PayRunId,
        pay_period_id: PayPeriodId,
    ) -> Vec<PayInputAdjustment>;
    async fn save_adjustment(&self, adjustment: PayInputAdjustment);

    /// Insert keyed by `pay_run_employee_id`; on conflict, return the
    /// existing statement without writing (§4.4 step 3a).
    async fn insert_statement_if_absent(&self, statement: PayStatement) -> (PayStatement, bool);
    async fn statement_by_pay_run_employee(
        &self,
        pay_run_employee_id: PayRunEmployeeId,
    ) -> Option<PayStatement>;

    /// Insert keyed by `(pay_statement_id, calculation_id, line_hash)`;
    /// conflicts are silently skipped (§4.4 step 3b).
    async fn insert_line_if_absent(&self, line: PayLineItem) -> bool;
    async fn lines_for_statement(&self, pay_statement_id: PayStatementId) -> Vec<PayLineItem>;
}

/// Append-only double-entry ledger storage (§3, §4.6).
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn get_account(&self, account_id: LedgerAccountId) -> Option<LedgerAccount>;
    async fn save_account(&self, account: LedgerAccount);
    async fn accounts_by_type(
        &self,
        legal_entity_id: LegalEntityId,
        account_type: crate::domain::aggregates::AccountType,
    ) -> Vec<LedgerAccount>;

    /// Insert keyed by `(tenant_id, idempotency_key)`; on conflict, return
    /// the existing entry without writing (§4.6, P1).
    async fn insert_entry_if_absent(&self, entry: LedgerEntry) -> (LedgerEntry, bool);
    async fn entries_for_account(&self, account_id: LedgerAccountId) -> Vec<LedgerEntry>;
    async fn get_entry(&self, entry_id: crate::domain::value_objects::LedgerEntryId) -> Option<LedgerEntry>;

    async fn create_reservation(&self, reservation: Reservation);
    async fn get_reservation(&self, reservation_id: ReservationId) -> Option<Reservation>;
    async fn update_reservation_status(&self, reservation_id: ReservationId, status: ReservationStatus);
    async fn active_reservations_for_legal_entity(
        &self,
        legal_entity_id: LegalEntityId,
        now: DateTime<Utc>,
    ) -> Vec<Reservation>;
}

/// Payment instructions/attempts, funding gate evaluations, and settlements
/// (§3, §4.7, §4.8, §4.10).
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Insert keyed by `(tenant_id, idempotency_key)` (§4.8).
    async fn insert_instruction_if_absent(
        &self,
        instruction: PaymentInstruction,
    ) -> (PaymentInstruction, bool);
    async fn get_instruction(&self, instruction_id: PaymentInstructionId) -> Option<PaymentInstruction>;
    async fn save_instruction(&self, instruction: PaymentInstruction);
    async fn instructions_for_legal_entity(&self, legal_entity_id: LegalEntityId) -> Vec<PaymentInstruction>;

    /// Insert keyed by `(provider, provider_request_id)` (§4.8).
    async fn insert_attempt_if_absent(&self, attempt: PaymentAttempt) -> (PaymentAttempt, bool);
    async fn attempts_for_instruction(&self, instruction_id: PaymentInstructionId) -> Vec<PaymentAttempt>;

    /// Insert keyed by `(tenant_id, idempotency_key)` (§4.7, S5).
    async fn insert_gate_evaluation_if_absent(
        &self,
        evaluation: FundingGateEvaluation,
    ) -> (FundingGateEvaluation, bool);

    /// Upsert keyed by `(bank_account_id, external_trace_id)`; on conflict,
    /// merge semantics apply (status replaced, raw payload merged,
    /// `effective_date` only advances) (§4.10).
    async fn upsert_settlement(&self, settlement: Settlement) -> Settlement;
    async fn settlements_for_provider(&self, provider: &str, date: NaiveDate) -> Vec<Settlement>;
}

/// Append-only event persistence, queryable by the filters in §4.11.
#[async_trait]
pub trait EventStoreRepository: Send + Sync {
    async fn append(&self, event: DomainEvent);
    async fn query(&self, query: &EventQuery) -> Vec<DomainEvent>;
}

/// Process-wide advisory lock keyed by a 64-bit hash of a string, e.g.
/// `hash(pay_run_id)` (§4.4 step 1, §5). Acquisition never blocks — a busy
/// lock fails fast so the caller can surface `LockContended` with a retry
/// hint (§7).
#[async_trait]
pub trait AdvisoryLock: Send + Sync {
    async fn try_acquire(&self, key: u64) -> bool;
    async fn release(&self, key: u64);
}

/// Deterministic 64-bit key for [`AdvisoryLock`], derived from any
/// `Display`-able identifier. `DefaultHasher::new()` is seeded with fixed
/// keys, so this is stable across calls within a process (it need not be
/// stable across processes — the lock itself is process-local).
pub fn advisory_lock_key(value: impl std::fmt::Display) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    value.to_string().hash(&mut hasher);
    hasher.finish()
}
