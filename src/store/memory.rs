//! In-process reference implementation of the repository traits, built on
//! `dashmap`. This is the "one concrete implementation" named in §6 — it
//! satisfies every uniqueness constraint in §3 without a SQL schema, which
//! this crate treats as an external collaborator.

use super::{AdvisoryLock, EventStoreRepository, LedgerRepository, PayRunRepository, PaymentRepository};
use crate::domain::aggregates::{
    AccountType, FundingGateEvaluation, LedgerAccount, LedgerEntry, PayInputAdjustment, PayLineItem,
    PayRun, PaymentAttempt, PaymentInstruction, PayStatement, Reservation, ReservationStatus,
    Settlement, TimeEntry,
};
use crate::domain::events::{DomainEvent, EventQuery, EventStore};
use crate::domain::value_objects::{
    BankAccountId, LedgerAccountId, LegalEntityId, PayInputAdjustmentId, PayPeriodId,
    PayRunEmployeeId, PayRunId, PayStatementId, PaymentInstructionId, ReservationId, TenantId,
    TimeEntryId,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Mutex;

/// Everything the demo binary and the test suite need, in one handle.
/// Fields are intentionally plain `DashMap`s rather than one monolithic
/// lock: each uniqueness constraint gets its own key->id index so inserts
/// stay O(1) and never contend across unrelated entities.
#[derive(Default)]
pub struct InMemoryStore {
    pay_runs: DashMap<PayRunId, PayRun>,
    time_entries: DashMap<TimeEntryId, TimeEntry>,
    adjustments: DashMap<PayInputAdjustmentId, PayInputAdjustment>,

    statement_by_pre: DashMap<PayRunEmployeeId, PayStatementId>,
    statements: DashMap<PayStatementId, PayStatement>,
    line_keys: DashMap<(PayStatementId, String, String), ()>,
    lines_by_statement: DashMap<PayStatementId, Vec<PayLineItem>>,

    ledger_accounts: DashMap<LedgerAccountId, LedgerAccount>,
    ledger_entries_by_key: DashMap<(TenantId, String), LedgerEntry>,
    ledger_entries_by_account: DashMap<LedgerAccountId, Vec<LedgerEntry>>,
    ledger_entries_by_id: DashMap<crate::domain::value_objects::LedgerEntryId, LedgerEntry>,
    reservations: DashMap<ReservationId, Reservation>,

    instructions_by_key: DashMap<(TenantId, String), PaymentInstructionId>,
    instructions: DashMap<PaymentInstructionId, PaymentInstruction>,
    attempts_by_key: DashMap<(String, String), PaymentAttempt>,
    attempts_by_instruction: DashMap<PaymentInstructionId, Vec<(String, String)>>,
    gate_evaluations_by_key: DashMap<(TenantId, String), FundingGateEvaluation>,
    settlements_by_key: DashMap<(BankAccountId, String), Settlement>,

    locks: Mutex<HashSet<u64>>,
    events: EventStore,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PayRunRepository for InMemoryStore {
    async fn get_pay_run(&self, pay_run_id: PayRunId) -> Option<PayRun> {
        self.pay_runs.get(&pay_run_id).map(|r| r.clone())
    }

    async fn save_pay_run(&self, pay_run: PayRun) {
        self.pay_runs.insert(pay_run.pay_run_id, pay_run);
    }

    async fn time_entries_in_period(
        &self,
        _legal_entity_id: LegalEntityId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<TimeEntry> {
        self.time_entries
            .iter()
            .filter(|e| e.work_date >= start && e.work_date <= end)
            .map(|e| e.clone())
            .collect()
    }

    async fn save_time_entry(&self, entry: TimeEntry) {
        self.time_entries.insert(entry.time_entry_id, entry);
    }

    async fn adjustments_targeting(
        &self,
        pay_run_id: PayRunId,
        pay_period_id: PayPeriodId,
    ) -> Vec<PayInputAdjustment> {
        self.adjustments
            .iter()
            .filter(|a| a.targets(pay_run_id, pay_period_id))
            .map(|a| a.clone())
            .collect()
    }

    async fn save_adjustment(&self, adjustment: PayInputAdjustment) {
        self.adjustments.insert(adjustment.pay_input_adjustment_id, adjustment);
    }

    async fn insert_statement_if_absent(&self, statement: PayStatement) -> (PayStatement, bool) {
        match self.statement_by_pre.entry(statement.pay_run_employee_id) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                let id = *existing.get();
                (self.statements.get(&id).unwrap().clone(), false)
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(statement.pay_statement_id);
                self.statements.insert(statement.pay_statement_id, statement.clone());
                (statement, true)
            }
        }
    }

    async fn statement_by_pay_run_employee(
        &self,
        pay_run_employee_id: PayRunEmployeeId,
    ) -> Option<PayStatement> {
        let id = *self.statement_by_pre.get(&pay_run_employee_id)?;
        self.statements.get(&id).map(|s| s.clone())
    }

    async fn insert_line_if_absent(&self, line: PayLineItem) -> bool {
        let key = (line.pay_statement_id, line.calculation_id.clone(), line.line_hash.clone());
        if self.line_keys.insert(key, ()).is_some() {
            return false;
        }
        self.lines_by_statement.entry(line.pay_statement_id).or_default().push(line);
        true
    }

    async fn lines_for_statement(&self, pay_statement_id: PayStatementId) -> Vec<PayLineItem> {
        self.lines_by_statement.get(&pay_statement_id).map(|l| l.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LedgerRepository for InMemoryStore {
    async fn get_account(&self, account_id: LedgerAccountId) -> Option<LedgerAccount> {
        self.ledger_accounts.get(&account_id).map(|a| a.clone())
    }

    async fn save_account(&self, account: LedgerAccount) {
        self.ledger_accounts.insert(account.ledger_account_id, account);
    }

    async fn accounts_by_type(
        &self,
        legal_entity_id: LegalEntityId,
        account_type: AccountType,
    ) -> Vec<LedgerAccount> {
        self.ledger_accounts
            .iter()
            .filter(|a| a.legal_entity_id == legal_entity_id && a.account_type == account_type)
            .map(|a| a.clone())
            .collect()
    }

    async fn insert_entry_if_absent(&self, entry: LedgerEntry) -> (LedgerEntry, bool) {
        let key = (entry.tenant_id, entry.idempotency_key.clone());
        if let Some(existing) = self.ledger_entries_by_key.get(&key) {
            return (existing.clone(), false);
        }
        self.ledger_entries_by_key.insert(key, entry.clone());
        self.ledger_entries_by_id.insert(entry.ledger_entry_id, entry.clone());
        self.ledger_entries_by_account
            .entry(entry.debit_account_id)
            .or_default()
            .push(entry.clone());
        self.ledger_entries_by_account
            .entry(entry.credit_account_id)
            .or_default()
            .push(entry.clone());
        (entry, true)
    }

    async fn entries_for_account(&self, account_id: LedgerAccountId) -> Vec<LedgerEntry> {
        self.ledger_entries_by_account.get(&account_id).map(|e| e.clone()).unwrap_or_default()
    }

    async fn get_entry(
        &self,
        entry_id: crate::domain::value_objects::LedgerEntryId,
    ) -> Option<LedgerEntry> {
        self.ledger_entries_by_id.get(&entry_id).map(|e| e.clone())
    }

    async fn create_reservation(&self, reservation: Reservation) {
        self.reservations.insert(reservation.reservation_id, reservation);
    }

    async fn get_reservation(&self, reservation_id: ReservationId) -> Option<Reservation> {
        self.reservations.get(&reservation_id).map(|r| r.clone())
    }

    async fn update_reservation_status(&self, reservation_id: ReservationId, status: ReservationStatus) {
        if let Some(mut r) = self.reservations.get_mut(&reservation_id) {
            r.status = status;
        }
    }

    async fn active_reservations_for_legal_entity(
        &self,
        legal_entity_id: LegalEntityId,
        now: DateTime<Utc>,
    ) -> Vec<Reservation> {
        self.reservations
            .iter()
            .filter(|r| r.legal_entity_id == legal_entity_id && !r.is_expired_as_of(now))
            .filter(|r| r.status == ReservationStatus::Active)
            .map(|r| r.clone())
            .collect()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn insert_instruction_if_absent(
        &self,
        instruction: PaymentInstruction,
    ) -> (PaymentInstruction, bool) {
        let key = (instruction.tenant_id, instruction.idempotency_key.clone());
        match self.instructions_by_key.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                let id = *existing.get();
                (self.instructions.get(&id).unwrap().clone(), false)
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(instruction.payment_instruction_id);
                self.instructions.insert(instruction.payment_instruction_id, instruction.clone());
                (instruction, true)
            }
        }
    }

    async fn get_instruction(&self, instruction_id: PaymentInstructionId) -> Option<PaymentInstruction> {
        self.instructions.get(&instruction_id).map(|i| i.clone())
    }

    async fn save_instruction(&self, instruction: PaymentInstruction) {
        self.instructions.insert(instruction.payment_instruction_id, instruction);
    }

    async fn instructions_for_legal_entity(&self, legal_entity_id: LegalEntityId) -> Vec<PaymentInstruction> {
        self.instructions
            .iter()
            .filter(|i| i.legal_entity_id == legal_entity_id)
            .map(|i| i.clone())
            .collect()
    }

    async fn insert_attempt_if_absent(&self, attempt: PaymentAttempt) -> (PaymentAttempt, bool) {
        let key = (attempt.provider.clone(), attempt.provider_request_id.clone());
        match self.attempts_by_key.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(existing) => (existing.get().clone(), false),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(attempt.clone());
                self.attempts_by_instruction
                    .entry(attempt.payment_instruction_id)
                    .or_default()
                    .push(key);
                (attempt, true)
            }
        }
    }

    async fn attempts_for_instruction(&self, instruction_id: PaymentInstructionId) -> Vec<PaymentAttempt> {
        let Some(keys) = self.attempts_by_instruction.get(&instruction_id) else {
            return Vec::new();
        };
        keys.iter().filter_map(|k| self.attempts_by_key.get(k).map(|a| a.clone())).collect()
    }

    async fn insert_gate_evaluation_if_absent(
        &self,
        evaluation: FundingGateEvaluation,
    ) -> (FundingGateEvaluation, bool) {
        let key = (evaluation.tenant_id, evaluation.idempotency_key.clone());
        match self.gate_evaluations_by_key.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(existing) => (existing.get().clone(), false),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(evaluation.clone());
                (evaluation, true)
            }
        }
    }

    async fn upsert_settlement(&self, settlement: Settlement) -> Settlement {
        let key = (settlement.bank_account_id, settlement.external_trace_id.clone());
        match self.settlements_by_key.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(mut existing) => {
                let current = existing.get_mut();
                current.status = settlement.status;
                current.effective_date = settlement.effective_date.or(current.effective_date);
                current.return_code = settlement.return_code.or(current.return_code.take());
                current.original_trace_id =
                    settlement.original_trace_id.or(current.original_trace_id.take());
                if let (serde_json::Value::Object(existing_obj), serde_json::Value::Object(new_obj)) =
                    (&mut current.raw_payload, &settlement.raw_payload)
                {
                    for (k, v) in new_obj {
                        existing_obj.insert(k.clone(), v.clone());
                    }
                } else {
                    current.raw_payload = settlement.raw_payload;
                }
                current.updated_at = settlement.updated_at;
                current.clone()
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(settlement.clone());
                settlement
            }
        }
    }

    async fn settlements_for_provider(&self, provider: &str, date: NaiveDate) -> Vec<Settlement> {
        self.settlements_by_key
            .iter()
            .filter(|s| s.provider == provider && s.effective_date == Some(date))
            .map(|s| s.clone())
            .collect()
    }
}

#[async_trait]
impl EventStoreRepository for InMemoryStore {
    async fn append(&self, event: DomainEvent) {
        self.events.append(event);
    }

    async fn query(&self, query: &EventQuery) -> Vec<DomainEvent> {
        self.events.query(query)
    }
}

#[async_trait]
impl AdvisoryLock for InMemoryStore {
    async fn try_acquire(&self, key: u64) -> bool {
        self.locks.lock().unwrap().insert(key)
    }

    async fn release(&self, key: u64) {
        self.locks.lock().unwrap().remove(&key);
    }
}
