//! Payment instruction and attempt entities (§3, §4.8).
//!
//! `Rail` names the payment network an instruction is declared against,
//! independent of which providers a given deployment happens to configure
//! (that mapping lives in [`crate::config::RailKind`] and is resolved by
//! the orchestrator, not here — this module has no config dependency).

use crate::domain::value_objects::{
    EmployeeId, LegalEntityId, PaymentAttemptId, PaymentInstructionId, TenantId,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rail {
    Ach,
    Fednow,
    Wire,
    Rtp,
    Check,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentPurpose {
    EmployeeNetPay,
    TaxDeposit,
    ThirdPartyRemittance,
    Refund,
}

/// Which way money moves relative to the legal entity: `Credit` pushes
/// funds out to the payee, `Debit` pulls funds in from the payee.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentDirection {
    Credit,
    Debit,
}

/// §3, §4.8, §7: never silently `accepted` — a failed submit leaves the
/// instruction in `failed` or `created`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstructionStatus {
    Created,
    Accepted,
    Submitted,
    Failed,
    Settled,
    Returned,
    Canceled,
}

/// Owned by (tenant, legal_entity); unique on `(tenant_id, idempotency_key)`
/// (§3, §4.8).
#[derive(Clone, Debug)]
pub struct PaymentInstruction {
    pub payment_instruction_id: PaymentInstructionId,
    pub tenant_id: TenantId,
    pub legal_entity_id: LegalEntityId,
    pub purpose: PaymentPurpose,
    pub direction: PaymentDirection,
    pub rail: Rail,
    pub amount: Decimal,
    pub currency: String,
    pub payee_reference: String,
    pub employee_id: Option<EmployeeId>,
    pub requested_settlement_date: Option<NaiveDate>,
    pub idempotency_key: String,
    pub status: InstructionStatus,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

/// Mirrors [`crate::payments::providers::RemoteStatus`] in our own
/// vocabulary so the domain layer doesn't depend on the provider module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptStatus {
    Created,
    Submitted,
    Accepted,
    Settled,
    Failed,
    Reversed,
    Returned,
    Unknown,
}

/// Child of an instruction; unique on `(provider, provider_request_id)`
/// (§3, §4.8).
#[derive(Clone, Debug)]
pub struct PaymentAttempt {
    pub payment_attempt_id: PaymentAttemptId,
    pub payment_instruction_id: PaymentInstructionId,
    pub provider: String,
    pub provider_request_id: String,
    pub status: AttemptStatus,
    pub message: Option<String>,
    pub external_trace_id: Option<String>,
    pub effective_date: Option<NaiveDate>,
    pub return_code: Option<String>,
    pub created_at: DateTime<Utc>,
}
