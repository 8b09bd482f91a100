//! Ledger account, entry, and reservation entities (§3, §4.6).
//!
//! Entries are append-only: once posted, a [`LedgerEntry`] is never mutated
//! or deleted. Corrections are expressed as new entries with `entry_type =
//! "reversal"` and debit/credit swapped (§4.6).

use crate::domain::value_objects::{LedgerAccountId, LedgerEntryId, LegalEntityId, ReservationId, TenantId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Ledger account kind. `client_funding_clearing` is the account type the
/// funding gate sums over (§4.7).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccountType {
    ClientFundingClearing,
    EmployeeNetPayable,
    TaxLiability,
    EmployerTaxLiability,
    ReserveHold,
    Other(String),
}

#[derive(Clone, Debug)]
pub struct LedgerAccount {
    pub ledger_account_id: LedgerAccountId,
    pub tenant_id: TenantId,
    pub legal_entity_id: LegalEntityId,
    pub account_type: AccountType,
    pub name: String,
}

/// Append-only double-entry posting (§3, §4.6 I2).
#[derive(Clone, Debug)]
pub struct LedgerEntry {
    pub ledger_entry_id: LedgerEntryId,
    pub tenant_id: TenantId,
    pub legal_entity_id: LegalEntityId,
    pub entry_type: String,
    pub debit_account_id: LedgerAccountId,
    pub credit_account_id: LedgerAccountId,
    pub amount: Decimal,
    pub source_type: String,
    pub source_id: String,
    pub correlation_id: Option<Uuid>,
    pub idempotency_key: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReservationStatus {
    Active,
    Released,
    Consumed,
    Expired,
}

/// A hold against an account's availability that does not itself move money
/// (§3, §4.6).
#[derive(Clone, Debug)]
pub struct Reservation {
    pub reservation_id: ReservationId,
    pub tenant_id: TenantId,
    pub legal_entity_id: LegalEntityId,
    pub account_id: LedgerAccountId,
    pub amount: Decimal,
    pub status: ReservationStatus,
    pub source_type: String,
    pub source_id: String,
    pub correlation_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Reservation {
    /// A reservation lazily expires once its TTL has lapsed, even if no
    /// writer has yet flipped its status (SPEC_FULL.md supplement).
    pub fn is_expired_as_of(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Active && now >= self.expires_at
    }
}
