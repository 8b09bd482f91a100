//! Settlement entity persisted by reconciliation (§4.10).

use crate::domain::value_objects::{BankAccountId, LegalEntityId, SettlementId, TenantId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettlementDirection {
    Inbound,
    Outbound,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettlementStatus {
    Pending,
    Settled,
    Failed,
    Returned,
    Unknown,
}

/// One provider-reported settlement row, upserted by unique key
/// `(bank_account_id, external_trace_id)` (§4.10). On conflict, status is
/// replaced, `raw_payload` is merged (not overwritten), and `effective_date`
/// only ever advances.
#[derive(Clone, Debug)]
pub struct Settlement {
    pub settlement_id: SettlementId,
    pub tenant_id: TenantId,
    pub legal_entity_id: LegalEntityId,
    pub bank_account_id: BankAccountId,
    pub provider: String,
    pub external_trace_id: String,
    pub direction: SettlementDirection,
    pub status: SettlementStatus,
    pub amount: Decimal,
    pub currency: String,
    pub effective_date: Option<NaiveDate>,
    pub return_code: Option<String>,
    pub original_trace_id: Option<String>,
    pub raw_payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
