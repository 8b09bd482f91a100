//! Funding gate evaluation entity (§3, §4.7).

use crate::domain::value_objects::{FundingGateEvaluationId, LegalEntityId, PayRunId, TenantId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateOutcome {
    Pass,
    SoftFail,
    HardFail,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GateReason {
    pub code: String,
    pub message: String,
}

/// Records outcome, required, available, and reasons; unique on
/// `(tenant_id, idempotency_key)` so re-evaluating with the same key never
/// inserts a second row (§3, S5).
#[derive(Clone, Debug)]
pub struct FundingGateEvaluation {
    pub funding_gate_evaluation_id: FundingGateEvaluationId,
    pub tenant_id: TenantId,
    pub legal_entity_id: LegalEntityId,
    pub pay_run_id: PayRunId,
    pub idempotency_key: String,
    pub outcome: GateOutcome,
    pub required: Decimal,
    pub available: Decimal,
    pub reasons: Vec<GateReason>,
    pub created_at: DateTime<Utc>,
}
