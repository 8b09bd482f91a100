//! Rail provider interface and pure stub adapters (§4.9).
//!
//! Providers are pure: no persistence, no events, no cross-provider state.
//! Each stub below tracks only its own submissions, in memory, local to
//! that instance — two configured providers never see each other's writes,
//! and neither writes to the repository traits in `crate::store`.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::domain::aggregates::PaymentDirection;

/// What a provider supports, per rail and (for ACH) per direction (§4.9).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RailCapabilities {
    pub ach_credit: bool,
    pub ach_debit: bool,
    pub wire: bool,
    pub rtp: bool,
    pub fednow: bool,
    pub check: bool,
}

/// What the orchestrator hands a provider on submit (§4.9).
#[derive(Clone, Debug)]
pub struct InstructionPayload {
    pub payment_instruction_id: Uuid,
    pub idempotency_key: String,
    pub amount: Decimal,
    pub currency: String,
    pub direction: PaymentDirection,
    pub payee_reference: String,
    pub requested_settlement_date: Option<NaiveDate>,
}

#[derive(Clone, Debug)]
pub struct SubmitResult {
    pub provider_request_id: String,
    pub accepted: bool,
    pub message: String,
    pub trace_id: Option<String>,
    pub estimated_settlement_date: Option<NaiveDate>,
}

/// Status vocabulary a provider may report (§4.9). Named `RemoteStatus` to
/// distinguish it from `crate::domain::aggregates::AttemptStatus`, which is
/// the same set of values in the domain layer's own vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoteStatus {
    Created,
    Submitted,
    Accepted,
    Settled,
    Failed,
    Reversed,
    Returned,
    Unknown,
}

#[derive(Clone, Debug)]
pub struct StatusResult {
    pub status: RemoteStatus,
    pub message: String,
    pub external_trace_id: Option<String>,
    pub effective_date: Option<NaiveDate>,
    pub return_code: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CancelResult {
    pub success: bool,
    pub message: String,
    pub can_retry: bool,
}

/// One settlement record returned from `reconcile()` (§4.9, §4.10).
#[derive(Clone, Debug)]
pub struct SettlementRecord {
    pub external_trace_id: String,
    pub effective_date: Option<NaiveDate>,
    pub status: RemoteStatus,
    pub amount: Decimal,
    pub currency: String,
    pub direction: PaymentDirection,
    pub return_code: Option<String>,
    pub original_trace_id: Option<String>,
    pub raw_payload: serde_json::Value,
}

/// Required operations every rail adapter implements (§4.9).
#[async_trait]
pub trait RailProvider: Send + Sync {
    fn provider_name(&self) -> &str;
    fn capabilities(&self) -> RailCapabilities;
    async fn submit(&self, instruction: InstructionPayload) -> SubmitResult;
    async fn get_status(&self, provider_request_id: &str) -> StatusResult;
    async fn cancel(&self, provider_request_id: &str) -> CancelResult;
    async fn reconcile(&self, date: NaiveDate) -> Vec<SettlementRecord>;
}

struct Submission {
    instruction: InstructionPayload,
    trace_id: String,
    estimated_settlement: NaiveDate,
    status: RemoteStatus,
    return_code: Option<String>,
}

/// Development/testing-only ACH adapter. Real deployments swap this for a
/// NACHA file builder or bank API client behind the same trait — nothing
/// elsewhere in the crate depends on this being a stub.
pub struct AchStubProvider {
    auto_settle: bool,
    submitted: Mutex<HashMap<String, Submission>>,
}

impl AchStubProvider {
    pub fn new(auto_settle: bool) -> Self {
        Self {
            auto_settle,
            submitted: Mutex::new(HashMap::new()),
        }
    }

    /// Test hook: flips a prior submission straight to `settled`.
    pub fn simulate_settlement(&self, provider_request_id: &str, settlement_date: Option<NaiveDate>) {
        if let Some(s) = self.submitted.lock().unwrap().get_mut(provider_request_id) {
            s.status = RemoteStatus::Settled;
            if let Some(d) = settlement_date {
                s.estimated_settlement = d;
            }
        }
    }

    /// Test hook: flips a prior submission to `returned` with an ACH
    /// return code (R01-R99).
    pub fn simulate_return(&self, provider_request_id: &str, return_code: impl Into<String>) {
        if let Some(s) = self.submitted.lock().unwrap().get_mut(provider_request_id) {
            s.status = RemoteStatus::Returned;
            s.return_code = Some(return_code.into());
        }
    }
}

#[async_trait]
impl RailProvider for AchStubProvider {
    fn provider_name(&self) -> &str {
        "ach_stub"
    }

    fn capabilities(&self) -> RailCapabilities {
        RailCapabilities {
            ach_credit: true,
            ach_debit: true,
            ..Default::default()
        }
    }

    async fn submit(&self, instruction: InstructionPayload) -> SubmitResult {
        let short_id = instruction.payment_instruction_id.simple().to_string()[..8].to_uppercase();
        let trace_id = format!("ACHSTUB{}{}", Utc::now().format("%Y%m%d"), short_id);
        let provider_request_id = format!("ACHSTUB-{}", instruction.idempotency_key);
        let estimated_settlement = instruction
            .requested_settlement_date
            .unwrap_or_else(|| Utc::now().date_naive());
        let status = if self.auto_settle {
            RemoteStatus::Settled
        } else {
            RemoteStatus::Accepted
        };

        self.submitted.lock().unwrap().insert(
            provider_request_id.clone(),
            Submission {
                instruction,
                trace_id: trace_id.clone(),
                estimated_settlement,
                status,
                return_code: None,
            },
        );

        SubmitResult {
            provider_request_id,
            accepted: true,
            message: "ACH stub accepted".to_string(),
            trace_id: Some(trace_id),
            estimated_settlement_date: Some(estimated_settlement),
        }
    }

    async fn get_status(&self, provider_request_id: &str) -> StatusResult {
        match self.submitted.lock().unwrap().get(provider_request_id) {
            Some(s) => StatusResult {
                status: s.status,
                message: "ACH stub status".to_string(),
                external_trace_id: Some(s.trace_id.clone()),
                effective_date: Some(s.estimated_settlement),
                return_code: s.return_code.clone(),
            },
            None => StatusResult {
                status: RemoteStatus::Unknown,
                message: format!("payment {provider_request_id} not found"),
                external_trace_id: None,
                effective_date: None,
                return_code: None,
            },
        }
    }

    async fn cancel(&self, provider_request_id: &str) -> CancelResult {
        let mut submitted = self.submitted.lock().unwrap();
        let Some(s) = submitted.get_mut(provider_request_id) else {
            return CancelResult {
                success: false,
                message: format!("payment {provider_request_id} not found"),
                can_retry: false,
            };
        };
        // Real ACH has very limited cancellation windows; standard ACH
        // typically cannot be cancelled once submitted at all.
        if matches!(s.status, RemoteStatus::Settled | RemoteStatus::Failed) {
            return CancelResult {
                success: false,
                message: "cannot cancel a settled or failed payment".to_string(),
                can_retry: false,
            };
        }
        s.status = RemoteStatus::Unknown;
        CancelResult {
            success: true,
            message: "ACH stub canceled".to_string(),
            can_retry: false,
        }
    }

    async fn reconcile(&self, date: NaiveDate) -> Vec<SettlementRecord> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, s)| s.estimated_settlement <= date)
            .map(|(req_id, s)| SettlementRecord {
                external_trace_id: s.trace_id.clone(),
                effective_date: Some(date),
                status: s.status,
                amount: s.instruction.amount,
                currency: s.instruction.currency.clone(),
                direction: s.instruction.direction,
                return_code: s.return_code.clone(),
                original_trace_id: None,
                raw_payload: serde_json::json!({ "provider_request_id": req_id }),
            })
            .collect()
    }
}

/// Development/testing-only FedNow adapter. FedNow settles near-instantly,
/// unlike ACH's T+1/T+2 windows, and enforces a flat per-transaction limit.
pub struct FedNowStubProvider {
    auto_settle: bool,
    submitted: Mutex<HashMap<String, Submission>>,
}

const FEDNOW_MAX_AMOUNT: Decimal = Decimal::from_parts(500_000, 0, 0, false, 0);

impl FedNowStubProvider {
    pub fn new(auto_settle: bool) -> Self {
        Self {
            auto_settle,
            submitted: Mutex::new(HashMap::new()),
        }
    }

    /// Test hook: flips a prior submission to `failed` with a reject reason.
    pub fn simulate_reject(&self, provider_request_id: &str, reason: impl Into<String>) {
        if let Some(s) = self.submitted.lock().unwrap().get_mut(provider_request_id) {
            s.status = RemoteStatus::Failed;
            s.return_code = Some(reason.into());
        }
    }
}

#[async_trait]
impl RailProvider for FedNowStubProvider {
    fn provider_name(&self) -> &str {
        "fednow_stub"
    }

    fn capabilities(&self) -> RailCapabilities {
        RailCapabilities {
            fednow: true,
            ..Default::default()
        }
    }

    async fn submit(&self, instruction: InstructionPayload) -> SubmitResult {
        let provider_request_id = format!("FEDNOW-{}", instruction.idempotency_key);
        if instruction.amount > FEDNOW_MAX_AMOUNT {
            return SubmitResult {
                provider_request_id,
                accepted: false,
                message: "FedNow limit exceeded: max $500,000 per transaction".to_string(),
                trace_id: None,
                estimated_settlement_date: None,
            };
        }

        let message_id = format!("FEDNOW{}", Uuid::new_v4().simple().to_string()[..20].to_uppercase());
        let settlement_date = Utc::now().date_naive();
        let status = if self.auto_settle {
            RemoteStatus::Settled
        } else {
            RemoteStatus::Accepted
        };

        self.submitted.lock().unwrap().insert(
            provider_request_id.clone(),
            Submission {
                instruction,
                trace_id: message_id.clone(),
                estimated_settlement: settlement_date,
                status,
                return_code: None,
            },
        );

        SubmitResult {
            provider_request_id,
            accepted: true,
            message: "FedNow stub accepted - instant settlement".to_string(),
            trace_id: Some(message_id),
            estimated_settlement_date: Some(settlement_date),
        }
    }

    async fn get_status(&self, provider_request_id: &str) -> StatusResult {
        match self.submitted.lock().unwrap().get(provider_request_id) {
            Some(s) => StatusResult {
                status: s.status,
                message: "FedNow stub status".to_string(),
                external_trace_id: Some(s.trace_id.clone()),
                effective_date: Some(s.estimated_settlement),
                return_code: s.return_code.clone(),
            },
            None => StatusResult {
                status: RemoteStatus::Unknown,
                message: format!("payment {provider_request_id} not found"),
                external_trace_id: None,
                effective_date: None,
                return_code: None,
            },
        }
    }

    async fn cancel(&self, provider_request_id: &str) -> CancelResult {
        let submitted = self.submitted.lock().unwrap();
        match submitted.get(provider_request_id) {
            Some(s) if s.status == RemoteStatus::Settled => CancelResult {
                success: false,
                message: "FedNow payments cannot be cancelled after settlement; use the recall process".to_string(),
                can_retry: false,
            },
            Some(_) => CancelResult {
                success: false,
                message: "FedNow payments settle instantly and cannot be cancelled".to_string(),
                can_retry: false,
            },
            None => CancelResult {
                success: false,
                message: format!("payment {provider_request_id} not found"),
                can_retry: false,
            },
        }
    }

    async fn reconcile(&self, date: NaiveDate) -> Vec<SettlementRecord> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, s)| s.estimated_settlement <= date)
            .map(|(req_id, s)| SettlementRecord {
                external_trace_id: s.trace_id.clone(),
                effective_date: Some(date),
                status: s.status,
                amount: s.instruction.amount,
                currency: s.instruction.currency.clone(),
                direction: s.instruction.direction,
                return_code: s.return_code.clone(),
                original_trace_id: None,
                raw_payload: serde_json::json!({ "provider_request_id": req_id }),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(amount: Decimal) -> InstructionPayload {
        InstructionPayload {
            payment_instruction_id: Uuid::new_v4(),
            idempotency_key: "idem-1".to_string(),
            amount,
            currency: "USD".to_string(),
            direction: PaymentDirection::Credit,
            payee_reference: "employee-1".to_string(),
            requested_settlement_date: None,
        }
    }

    #[tokio::test]
    async fn ach_stub_submits_and_reports_status() {
        let provider = AchStubProvider::new(true);
        let result = provider.submit(payload(Decimal::new(10000, 2))).await;
        assert!(result.accepted);
        let status = provider.get_status(&result.provider_request_id).await;
        assert_eq!(status.status, RemoteStatus::Settled);
    }

    #[tokio::test]
    async fn ach_stub_cancel_fails_once_settled() {
        let provider = AchStubProvider::new(true);
        let result = provider.submit(payload(Decimal::new(10000, 2))).await;
        let cancel = provider.cancel(&result.provider_request_id).await;
        assert!(!cancel.success);
    }

    #[tokio::test]
    async fn fednow_stub_rejects_over_limit_amount() {
        let provider = FedNowStubProvider::new(true);
        let result = provider.submit(payload(Decimal::new(600_000_00, 2))).await;
        assert!(!result.accepted);
    }

    #[tokio::test]
    async fn fednow_stub_settles_instantly() {
        let provider = FedNowStubProvider::new(true);
        let result = provider.submit(payload(Decimal::new(10000, 2))).await;
        assert!(result.accepted);
        let status = provider.get_status(&result.provider_request_id).await;
        assert_eq!(status.status, RemoteStatus::Settled);
    }
}
