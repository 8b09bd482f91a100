//! Funding gate: commit-time and pay-time evaluations of whether cleared
//! funds cover what a pay run is about to move (§4.7).

use crate::config::{FundingGateConfig, FundingModel};
use crate::domain::aggregates::{
    AccountType, GateOutcome, GateReason, FundingGateEvaluation,
};
use crate::domain::events::{Actor, DomainEvent, EventMetadata, EventPublisher};
use crate::domain::value_objects::{FundingGateEvaluationId, LegalEntityId, PayRunId, TenantId};
use crate::store::{LedgerRepository, PaymentRepository};
use chrono::Utc;
use rust_decimal::Decimal;

/// The additive components that may feed into `required`, gated per
/// [`FundingModel`] (§4.7, §9 "Open question" — resolved here as the full
/// formula rather than the source's net-pay-only placeholder).
#[derive(Clone, Copy, Debug, Default)]
pub struct RequiredComponents {
    pub net_pay: Decimal,
    pub employee_taxes: Decimal,
    pub employer_taxes: Decimal,
    pub third_party_amounts: Decimal,
}

impl RequiredComponents {
    /// Employee taxes are withheld from net already in most models, so they
    /// only count separately under `prefund_all`, where the employer is
    /// funding the *gross* cash outflow (net + all taxes + remittances)
    /// rather than just what lands in employee bank accounts.
    fn total_for(&self, model: FundingModel) -> Decimal {
        match model {
            FundingModel::PrefundAll => {
                self.net_pay + self.employee_taxes + self.employer_taxes + self.third_party_amounts
            }
            FundingModel::NetPayOnly => self.net_pay,
            FundingModel::NetPlusTaxes => self.net_pay + self.employee_taxes + self.employer_taxes,
        }
    }
}

#[derive(Clone, Debug)]
pub struct GateResult {
    pub outcome: GateOutcome,
    pub required: Decimal,
    pub available: Decimal,
    pub reasons: Vec<GateReason>,
}

pub struct FundingGateService;

impl FundingGateService {
    /// `evaluate` persists idempotently by `(tenant, idempotency_key)` and
    /// emits the matching `Funding*` event on first evaluation only (a
    /// replay returns the stored result without re-emitting) (§4.7, S5).
    #[allow(clippy::too_many_arguments)]
    pub async fn evaluate(
        ledger_store: &(impl LedgerRepository + ?Sized),
        payment_store: &(impl PaymentRepository + ?Sized),
        events: &EventPublisher,
        config: &FundingGateConfig,
        tenant_id: TenantId,
        legal_entity_id: LegalEntityId,
        pay_run_id: PayRunId,
        components: RequiredComponents,
        idempotency_key: impl Into<String>,
        strict: bool,
    ) -> GateResult {
        let idempotency_key = idempotency_key.into();
        let required = components.total_for(config.default_model);

        let clearing_accounts = ledger_store
            .accounts_by_type(legal_entity_id, AccountType::ClientFundingClearing)
            .await;
        let now = Utc::now();
        let mut available = Decimal::ZERO;
        for account in &clearing_accounts {
            let entries = ledger_store.entries_for_account(account.ledger_account_id).await;
            for entry in &entries {
                if entry.credit_account_id == account.ledger_account_id {
                    available += entry.amount;
                }
                if entry.debit_account_id == account.ledger_account_id {
                    available -= entry.amount;
                }
            }
        }
        let reserved: Decimal = ledger_store
            .active_reservations_for_legal_entity(legal_entity_id, now)
            .await
            .iter()
            .map(|r| r.amount)
            .sum();
        available -= reserved;

        let mut reasons = Vec::new();
        let outcome = if available >= required {
            GateOutcome::Pass
        } else {
            reasons.push(GateReason {
                code: "INSUFFICIENT_FUNDS".to_string(),
                message: format!(
                    "Insufficient funds to proceed. Expected {required:.2} USD, available {available:.2} USD."
                ),
            });
            if strict {
                GateOutcome::HardFail
            } else {
                GateOutcome::SoftFail
            }
        };

        let evaluation = FundingGateEvaluation {
            funding_gate_evaluation_id: FundingGateEvaluationId::new(),
            tenant_id,
            legal_entity_id,
            pay_run_id,
            idempotency_key,
            outcome,
            required,
            available,
            reasons: reasons.clone(),
            created_at: now,
        };

        let (stored, inserted) = payment_store.insert_gate_evaluation_if_absent(evaluation).await;
        if inserted {
            Self::emit_outcome(events, tenant_id, pay_run_id, stored.outcome, stored.required, stored.available, reasons);
        }

        GateResult {
            outcome: stored.outcome,
            required: stored.required,
            available: stored.available,
            reasons: stored.reasons,
        }
    }

    fn emit_outcome(
        events: &EventPublisher,
        tenant_id: TenantId,
        pay_run_id: PayRunId,
        outcome: GateOutcome,
        required: Decimal,
        available: Decimal,
        reasons: Vec<GateReason>,
    ) {
        let meta = EventMetadata::new(tenant_id, None, "funding_gate").with_actor(Actor::System);
        events.publish(DomainEvent::FundingRequested { metadata: meta.clone(), pay_run_id, required });
        match outcome {
            GateOutcome::Pass => {
                events.publish(DomainEvent::FundingApproved {
                    metadata: meta,
                    pay_run_id,
                    required,
                    available,
                });
            }
            GateOutcome::SoftFail | GateOutcome::HardFail => {
                events.publish(DomainEvent::FundingBlocked {
                    metadata: meta.clone(),
                    pay_run_id,
                    required,
                    available,
                    reasons: reasons.into_iter().map(|r| r.message).collect(),
                });
                events.publish(DomainEvent::FundingInsufficientFunds {
                    metadata: meta,
                    pay_run_id,
                    required,
                    available,
                });
            }
        }
    }
}
