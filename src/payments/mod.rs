//! Payment orchestration: instruction creation, provider dispatch, and
//! reconciliation (§4.8, §4.9, §4.10).

pub mod providers;
pub mod reconciliation;

use crate::config::ProviderConfig;
use crate::domain::aggregates::{
    AttemptStatus, InstructionStatus, PaymentAttempt, PaymentDirection, PaymentInstruction,
    PaymentPurpose, Rail,
};
use crate::domain::events::{Actor, DomainEvent, EventMetadata, EventPublisher};
use crate::domain::value_objects::{
    EmployeeId, LegalEntityId, PaymentAttemptId, PaymentInstructionId, TenantId,
};
use crate::store::PaymentRepository;
use chrono::{NaiveDate, Utc};
use providers::{InstructionPayload, RailProvider};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("payment instruction {0} not found")]
    InstructionNotFound(PaymentInstructionId),
    #[error("no configured provider supports rail {0:?} direction {1:?}")]
    NoProviderForRail(Rail, PaymentDirection),
}

/// A provider paired with the configuration that selects and tunes it —
/// `config.priority` breaks ties when more than one configured provider
/// supports the same rail and direction (§4.8).
pub struct ConfiguredProvider {
    pub config: ProviderConfig,
    pub provider: Arc<dyn RailProvider>,
}

pub struct PaymentOrchestrator;

impl PaymentOrchestrator {
    /// Idempotent by `(tenant_id, idempotency_key)`; initial status is
    /// always `created` (§3, §4.8).
    #[allow(clippy::too_many_arguments)]
    pub async fn create_instruction(
        store: &(impl PaymentRepository + ?Sized),
        events: &EventPublisher,
        tenant_id: TenantId,
        legal_entity_id: LegalEntityId,
        purpose: PaymentPurpose,
        direction: PaymentDirection,
        rail: Rail,
        amount: Decimal,
        currency: impl Into<String>,
        payee_reference: impl Into<String>,
        employee_id: Option<EmployeeId>,
        idempotency_key: impl Into<String>,
        source: impl Into<String>,
        requested_settlement_date: Option<NaiveDate>,
    ) -> PaymentInstruction {
        let instruction = PaymentInstruction {
            payment_instruction_id: PaymentInstructionId::new(),
            tenant_id,
            legal_entity_id,
            purpose,
            direction,
            rail,
            amount,
            currency: currency.into(),
            payee_reference: payee_reference.into(),
            employee_id,
            requested_settlement_date,
            idempotency_key: idempotency_key.into(),
            status: InstructionStatus::Created,
            source: source.into(),
            created_at: Utc::now(),
        };

        let (stored, inserted) = store.insert_instruction_if_absent(instruction).await;
        if inserted {
            let meta = EventMetadata::new(tenant_id, None, "payment_orchestrator").with_actor(Actor::System);
            events.publish(DomainEvent::PaymentInstructionCreated {
                metadata: meta,
                instruction_id: stored.payment_instruction_id.as_uuid(),
                amount: stored.amount,
                employee_id: stored.employee_id,
            });
        }
        stored
    }

    /// Selects a provider by matching the instruction's declared rail and
    /// direction against `capabilities()`, breaking ties by configured
    /// priority — not the source's `"ach" if ach_* else "fednow"` shortcut
    /// (§9 second Open Question) — then submits and records the attempt.
    /// Never silently leaves an instruction `accepted`: a rejected submit
    /// lands the instruction in `failed` (§7).
    pub async fn submit(
        store: &(impl PaymentRepository + ?Sized),
        events: &EventPublisher,
        providers: &[ConfiguredProvider],
        tenant_id: TenantId,
        instruction_id: PaymentInstructionId,
    ) -> Result<String, OrchestratorError> {
        let mut instruction = store
            .get_instruction(instruction_id)
            .await
            .ok_or(OrchestratorError::InstructionNotFound(instruction_id))?;

        let chosen = Self::select_provider(providers, instruction.rail, instruction.direction)
            .ok_or(OrchestratorError::NoProviderForRail(instruction.rail, instruction.direction))?;

        let payload = InstructionPayload {
            payment_instruction_id: instruction.payment_instruction_id.as_uuid(),
            idempotency_key: instruction.idempotency_key.clone(),
            amount: instruction.amount,
            currency: instruction.currency.clone(),
            direction: instruction.direction,
            payee_reference: instruction.payee_reference.clone(),
            requested_settlement_date: instruction.requested_settlement_date,
        };

        let result = chosen.provider.submit(payload).await;

        let attempt = PaymentAttempt {
            payment_attempt_id: PaymentAttemptId::new(),
            payment_instruction_id: instruction.payment_instruction_id,
            provider: chosen.provider.provider_name().to_string(),
            provider_request_id: result.provider_request_id.clone(),
            status: if result.accepted {
                AttemptStatus::Accepted
            } else {
                AttemptStatus::Failed
            },
            message: Some(result.message.clone()),
            external_trace_id: result.trace_id.clone(),
            effective_date: result.estimated_settlement_date,
            return_code: None,
            created_at: Utc::now(),
        };
        let (stored_attempt, attempt_inserted) = store.insert_attempt_if_absent(attempt).await;

        instruction.status = if result.accepted {
            InstructionStatus::Accepted
        } else {
            InstructionStatus::Failed
        };
        store.save_instruction(instruction.clone()).await;

        if attempt_inserted {
            let meta = EventMetadata::new(tenant_id, None, "payment_orchestrator").with_actor(Actor::System);
            events.publish(DomainEvent::PaymentSubmitted {
                metadata: meta.clone(),
                instruction_id: instruction.payment_instruction_id.as_uuid(),
                provider: stored_attempt.provider.clone(),
                provider_request_id: stored_attempt.provider_request_id.clone(),
            });
            if result.accepted {
                events.publish(DomainEvent::PaymentAccepted {
                    metadata: meta,
                    instruction_id: instruction.payment_instruction_id.as_uuid(),
                    provider_request_id: stored_attempt.provider_request_id.clone(),
                });
            } else {
                events.publish(DomainEvent::PaymentFailed {
                    metadata: meta,
                    instruction_id: instruction.payment_instruction_id.as_uuid(),
                    reason: result.message.clone(),
                });
            }
        }

        Ok(stored_attempt.provider_request_id)
    }

    fn select_provider(
        providers: &[ConfiguredProvider],
        rail: Rail,
        direction: PaymentDirection,
    ) -> Option<&ConfiguredProvider> {
        providers
            .iter()
            .filter(|p| Self::supports(&p.provider.capabilities(), rail, direction))
            .max_by_key(|p| p.config.priority)
    }

    fn supports(caps: &providers::RailCapabilities, rail: Rail, direction: PaymentDirection) -> bool {
        match rail {
            Rail::Ach => match direction {
                PaymentDirection::Credit => caps.ach_credit,
                PaymentDirection::Debit => caps.ach_debit,
            },
            Rail::Fednow => caps.fednow,
            Rail::Wire => caps.wire,
            Rail::Rtp => caps.rtp,
            Rail::Check => caps.check,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::domain::events::EventPublisher;
    use crate::store::memory::InMemoryStore;
    use providers::AchStubProvider;
    use rust_decimal_macros::dec;

    fn ach_provider(priority: i32) -> ConfiguredProvider {
        let mut config = ProviderConfig::new("ach_primary", crate::config::RailKind::Ach).unwrap();
        config.priority = priority;
        ConfiguredProvider { config, provider: Arc::new(AchStubProvider::new(false)) }
    }

    #[tokio::test]
    async fn create_instruction_is_idempotent_by_key() {
        let store = InMemoryStore::new();
        let events = EventPublisher::new();
        let tenant_id = TenantId::new();
        let legal_entity_id = LegalEntityId::new();

        let first = PaymentOrchestrator::create_instruction(
            &store, &events, tenant_id, legal_entity_id, PaymentPurpose::EmployeeNetPay,
            PaymentDirection::Credit, Rail::Ach, dec!(500.00), "USD", "payee-1", None,
            "instr-1", "commit_service", None,
        )
        .await;
        let second = PaymentOrchestrator::create_instruction(
            &store, &events, tenant_id, legal_entity_id, PaymentPurpose::EmployeeNetPay,
            PaymentDirection::Credit, Rail::Ach, dec!(999.00), "USD", "payee-1", None,
            "instr-1", "commit_service", None,
        )
        .await;

        assert_eq!(first.payment_instruction_id, second.payment_instruction_id);
        assert_eq!(second.amount, dec!(500.00));
        assert_eq!(store.instructions_for_legal_entity(legal_entity_id).await.len(), 1);
    }

    #[tokio::test]
    async fn submit_selects_matching_provider_and_records_attempt() {
        let store = InMemoryStore::new();
        let events = EventPublisher::new();
        let tenant_id = TenantId::new();
        let legal_entity_id = LegalEntityId::new();
        let providers = vec![ach_provider(10)];

        let instruction = PaymentOrchestrator::create_instruction(
            &store, &events, tenant_id, legal_entity_id, PaymentPurpose::EmployeeNetPay,
            PaymentDirection::Credit, Rail::Ach, dec!(250.00), "USD", "payee-2", None,
            "instr-2", "commit_service", None,
        )
        .await;

        let provider_request_id =
            PaymentOrchestrator::submit(&store, &events, &providers, tenant_id, instruction.payment_instruction_id)
                .await
                .unwrap();

        let updated = store.get_instruction(instruction.payment_instruction_id).await.unwrap();
        assert_eq!(updated.status, InstructionStatus::Accepted);
        let attempts = store.attempts_for_instruction(instruction.payment_instruction_id).await;
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].provider_request_id, provider_request_id);
    }

    #[tokio::test]
    async fn submit_fails_when_no_provider_supports_the_rail() {
        let store = InMemoryStore::new();
        let events = EventPublisher::new();
        let tenant_id = TenantId::new();
        let legal_entity_id = LegalEntityId::new();
        let providers = vec![ach_provider(10)];

        let instruction = PaymentOrchestrator::create_instruction(
            &store, &events, tenant_id, legal_entity_id, PaymentPurpose::EmployeeNetPay,
            PaymentDirection::Credit, Rail::Wire, dec!(250.00), "USD", "payee-3", None,
            "instr-3", "commit_service", None,
        )
        .await;

        let err =
            PaymentOrchestrator::submit(&store, &events, &providers, tenant_id, instruction.payment_instruction_id)
                .await
                .unwrap_err();
        assert!(matches!(err, OrchestratorError::NoProviderForRail(Rail::Wire, PaymentDirection::Credit)));
    }
}
