//! Pulls settlement records from a rail provider and closes the loop back
//! to payment instructions (§4.10).
//!
//! Settlements are upserted idempotently by `(bank_account_id,
//! external_trace_id)`; matching an instruction is done by scanning its
//! recorded attempts for the same trace id, since that is the only link
//! the orchestrator leaves between a submission and what the provider
//! later reports for it.

use crate::config::LiabilityConfig;
use crate::domain::aggregates::{
    InstructionStatus, PaymentDirection, PaymentInstruction, Settlement, SettlementDirection,
    SettlementStatus,
};
use crate::domain::events::{Actor, DomainEvent, EventMetadata, EventPublisher};
use crate::domain::value_objects::{BankAccountId, LegalEntityId, SettlementId, TenantId};
use crate::liability::LiabilityService;
use crate::payments::providers::{RailProvider, RemoteStatus, SettlementRecord};
use crate::store::PaymentRepository;
use chrono::{NaiveDate, Utc};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationSummary {
    pub matched: u32,
    pub unmatched: u32,
}

pub struct ReconciliationService;

impl ReconciliationService {
    /// Runs one provider/date reconciliation pass: pull settlements, upsert
    /// them, then transition any matching instruction and emit the
    /// matching event (§4.10).
    #[allow(clippy::too_many_arguments)]
    pub async fn reconcile_provider(
        store: &(impl PaymentRepository + ?Sized),
        events: &EventPublisher,
        liability_config: &LiabilityConfig,
        tenant_id: TenantId,
        legal_entity_id: LegalEntityId,
        bank_account_id: BankAccountId,
        provider: &(dyn RailProvider),
        date: NaiveDate,
    ) -> ReconciliationSummary {
        let meta = EventMetadata::new(tenant_id, None, "reconciliation").with_actor(Actor::Scheduler);
        events.publish(DomainEvent::ReconciliationStarted {
            metadata: meta,
            provider: provider.provider_name().to_string(),
            date,
        });

        let records = provider.reconcile(date).await;
        let mut summary = ReconciliationSummary::default();

        for record in records {
            let settlement = Self::to_settlement(tenant_id, legal_entity_id, bank_account_id, provider.provider_name(), &record);
            let stored = store.upsert_settlement(settlement).await;

            let received_meta = EventMetadata::new(tenant_id, None, "reconciliation").with_actor(Actor::Scheduler);
            events.publish(DomainEvent::SettlementReceived {
                metadata: received_meta,
                external_trace_id: stored.external_trace_id.clone(),
                amount: stored.amount,
                status: format!("{:?}", stored.status),
            });

            match Self::match_instruction(store, legal_entity_id, &stored).await {
                Some(instruction) => {
                    summary.matched += 1;
                    let instruction_id = instruction.payment_instruction_id.as_uuid();
                    Self::apply_to_instruction(store, events, liability_config, tenant_id, instruction, &stored).await;

                    let matched_meta = EventMetadata::new(tenant_id, None, "reconciliation").with_actor(Actor::Scheduler);
                    events.publish(DomainEvent::SettlementMatched {
                        metadata: matched_meta,
                        external_trace_id: stored.external_trace_id.clone(),
                        instruction_id,
                    });
                }
                None => {
                    summary.unmatched += 1;
                    let unmatched_meta = EventMetadata::new(tenant_id, None, "reconciliation").with_actor(Actor::Scheduler);
                    events.publish(DomainEvent::SettlementUnmatched {
                        metadata: unmatched_meta,
                        external_trace_id: stored.external_trace_id.clone(),
                        reason: "no payment attempt references this trace id".to_string(),
                    });
                }
            }
        }

        let completed_meta = EventMetadata::new(tenant_id, None, "reconciliation").with_actor(Actor::Scheduler);
        events.publish(DomainEvent::ReconciliationCompleted {
            metadata: completed_meta,
            provider: provider.provider_name().to_string(),
            date,
            matched: summary.matched,
            unmatched: summary.unmatched,
        });

        summary
    }

    async fn match_instruction(
        store: &(impl PaymentRepository + ?Sized),
        legal_entity_id: LegalEntityId,
        settlement: &Settlement,
    ) -> Option<PaymentInstruction> {
        let instructions = store.instructions_for_legal_entity(legal_entity_id).await;
        for instruction in instructions {
            let attempts = store.attempts_for_instruction(instruction.payment_instruction_id).await;
            if attempts
                .iter()
                .any(|a| a.external_trace_id.as_deref() == Some(settlement.external_trace_id.as_str()))
            {
                return Some(instruction);
            }
        }
        None
    }

    async fn apply_to_instruction(
        store: &(impl PaymentRepository + ?Sized),
        events: &EventPublisher,
        liability_config: &LiabilityConfig,
        tenant_id: TenantId,
        mut instruction: PaymentInstruction,
        settlement: &Settlement,
    ) {
        let new_status = match settlement.status {
            SettlementStatus::Settled => InstructionStatus::Settled,
            SettlementStatus::Failed => InstructionStatus::Failed,
            SettlementStatus::Returned => InstructionStatus::Returned,
            SettlementStatus::Pending | SettlementStatus::Unknown => return,
        };
        if new_status == instruction.status {
            return;
        }
        instruction.status = new_status;
        let instruction_id = instruction.payment_instruction_id;
        store.save_instruction(instruction).await;

        let meta = EventMetadata::new(tenant_id, None, "reconciliation").with_actor(Actor::Scheduler);
        match new_status {
            InstructionStatus::Settled => {
                events.publish(DomainEvent::PaymentSettled {
                    metadata: meta,
                    instruction_id: instruction_id.as_uuid(),
                    external_trace_id: settlement.external_trace_id.clone(),
                    effective_date: settlement.effective_date,
                });
            }
            InstructionStatus::Failed => {
                events.publish(DomainEvent::PaymentFailed {
                    metadata: meta,
                    instruction_id: instruction_id.as_uuid(),
                    reason: format!("settlement reported failed status for {}", settlement.external_trace_id),
                });
            }
            InstructionStatus::Returned => {
                events.publish(DomainEvent::PaymentReturned {
                    metadata: meta,
                    instruction_id: instruction_id.as_uuid(),
                    return_code: settlement.return_code.clone(),
                    reason: format!("settlement returned for {}", settlement.external_trace_id),
                });
                LiabilityService::classify_and_emit(
                    liability_config,
                    events,
                    tenant_id,
                    instruction_id,
                    settlement.return_code.as_deref(),
                );
            }
            _ => {}
        }
    }

    fn to_settlement(
        tenant_id: TenantId,
        legal_entity_id: LegalEntityId,
        bank_account_id: BankAccountId,
        provider_name: &str,
        record: &SettlementRecord,
    ) -> Settlement {
        let now = Utc::now();
        Settlement {
            settlement_id: SettlementId::new(),
            tenant_id,
            legal_entity_id,
            bank_account_id,
            provider: provider_name.to_string(),
            external_trace_id: record.external_trace_id.clone(),
            direction: match record.direction {
                PaymentDirection::Credit => SettlementDirection::Outbound,
                PaymentDirection::Debit => SettlementDirection::Inbound,
            },
            status: match record.status {
                RemoteStatus::Settled => SettlementStatus::Settled,
                RemoteStatus::Failed => SettlementStatus::Failed,
                RemoteStatus::Returned => SettlementStatus::Returned,
                _ => SettlementStatus::Pending,
            },
            amount: record.amount,
            currency: record.currency.clone(),
            effective_date: record.effective_date,
            return_code: record.return_code.clone(),
            original_trace_id: record.original_trace_id.clone(),
            raw_payload: record.raw_payload.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}
