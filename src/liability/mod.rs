//! Liability classification for returned payments (§4.10 supplement).
//!
//! When a settlement comes back with `returned` status, someone has to
//! eat the loss until it's recovered or written off. Classification looks
//! up the ACH/FedNow return code against the configured employer and
//! platform code sets; anything not in either set is `unclassified` and
//! needs a human to look at it.

use crate::domain::events::{Actor, DomainEvent, EventMetadata, EventPublisher};
use crate::domain::value_objects::{PaymentInstructionId, TenantId};
use crate::config::LiabilityConfig;
use rust_decimal::Decimal;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponsibleParty {
    Employer,
    Platform,
    Unclassified,
}

impl ResponsibleParty {
    fn as_str(&self) -> &'static str {
        match self {
            ResponsibleParty::Employer => "employer",
            ResponsibleParty::Platform => "platform",
            ResponsibleParty::Unclassified => "unclassified",
        }
    }
}

pub struct LiabilityService;

impl LiabilityService {
    /// Classifies a return code without side effects. A missing return
    /// code (e.g. a provider-side failure with no bank-issued reason) is
    /// always `unclassified`.
    pub fn classify(config: &LiabilityConfig, return_code: Option<&str>) -> ResponsibleParty {
        if !config.auto_classify {
            return ResponsibleParty::Unclassified;
        }
        let Some(code) = return_code else {
            return ResponsibleParty::Unclassified;
        };
        if config.employer_return_codes.iter().any(|c| c == code) {
            ResponsibleParty::Employer
        } else if config.platform_return_codes.iter().any(|c| c == code) {
            ResponsibleParty::Platform
        } else {
            ResponsibleParty::Unclassified
        }
    }

    /// Classifies and publishes `LiabilityClassified`. This is the entry
    /// point reconciliation calls when a settlement returns.
    pub fn classify_and_emit(
        config: &LiabilityConfig,
        events: &EventPublisher,
        tenant_id: TenantId,
        instruction_id: PaymentInstructionId,
        return_code: Option<&str>,
    ) -> ResponsibleParty {
        let party = Self::classify(config, return_code);
        let meta = EventMetadata::new(tenant_id, None, "liability").with_actor(Actor::System);
        events.publish(DomainEvent::LiabilityClassified {
            metadata: meta,
            instruction_id: instruction_id.as_uuid(),
            responsible_party: party.as_str().to_string(),
            return_code: return_code.map(|c| c.to_string()),
        });
        party
    }

    /// Opens a recovery case against the configured default recovery
    /// path (e.g. payroll deduction, collections, write-off review).
    pub fn start_recovery(
        config: &LiabilityConfig,
        events: &EventPublisher,
        tenant_id: TenantId,
        instruction_id: PaymentInstructionId,
    ) {
        let meta = EventMetadata::new(tenant_id, None, "liability").with_actor(Actor::System);
        events.publish(DomainEvent::LiabilityRecoveryStarted {
            metadata: meta,
            instruction_id: instruction_id.as_uuid(),
            recovery_path: config.default_recovery_path.clone(),
        });
    }

    pub fn mark_recovered(
        events: &EventPublisher,
        tenant_id: TenantId,
        instruction_id: PaymentInstructionId,
        amount: Decimal,
    ) {
        let meta = EventMetadata::new(tenant_id, None, "liability").with_actor(Actor::System);
        events.publish(DomainEvent::LiabilityRecovered {
            metadata: meta,
            instruction_id: instruction_id.as_uuid(),
            amount,
        });
    }

    pub fn write_off(
        events: &EventPublisher,
        tenant_id: TenantId,
        instruction_id: PaymentInstructionId,
        amount: Decimal,
        reason: impl Into<String>,
    ) {
        let meta = EventMetadata::new(tenant_id, None, "liability").with_actor(Actor::System);
        events.publish(DomainEvent::LiabilityWrittenOff {
            metadata: meta,
            instruction_id: instruction_id.as_uuid(),
            amount,
            reason: reason.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_employer_code() {
        let config = LiabilityConfig::default();
        assert_eq!(LiabilityService::classify(&config, Some("R01")), ResponsibleParty::Employer);
    }

    #[test]
    fn classifies_known_platform_code() {
        let config = LiabilityConfig::default();
        assert_eq!(LiabilityService::classify(&config, Some("R05")), ResponsibleParty::Platform);
    }

    #[test]
    fn falls_back_to_unclassified_for_unknown_code() {
        let config = LiabilityConfig::default();
        assert_eq!(LiabilityService::classify(&config, Some("R99")), ResponsibleParty::Unclassified);
        assert_eq!(LiabilityService::classify(&config, None), ResponsibleParty::Unclassified);
    }

    #[test]
    fn disabling_auto_classify_forces_unclassified() {
        let mut config = LiabilityConfig::default();
        config.auto_classify = false;
        assert_eq!(LiabilityService::classify(&config, Some("R01")), ResponsibleParty::Unclassified);
    }

    #[test]
    fn classify_and_emit_publishes_liability_classified() {
        let config = LiabilityConfig::default();
        let events = EventPublisher::new();
        let tenant_id = TenantId::new();
        let instruction_id = PaymentInstructionId::new();
        let party = LiabilityService::classify_and_emit(&config, &events, tenant_id, instruction_id, Some("R01"));
        assert_eq!(party, ResponsibleParty::Employer);
    }
}
