//! Append-only double-entry ledger core (§4.6).
//!
//! Rows are never updated or deleted; corrections are new reversal entries
//! with debit/credit swapped. Idempotency is enforced by the store's
//! `(tenant_id, idempotency_key)` uniqueness, not by anything in this
//! module — `post_entry` just asks the repository to insert-or-return.

use crate::config::LedgerConfig;
use crate::domain::aggregates::{
    AccountType, LedgerAccount, LedgerEntry, Reservation, ReservationStatus,
};
use crate::domain::events::{Actor, DomainEvent, EventMetadata, EventPublisher};
use crate::domain::value_objects::{
    LedgerAccountId, LedgerEntryId, LegalEntityId, ReservationId, TenantId,
};
use crate::store::LedgerRepository;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("debit_account and credit_account must differ")]
    SameAccount,
    #[error("amount must be greater than zero, got {0}")]
    NonPositiveAmount(Decimal),
    #[error("reservation {0} not found")]
    ReservationNotFound(ReservationId),
    #[error("original ledger entry {0} not found")]
    EntryNotFound(LedgerEntryId),
}

/// `(available, reserved)` as defined in §4.6: `available` sums credits
/// minus debits on the account itself; `reserved` sums active reservations
/// scoped to the account's *legal entity*, not the individual account —
/// §4.6's formula resolves this explicitly even though a reservation's own
/// fields only name an account, not a legal entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Balance {
    pub available: Decimal,
    pub reserved: Decimal,
}

pub struct LedgerService;

impl LedgerService {
    /// Idempotent by `(tenant_id, idempotency_key)`. Returns the entry id
    /// whether this call inserted it or a prior call did (§4.6, P1).
    #[allow(clippy::too_many_arguments)]
    pub async fn post_entry(
        store: &(impl LedgerRepository + ?Sized),
        events: &EventPublisher,
        config: &LedgerConfig,
        tenant_id: TenantId,
        legal_entity_id: LegalEntityId,
        idempotency_key: impl Into<String>,
        entry_type: impl Into<String>,
        debit_account_id: LedgerAccountId,
        credit_account_id: LedgerAccountId,
        amount: Decimal,
        source_type: impl Into<String>,
        source_id: impl Into<String>,
        correlation_id: Option<Uuid>,
        metadata: Option<serde_json::Value>,
    ) -> Result<LedgerEntryId, LedgerError> {
        if debit_account_id == credit_account_id {
            return Err(LedgerError::SameAccount);
        }
        if amount <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveAmount(amount));
        }
        debug_assert!(config.require_balanced_entries, "a single entry is balanced by construction");

        let entry = LedgerEntry {
            ledger_entry_id: LedgerEntryId::new(),
            tenant_id,
            legal_entity_id,
            entry_type: entry_type.into(),
            debit_account_id,
            credit_account_id,
            amount,
            source_type: source_type.into(),
            source_id: source_id.into(),
            correlation_id,
            idempotency_key: idempotency_key.into(),
            metadata,
            created_at: Utc::now(),
        };

        let (stored, inserted) = store.insert_entry_if_absent(entry).await;
        if inserted {
            let meta = EventMetadata::new(tenant_id, correlation_id, "ledger_service").with_actor(Actor::System);
            events.publish(DomainEvent::LedgerEntryPosted {
                metadata: meta,
                entry_id: stored.ledger_entry_id.as_uuid(),
                debit_account_id: stored.debit_account_id.as_uuid(),
                credit_account_id: stored.credit_account_id.as_uuid(),
                amount: stored.amount,
            });
        }
        Ok(stored.ledger_entry_id)
    }

    /// Posts a new entry with debit/credit swapped, `entry_type = "reversal"`,
    /// referencing the original via `source_type`/`source_id` (§4.6).
    #[allow(clippy::too_many_arguments)]
    pub async fn reverse_entry(
        store: &(impl LedgerRepository + ?Sized),
        events: &EventPublisher,
        config: &LedgerConfig,
        tenant_id: TenantId,
        original_entry_id: LedgerEntryId,
        idempotency_key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Result<LedgerEntryId, LedgerError> {
        let reason = reason.into();
        let original = store
            .get_entry(original_entry_id)
            .await
            .ok_or(LedgerError::EntryNotFound(original_entry_id))?;

        let reversal_id = Self::post_entry(
            store,
            events,
            config,
            tenant_id,
            original.legal_entity_id,
            idempotency_key,
            "reversal",
            original.credit_account_id,
            original.debit_account_id,
            original.amount,
            "psp_ledger_entry",
            original_entry_id.to_string(),
            original.correlation_id,
            Some(serde_json::json!({ "reason": reason, "reverses": original_entry_id.to_string() })),
        )
        .await?;

        let meta = EventMetadata::new(tenant_id, original.correlation_id, "ledger_service");
        events.publish(DomainEvent::LedgerEntryReversed {
            metadata: meta,
            original_entry_id: original_entry_id.as_uuid(),
            reversal_entry_id: reversal_id.as_uuid(),
            reason,
        });
        Ok(reversal_id)
    }

    /// `available = Σcredits − Σdebits` on `account`; `reserved` = sum of
    /// active, unexpired reservations against the account's legal entity
    /// (§4.6).
    pub async fn balance(
        store: &(impl LedgerRepository + ?Sized),
        config: &LedgerConfig,
        account: &LedgerAccount,
        now: DateTime<Utc>,
    ) -> Balance {
        let entries = store.entries_for_account(account.ledger_account_id).await;
        let mut available = Decimal::ZERO;
        for entry in &entries {
            if entry.credit_account_id == account.ledger_account_id {
                available += entry.amount;
            }
            if entry.debit_account_id == account.ledger_account_id {
                available -= entry.amount;
            }
        }

        let reserved = if config.enable_reservations {
            store
                .active_reservations_for_legal_entity(account.legal_entity_id, now)
                .await
                .iter()
                .map(|r| r.amount)
                .sum()
        } else {
            Decimal::ZERO
        };

        Balance { available, reserved }
    }

    pub async fn create_reservation(
        store: &(impl LedgerRepository + ?Sized),
        events: &EventPublisher,
        tenant_id: TenantId,
        legal_entity_id: LegalEntityId,
        account_id: LedgerAccountId,
        amount: Decimal,
        ttl_hours: i64,
        source_type: impl Into<String>,
        source_id: impl Into<String>,
        correlation_id: Option<Uuid>,
    ) -> ReservationId {
        let reservation = Reservation {
            reservation_id: ReservationId::new(),
            tenant_id,
            legal_entity_id,
            account_id,
            amount,
            status: ReservationStatus::Active,
            source_type: source_type.into(),
            source_id: source_id.into(),
            correlation_id,
            created_at: Utc::now(),
            expires_at: Utc::now() + Duration::hours(ttl_hours),
        };
        store.create_reservation(reservation.clone()).await;

        let meta = EventMetadata::new(tenant_id, correlation_id, "ledger_service");
        events.publish(DomainEvent::ReservationCreated {
            metadata: meta,
            reservation_id: reservation.reservation_id.as_uuid(),
            account_id: reservation.account_id.as_uuid(),
            amount: reservation.amount,
        });
        reservation.reservation_id
    }

    pub async fn release_reservation(
        store: &(impl LedgerRepository + ?Sized),
        events: &EventPublisher,
        reservation_id: ReservationId,
        reason: impl Into<String>,
    ) -> Result<(), LedgerError> {
        let reservation = store
            .get_reservation(reservation_id)
            .await
            .ok_or(LedgerError::ReservationNotFound(reservation_id))?;
        store.update_reservation_status(reservation_id, ReservationStatus::Released).await;

        let reason = reason.into();
        let meta = EventMetadata::new(reservation.tenant_id, reservation.correlation_id, "ledger_service");
        events.publish(DomainEvent::ReservationReleased {
            metadata: meta,
            reservation_id: reservation_id.as_uuid(),
            reason,
        });
        Ok(())
    }

    pub async fn consume_reservation(
        store: &(impl LedgerRepository + ?Sized),
        reservation_id: ReservationId,
    ) -> Result<(), LedgerError> {
        store
            .get_reservation(reservation_id)
            .await
            .ok_or(LedgerError::ReservationNotFound(reservation_id))?;
        store.update_reservation_status(reservation_id, ReservationStatus::Consumed).await;
        Ok(())
    }
}

/// `account.account_type == ClientFundingClearing` shorthand used by the
/// funding gate.
pub fn is_client_funding_clearing(account: &LedgerAccount) -> bool {
    account.account_type == AccountType::ClientFundingClearing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::EventPublisher;
    use crate::domain::value_objects::{LegalEntityId, TenantId};
    use crate::store::memory::InMemoryStore;
    use rust_decimal_macros::dec;

    fn account(tenant_id: TenantId, legal_entity_id: LegalEntityId, account_type: AccountType) -> LedgerAccount {
        LedgerAccount {
            ledger_account_id: LedgerAccountId::new(),
            tenant_id,
            legal_entity_id,
            account_type,
            name: "test account".to_string(),
        }
    }

    #[tokio::test]
    async fn post_entry_is_idempotent_by_key() {
        let store = InMemoryStore::new();
        let events = EventPublisher::new();
        let config = LedgerConfig::default();
        let tenant_id = TenantId::new();
        let legal_entity_id = LegalEntityId::new();
        let debit = account(tenant_id, legal_entity_id, AccountType::ClientFundingClearing);
        let credit = account(tenant_id, legal_entity_id, AccountType::EmployeeNetPayable);

        let id1 = LedgerService::post_entry(
            &store, &events, &config, tenant_id, legal_entity_id, "post-1", "funding_received",
            debit.ledger_account_id, credit.ledger_account_id, dec!(100.00), "test", "src-1", None, None,
        )
        .await
        .unwrap();
        let id2 = LedgerService::post_entry(
            &store, &events, &config, tenant_id, legal_entity_id, "post-1", "funding_received",
            debit.ledger_account_id, credit.ledger_account_id, dec!(100.00), "test", "src-1", None, None,
        )
        .await
        .unwrap();

        assert_eq!(id1, id2);
        assert_eq!(store.entries_for_account(debit.ledger_account_id).await.len(), 1);
    }

    #[tokio::test]
    async fn same_account_debit_and_credit_is_rejected() {
        let store = InMemoryStore::new();
        let events = EventPublisher::new();
        let config = LedgerConfig::default();
        let tenant_id = TenantId::new();
        let legal_entity_id = LegalEntityId::new();
        let acct = account(tenant_id, legal_entity_id, AccountType::ClientFundingClearing);

        let err = LedgerService::post_entry(
            &store, &events, &config, tenant_id, legal_entity_id, "post-2", "funding_received",
            acct.ledger_account_id, acct.ledger_account_id, dec!(10.00), "test", "src-2", None, None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LedgerError::SameAccount));
    }

    #[tokio::test]
    async fn reverse_entry_swaps_debit_and_credit() {
        let store = InMemoryStore::new();
        let events = EventPublisher::new();
        let config = LedgerConfig::default();
        let tenant_id = TenantId::new();
        let legal_entity_id = LegalEntityId::new();
        let debit = account(tenant_id, legal_entity_id, AccountType::ClientFundingClearing);
        let credit = account(tenant_id, legal_entity_id, AccountType::EmployeeNetPayable);

        let entry_id = LedgerService::post_entry(
            &store, &events, &config, tenant_id, legal_entity_id, "post-3", "funding_received",
            debit.ledger_account_id, credit.ledger_account_id, dec!(500.00), "test", "src-3", None, None,
        )
        .await
        .unwrap();

        let reversal_id =
            LedgerService::reverse_entry(&store, &events, &config, tenant_id, entry_id, "rev-3", "duplicate funding")
                .await
                .unwrap();
        let reversal = store.get_entry(reversal_id).await.unwrap();
        assert_eq!(reversal.debit_account_id, credit.ledger_account_id);
        assert_eq!(reversal.credit_account_id, debit.ledger_account_id);
        assert_eq!(reversal.amount, dec!(500.00));

        let balance = LedgerService::balance(&store, &config, &debit, Utc::now()).await;
        assert_eq!(balance.available, dec!(0));
    }

    #[tokio::test]
    async fn reservation_reduces_available_balance() {
        let store = InMemoryStore::new();
        let events = EventPublisher::new();
        let config = LedgerConfig::default();
        let tenant_id = TenantId::new();
        let legal_entity_id = LegalEntityId::new();
        let debit = account(tenant_id, legal_entity_id, AccountType::ClientFundingClearing);
        let credit = account(tenant_id, legal_entity_id, AccountType::EmployeeNetPayable);

        LedgerService::post_entry(
            &store, &events, &config, tenant_id, legal_entity_id, "post-4", "funding_received",
            debit.ledger_account_id, credit.ledger_account_id, dec!(1000.00), "test", "src-4", None, None,
        )
        .await
        .unwrap();

        LedgerService::create_reservation(
            &store, &events, tenant_id, legal_entity_id, credit.ledger_account_id, dec!(200.00), 24, "test", "rsv-1", None,
        )
        .await;

        let balance = LedgerService::balance(&store, &config, &credit, Utc::now()).await;
        assert_eq!(balance.available, dec!(1000.00));
        assert_eq!(balance.reserved, dec!(200.00));
    }
}
