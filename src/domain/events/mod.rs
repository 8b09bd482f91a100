//! Domain event substrate (§4.11).
//!
//! Every notable state change across the calculation and PSP cores is
//! represented as an immutable, typed `DomainEvent`. Payloads are additive
//! only across schema versions (§9 P9): new fields may be appended, never
//! removed or renamed.

pub mod bus;
pub mod emitter;
pub mod store;

pub use bus::EventPublisher;
pub use emitter::{AsyncEventEmitter, EventEmitter};
pub use store::{EventQuery, EventStore};

use crate::domain::value_objects::{EmployeeId, EventId, PayRunId, TenantId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event categories used for routing and filtering (§4.11, §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Funding,
    Payment,
    Ledger,
    Settlement,
    Liability,
    Reconciliation,
    /// Pay-run lifecycle events. Not one of §6's six PSP categories — added
    /// because §4.4 step 6 requires emitting `PayRunCommitted` and the
    /// distilled spec's category list has nowhere else for it to live.
    Payroll,
}

/// Metadata attached to every domain event (§3, §4.11).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventMetadata {
    pub event_id: EventId,
    pub timestamp: DateTime<Utc>,
    pub tenant_id: TenantId,
    pub correlation_id: Uuid,
    pub causation_id: Option<Uuid>,
    pub actor: Actor,
    pub source: String,
    pub schema_version: u32,
}

/// Who or what triggered an event.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "actor_type", content = "actor_id")]
pub enum Actor {
    User(Uuid),
    System,
    Scheduler,
    Webhook,
}

impl EventMetadata {
    pub fn new(tenant_id: TenantId, correlation_id: Option<Uuid>, source: impl Into<String>) -> Self {
        Self {
            event_id: EventId::new(),
            timestamp: Utc::now(),
            tenant_id,
            correlation_id: correlation_id.unwrap_or_else(Uuid::new_v4),
            causation_id: None,
            actor: Actor::System,
            source: source.into(),
            schema_version: 1,
        }
    }

    pub fn caused_by(mut self, causation_id: Uuid) -> Self {
        self.causation_id = Some(causation_id);
        self
    }

    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = actor;
        self
    }
}

macro_rules! domain_events {
    (
        $(
            $category:ident => {
                $( $variant:ident { $( $field:ident : $ty:ty ),* $(,)? } ),* $(,)?
            }
        ),* $(,)?
    ) => {
        /// All domain events, one variant per canonical type from spec §6.
        #[derive(Clone, Debug, Serialize, Deserialize)]
        #[serde(tag = "event_type")]
        pub enum DomainEvent {
            $( $(
                $variant { metadata: EventMetadata, $( $field: $ty ),* },
            )* )*
        }

        impl DomainEvent {
            /// The event type name used for emitter routing (§4.11).
            pub fn event_type(&self) -> &'static str {
                match self {
                    $( $( DomainEvent::$variant { .. } => stringify!($variant), )* )*
                }
            }

            /// The event category used for emitter/store filtering (§4.11).
            pub fn category(&self) -> EventCategory {
                match self {
                    $( $( DomainEvent::$variant { .. } => EventCategory::$category, )* )*
                }
            }

            pub fn metadata(&self) -> &EventMetadata {
                match self {
                    $( $( DomainEvent::$variant { metadata, .. } => metadata, )* )*
                }
            }
        }
    };
}

domain_events! {
    Funding => {
        FundingRequested { pay_run_id: PayRunId, required: Decimal },
        FundingApproved { pay_run_id: PayRunId, required: Decimal, available: Decimal },
        FundingBlocked { pay_run_id: PayRunId, required: Decimal, available: Decimal, reasons: Vec<String> },
        FundingInsufficientFunds { pay_run_id: PayRunId, required: Decimal, available: Decimal },
    },
    Payment => {
        PaymentInstructionCreated { instruction_id: Uuid, amount: Decimal, employee_id: Option<EmployeeId> },
        PaymentSubmitted { instruction_id: Uuid, provider: String, provider_request_id: String },
        PaymentAccepted { instruction_id: Uuid, provider_request_id: String },
        PaymentSettled { instruction_id: Uuid, external_trace_id: String, effective_date: Option<chrono::NaiveDate> },
        PaymentFailed { instruction_id: Uuid, reason: String },
        PaymentReturned { instruction_id: Uuid, return_code: Option<String>, reason: String },
        PaymentCanceled { instruction_id: Uuid, reason: String },
    },
    Ledger => {
        LedgerEntryPosted { entry_id: Uuid, debit_account_id: Uuid, credit_account_id: Uuid, amount: Decimal },
        LedgerEntryReversed { original_entry_id: Uuid, reversal_entry_id: Uuid, reason: String },
        ReservationCreated { reservation_id: Uuid, account_id: Uuid, amount: Decimal },
        ReservationReleased { reservation_id: Uuid, reason: String },
    },
    Settlement => {
        SettlementReceived { external_trace_id: String, amount: Decimal, status: String },
        SettlementMatched { external_trace_id: String, instruction_id: Uuid },
        SettlementUnmatched { external_trace_id: String, reason: String },
        SettlementStatusChanged { external_trace_id: String, old_status: String, new_status: String },
    },
    Liability => {
        LiabilityClassified { instruction_id: Uuid, responsible_party: String, return_code: Option<String> },
        LiabilityRecoveryStarted { instruction_id: Uuid, recovery_path: String },
        LiabilityRecovered { instruction_id: Uuid, amount: Decimal },
        LiabilityWrittenOff { instruction_id: Uuid, amount: Decimal, reason: String },
    },
    Reconciliation => {
        ReconciliationStarted { provider: String, date: chrono::NaiveDate },
        ReconciliationCompleted { provider: String, date: chrono::NaiveDate, matched: u32, unmatched: u32 },
        ReconciliationFailed { provider: String, date: chrono::NaiveDate, reason: String },
    },
    Payroll => {
        PayRunCommitted { pay_run_id: PayRunId, statements_committed: u32, statements_existing: u32 },
    },
}
