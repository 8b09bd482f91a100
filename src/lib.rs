//! Payroll calculation-and-commit pipeline plus a payment service provider
//! core: double-entry ledger, funding gate, payment rail orchestration, and
//! reconciliation.
//!
//! ## Modules
//!
//! - [`calculators`]: rate resolution, line-item building, the calculation
//!   engine.
//! - [`domain`]: typed ids, money, aggregates, and the event substrate.
//! - [`services`]: pay-run state machine, locking, and commit.
//! - [`ledger`]: append-only double-entry postings and reservations.
//! - [`funding`]: the pre-pay funding gate.
//! - [`payments`]: instruction orchestration, rail providers, reconciliation.
//! - [`liability`]: classification and recovery of returned payments.
//! - [`store`]: the persistence boundary and its in-memory reference impl.
//! - [`config`]: frozen, validated configuration for the above.

pub mod calculators;
pub mod config;
pub mod domain;
pub mod funding;
pub mod ledger;
pub mod liability;
pub mod payments;
pub mod services;
pub mod store;

pub use config::PspConfig;
pub use domain::events::DomainEvent;
pub use domain::value_objects::{EmployeeId, LegalEntityId, PayRunId, TenantId};
