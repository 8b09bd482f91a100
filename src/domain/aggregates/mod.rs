//! Aggregate roots and entities for the calculation and PSP cores (§3).

pub mod funding;
pub mod ledger;
pub mod pay_run;
pub mod payments;
pub mod settlement;
pub mod statement;
pub mod tenant;

pub use funding::{FundingGateEvaluation, GateOutcome, GateReason};
pub use ledger::{AccountType, LedgerAccount, LedgerEntry, Reservation, ReservationStatus};
pub use pay_run::{
    InclusionStatus, LockError, PayInputAdjustment, PayPeriod, PayRun, PayRunEmployee,
    PayRunStatus, TimeEntry,
};
pub use payments::{
    AttemptStatus, InstructionStatus, PaymentAttempt, PaymentDirection, PaymentInstruction,
    PaymentPurpose, Rail,
};
pub use settlement::{Settlement, SettlementDirection, SettlementStatus};
pub use statement::{PayLineItem, PayStatement};
pub use tenant::{Dimensions, Employment, FlsaStatus, LegalEntity, PayRateRecord, Tenant, WorkerType};
