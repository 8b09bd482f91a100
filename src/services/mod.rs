//! Pay-run orchestration services: state machine, locking, pay-run
//! mechanics, and commit (§4.3, §4.4). These sit one layer above the
//! calculation and PSP cores — they coordinate the aggregates and
//! repositories, but hold no business rules of their own beyond sequencing.

pub mod commit_service;
pub mod locking_service;
pub mod pay_run_service;
pub mod state_machine;

pub use commit_service::{CommitError, CommitService, CommitSummary};
pub use locking_service::LockingService;
pub use pay_run_service::PayRunService;
pub use state_machine::{InvalidTransition, PayRunStateMachine};
