//! Typed identifiers.
//!
//! Every entity in §3 is keyed by a UUID, but different entities' UUIDs are
//! never interchangeable (a `PayRunId` passed where an `EmployeeId` is
//! expected is a bug). `define_id!` generates a zero-cost newtype around
//! `Uuid` per entity so the compiler catches that class of mistake.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

define_id!(TenantId);
define_id!(LegalEntityId);
define_id!(EmployeeId);
define_id!(EmploymentId);
define_id!(PayRateId);
define_id!(PayPeriodId);
define_id!(PayRunId);
define_id!(PayRunEmployeeId);
define_id!(TimeEntryId);
define_id!(PayInputAdjustmentId);
define_id!(PayStatementId);
define_id!(PayLineItemId);
define_id!(LedgerAccountId);
define_id!(LedgerEntryId);
define_id!(ReservationId);
define_id!(PaymentInstructionId);
define_id!(PaymentAttemptId);
define_id!(FundingGateEvaluationId);
define_id!(EventId);
define_id!(JobId);
define_id!(ProjectId);
define_id!(DepartmentId);
define_id!(WorksiteId);
define_id!(EarningCodeId);
define_id!(DeductionCodeId);
define_id!(TaxAgencyId);
define_id!(JurisdictionId);
define_id!(RuleId);
define_id!(RuleVersionId);
define_id!(GarnishmentOrderId);
define_id!(BankAccountId);
define_id!(SettlementId);
