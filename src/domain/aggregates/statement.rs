//! Pay statement and line item entities (§3, §4.4, I4-I6).
//!
//! A statement is the immutable, per-pay-run-employee output of a commit;
//! a line item is one atomic component of it. Both are append-only once
//! committed — the commit service is the only writer, and it writes each
//! at most once per unique key.

use crate::calculators::types::LineType;
use crate::domain::value_objects::{
    DeductionCodeId, EarningCodeId, JurisdictionId, PayLineItemId, PayRunEmployeeId, PayStatementId,
    RuleId, RuleVersionId, TaxAgencyId,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// One committed pay-run-employee's output. Unique on `pay_run_employee_id`
/// (§4.4 step 3a); frozen once a line set has been persisted against it.
#[derive(Clone, Debug)]
pub struct PayStatement {
    pub pay_statement_id: PayStatementId,
    pub pay_run_employee_id: PayRunEmployeeId,
    pub check_date: NaiveDate,
    pub calculation_id: String,
    pub gross: Decimal,
    pub net_pay: Decimal,
    pub created_at: DateTime<Utc>,
}

/// One line of a [`PayStatement`]. Uniqueness is enforced on
/// `(pay_statement_id, calculation_id, line_hash)` so repeated commits of
/// identical results insert nothing new (§3, §4.4 step 3b).
#[derive(Clone, Debug)]
pub struct PayLineItem {
    pub pay_line_item_id: PayLineItemId,
    pub pay_statement_id: PayStatementId,
    pub calculation_id: String,
    pub line_hash: String,
    pub line_type: LineType,
    pub amount: Decimal,
    pub earning_code_id: Option<EarningCodeId>,
    pub deduction_code_id: Option<DeductionCodeId>,
    pub tax_agency_id: Option<TaxAgencyId>,
    pub jurisdiction_id: Option<JurisdictionId>,
    pub quantity: Option<Decimal>,
    pub rate: Option<Decimal>,
    pub source_input_id: Option<Uuid>,
    pub rule_id: Option<RuleId>,
    pub rule_version_id: Option<RuleVersionId>,
}
