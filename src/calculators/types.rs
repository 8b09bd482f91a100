//! Shared calculation types (§3, §4.5, §9).

use crate::domain::value_objects::{
    DeductionCodeId, EarningCodeId, EmployeeId, GarnishmentOrderId, JurisdictionId, LegalEntityId,
    PayRunId, RuleId, RuleVersionId, TaxAgencyId,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Pay line item kind (§3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineType {
    Earning,
    Deduction,
    Tax,
    EmployerTax,
    Reimbursement,
    Rounding,
}

impl LineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Earning => "EARNING",
            Self::Deduction => "DEDUCTION",
            Self::Tax => "TAX",
            Self::EmployerTax => "EMPLOYER_TAX",
            Self::Reimbursement => "REIMBURSEMENT",
            Self::Rounding => "ROUNDING",
        }
    }
}

/// A candidate line item prior to persistence. Built exclusively through
/// [`crate::calculators::line_builder::LineItemBuilder`] constructors so sign
/// conventions are enforced in one place (§4.2).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LineCandidate {
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
    pub explanation: Option<String>,

    #[serde(default)]
    pub taxability_flags: BTreeMap<String, bool>,
}

impl LineCandidate {
    /// A zero-amount line of the given type with every optional field unset.
    /// Used as the base for `LineItemBuilder`'s struct-update constructors so
    /// each one only needs to name the fields it actually sets.
    pub fn blank(line_type: LineType) -> Self {
        Self {
            line_type,
            amount: Decimal::ZERO,
            earning_code_id: None,
            deduction_code_id: None,
            tax_agency_id: None,
            jurisdiction_id: None,
            quantity: None,
            rate: None,
            source_input_id: None,
            rule_id: None,
            rule_version_id: None,
            explanation: None,
            taxability_flags: BTreeMap::new(),
        }
    }
}

/// Taxable wages broken out by jurisdiction type (§4.5 step 5).
#[derive(Clone, Debug, Default)]
pub struct TaxableWages {
    pub federal: Decimal,
    pub state: BTreeMap<String, Decimal>,
    pub local: BTreeMap<String, Decimal>,
    pub social_security: Decimal,
    pub medicare: Decimal,
}

/// Per-employee working state threaded through the calculation pipeline
/// (§4.5).
#[derive(Clone, Debug)]
pub struct EmployeeCalculationContext {
    pub employee_id: EmployeeId,
    pub pay_run_id: PayRunId,
    pub as_of_date: NaiveDate,
    pub check_date: NaiveDate,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub legal_entity_id: LegalEntityId,

    pub gross: Decimal,
    pub net: Decimal,
    pub taxable_wages: TaxableWages,
    pub lines: Vec<LineCandidate>,
    pub errors: Vec<String>,
}

impl EmployeeCalculationContext {
    pub fn new(
        employee_id: EmployeeId,
        pay_run_id: PayRunId,
        legal_entity_id: LegalEntityId,
        as_of_date: NaiveDate,
        check_date: NaiveDate,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Self {
        Self {
            employee_id,
            pay_run_id,
            as_of_date,
            check_date,
            period_start,
            period_end,
            legal_entity_id,
            gross: Decimal::ZERO,
            net: Decimal::ZERO,
            taxable_wages: TaxableWages::default(),
            lines: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// One progressive-tax bracket (§4.5 step 6).
#[derive(Clone, Debug)]
pub struct TaxBracket {
    pub min_amount: Decimal,
    /// `None` means no upper limit.
    pub max_amount: Option<Decimal>,
    pub rate: Decimal,
    pub flat_amount: Decimal,
}

/// Tagged variant encoding of a tax rule's logic, per spec §9's guidance on
/// "dynamic typing around rule payloads": the original stores brackets as
/// free-form JSON, this crate encodes the two shapes the engine actually
/// interprets.
#[derive(Clone, Debug)]
pub enum TaxRulePayload {
    Bracketed {
        brackets: Vec<TaxBracket>,
        wage_base_limit: Option<Decimal>,
        is_employer: bool,
    },
    Flat {
        rate: Decimal,
        is_employer: bool,
    },
}

impl TaxRulePayload {
    pub fn is_employer(&self) -> bool {
        match self {
            Self::Bracketed { is_employer, .. } => *is_employer,
            Self::Flat { is_employer, .. } => *is_employer,
        }
    }
}

/// An effective-dated tax rule version for one (jurisdiction, tax type) pair
/// (§4.5 step 2, step 6-7).
#[derive(Clone, Debug)]
pub struct TaxRule {
    pub rule_id: RuleId,
    pub rule_version_id: RuleVersionId,
    pub jurisdiction_id: JurisdictionId,
    pub tax_agency_id: Option<TaxAgencyId>,
    pub tax_type: String,
    pub payload: TaxRulePayload,
    /// Content hash of the rule version's logic, used in the rules
    /// fingerprint (§4.5 step 2).
    pub logic_hash: String,
}

/// A pretax or post-tax deduction rule (§4.5 steps 4, 8).
#[derive(Clone, Debug)]
pub struct DeductionRule {
    pub deduction_code_id: DeductionCodeId,
    pub rule_id: RuleId,
    pub rule_version_id: RuleVersionId,
    pub is_pretax: bool,
    /// If `Some`, the deduction is this percent of gross (0-100 scale).
    pub percent_of_gross: Option<Decimal>,
    /// If `Some`, the deduction is this flat amount.
    pub flat_amount: Option<Decimal>,
    pub logic_hash: String,
}

/// An active wage garnishment order (§4.5 step 9).
#[derive(Clone, Debug)]
pub struct GarnishmentOrder {
    pub garnishment_order_id: GarnishmentOrderId,
    pub order_type: String,
    pub case_number: Option<String>,
    pub max_percent: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub priority: i32,
}
