//! Sign-correct line construction, canonical hashing, and aggregation (§4.2).
//!
//! Sign conventions (non-negotiable, §3 I5):
//! - EARNING / REIMBURSEMENT / EMPLOYER_TAX: non-negative
//! - DEDUCTION / TAX: non-positive
//! - ROUNDING: either sign
//!
//! Callers always pass magnitudes; the constructors below fix the sign.

use super::types::{LineCandidate, LineType};
use crate::domain::value_objects::{
    round_to_cents, DeductionCodeId, EarningCodeId, JurisdictionId, RuleId, RuleVersionId,
    TaxAgencyId,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use uuid::Uuid;

pub struct LineItemBuilder;

impl LineItemBuilder {
    pub fn round_to_cents(amount: Decimal) -> Decimal {
        round_to_cents(amount)
    }

    /// Canonical dict-then-hash construction matching the original
    /// implementation byte-for-byte in spirit: sorted keys, nulls included,
    /// amounts as 2dp strings (§4.2).
    fn canonical_json(line: &LineCandidate) -> Value {
        let opt_id = |id: &Option<Uuid>| id.map(|u| Value::String(u.to_string())).unwrap_or(Value::Null);
        json!({
            "line_type": line.line_type.as_str(),
            "earning_code_id": line.earning_code_id.map(|i| i.to_string()),
            "deduction_code_id": line.deduction_code_id.map(|i| i.to_string()),
            "tax_agency_id": line.tax_agency_id.map(|i| i.to_string()),
            "jurisdiction_id": line.jurisdiction_id.map(|i| i.to_string()),
            "source_input_id": opt_id(&line.source_input_id),
            "rule_id": line.rule_id.map(|i| i.to_string()),
            "rule_version_id": line.rule_version_id.map(|i| i.to_string()),
            "quantity": line.quantity.map(|q| q.to_string()),
            "rate": line.rate.map(|r| r.to_string()),
            "amount": crate::domain::value_objects::cents_string(line.amount),
        })
    }

    /// First 32 hex chars of SHA-256 over the canonical JSON object. Stable
    /// across processes and languages by construction (sorted keys, no
    /// floating-point serialization of amounts) (§4.2, P4).
    pub fn compute_line_hash(line: &LineCandidate) -> String {
        let canonical = Self::canonical_json(line);
        // serde_json::Value serializes object keys in insertion order; sort
        // explicitly so the hash is stable regardless of how `json!` built
        // the map.
        let sorted = Self::sort_object(&canonical);
        let json_str = serde_json::to_string(&sorted).expect("canonical line json");
        let digest = Sha256::digest(json_str.as_bytes());
        hex::encode(digest)[..32].to_string()
    }

    fn sort_object(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.iter().map(|(k, v)| (k.clone(), Self::sort_object(v))).collect();
                serde_json::to_value(sorted).expect("sorted map serializes")
            }
            other => other.clone(),
        }
    }

    pub fn create_earning_line(
        earning_code_id: EarningCodeId,
        amount: Decimal,
        quantity: Option<Decimal>,
        rate: Option<Decimal>,
        source_input_id: Option<Uuid>,
        explanation: Option<String>,
    ) -> LineCandidate {
        LineCandidate {
            line_type: LineType::Earning,
            amount: round_to_cents(amount.abs()),
            earning_code_id: Some(earning_code_id),
            quantity,
            rate,
            source_input_id,
            explanation,
            ..LineCandidate::blank(LineType::Earning)
        }
    }

    /// `deduction_code_id` is `None` for deduction lines with no catalog
    /// code of their own, e.g. garnishment withholding (§4.5 step 9).
    pub fn create_deduction_line(
        deduction_code_id: Option<DeductionCodeId>,
        amount: Decimal,
        rule_id: Option<RuleId>,
        rule_version_id: Option<RuleVersionId>,
        explanation: Option<String>,
    ) -> LineCandidate {
        LineCandidate {
            line_type: LineType::Deduction,
            amount: -round_to_cents(amount.abs()),
            deduction_code_id,
            rule_id,
            rule_version_id,
            explanation,
            ..LineCandidate::blank(LineType::Deduction)
        }
    }

    pub fn create_tax_line(
        jurisdiction_id: JurisdictionId,
        amount: Decimal,
        rule_id: RuleId,
        rule_version_id: RuleVersionId,
        tax_agency_id: Option<TaxAgencyId>,
        explanation: Option<String>,
    ) -> LineCandidate {
        LineCandidate {
            line_type: LineType::Tax,
            amount: -round_to_cents(amount.abs()),
            jurisdiction_id: Some(jurisdiction_id),
            tax_agency_id,
            rule_id: Some(rule_id),
            rule_version_id: Some(rule_version_id),
            explanation,
            ..LineCandidate::blank(LineType::Tax)
        }
    }

    pub fn create_employer_tax_line(
        jurisdiction_id: JurisdictionId,
        amount: Decimal,
        rule_id: RuleId,
        rule_version_id: RuleVersionId,
        tax_agency_id: Option<TaxAgencyId>,
        explanation: Option<String>,
    ) -> LineCandidate {
        LineCandidate {
            line_type: LineType::EmployerTax,
            amount: round_to_cents(amount.abs()),
            jurisdiction_id: Some(jurisdiction_id),
            tax_agency_id,
            rule_id: Some(rule_id),
            rule_version_id: Some(rule_version_id),
            explanation,
            ..LineCandidate::blank(LineType::EmployerTax)
        }
    }

    pub fn create_reimbursement_line(
        earning_code_id: EarningCodeId,
        amount: Decimal,
        source_input_id: Option<Uuid>,
        explanation: Option<String>,
    ) -> LineCandidate {
        LineCandidate {
            line_type: LineType::Reimbursement,
            amount: round_to_cents(amount.abs()),
            earning_code_id: Some(earning_code_id),
            source_input_id,
            explanation,
            ..LineCandidate::blank(LineType::Reimbursement)
        }
    }

    pub fn create_rounding_line(amount: Decimal) -> LineCandidate {
        LineCandidate {
            line_type: LineType::Rounding,
            amount: round_to_cents(amount),
            explanation: Some("Rounding adjustment".to_string()),
            ..LineCandidate::blank(LineType::Rounding)
        }
    }

    /// NET = sum of all lines except EMPLOYER_TAX (§4.2, §3 I6).
    pub fn calculate_net_from_lines(lines: &[LineCandidate]) -> Decimal {
        let net: Decimal = lines
            .iter()
            .filter(|l| l.line_type != LineType::EmployerTax)
            .map(|l| l.amount)
            .sum();
        round_to_cents(net)
    }

    /// GROSS = sum of EARNING + REIMBURSEMENT (§4.2, §3 I6).
    pub fn calculate_gross_from_lines(lines: &[LineCandidate]) -> Decimal {
        let gross: Decimal = lines
            .iter()
            .filter(|l| matches!(l.line_type, LineType::Earning | LineType::Reimbursement))
            .map(|l| l.amount)
            .sum();
        round_to_cents(gross)
    }

    /// If `expected_net` disagrees with the computed net, append a single
    /// ROUNDING line for the difference; otherwise leave `lines` untouched
    /// (§4.2).
    pub fn reconcile_rounding(lines: Vec<LineCandidate>, expected_net: Decimal) -> Vec<LineCandidate> {
        let calculated_net = Self::calculate_net_from_lines(&lines);
        let diff = round_to_cents(expected_net - calculated_net);
        if diff == Decimal::ZERO {
            return lines;
        }
        let mut lines = lines;
        lines.push(Self::create_rounding_line(diff));
        lines
    }

    /// Returns one message per line whose sign violates §3 I5; empty means
    /// all valid.
    pub fn validate_line_signs(lines: &[LineCandidate]) -> Vec<String> {
        let mut errors = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            match line.line_type {
                LineType::Earning | LineType::Reimbursement | LineType::EmployerTax => {
                    if line.amount < Decimal::ZERO {
                        errors.push(format!(
                            "Line {i} ({}) has negative amount {}, expected non-negative",
                            line.line_type.as_str(),
                            line.amount
                        ));
                    }
                }
                LineType::Deduction | LineType::Tax => {
                    if line.amount > Decimal::ZERO {
                        errors.push(format!(
                            "Line {i} ({}) has positive amount {}, expected non-positive",
                            line.line_type.as_str(),
                            line.amount
                        ));
                    }
                }
                LineType::Rounding => {}
            }
        }
        errors
    }

    pub fn sum_by_type(lines: &[LineCandidate]) -> BTreeMap<&'static str, Decimal> {
        let mut totals: BTreeMap<&'static str, Decimal> = BTreeMap::new();
        for lt in [
            LineType::Earning,
            LineType::Deduction,
            LineType::Tax,
            LineType::EmployerTax,
            LineType::Reimbursement,
            LineType::Rounding,
        ] {
            totals.insert(lt.as_str(), Decimal::ZERO);
        }
        for line in lines {
            *totals.entry(line.line_type.as_str()).or_insert(Decimal::ZERO) += line.amount;
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{DeductionCodeId, EarningCodeId};
    use rust_decimal_macros::dec;

    #[test]
    fn earning_line_is_forced_positive() {
        let line = LineItemBuilder::create_earning_line(
            EarningCodeId::new(),
            dec!(-100.00),
            Some(dec!(8)),
            Some(dec!(12.5)),
            None,
            None,
        );
        assert_eq!(line.amount, dec!(100.00));
    }

    #[test]
    fn deduction_line_is_forced_negative() {
        let line = LineItemBuilder::create_deduction_line(
            Some(DeductionCodeId::new()),
            dec!(50.00),
            None,
            None,
            None,
        );
        assert_eq!(line.amount, dec!(-50.00));
    }

    #[test]
    fn line_hash_is_stable_for_identical_inputs() {
        let code = EarningCodeId::new();
        let l1 = LineItemBuilder::create_earning_line(code, dec!(100.00), None, None, None, None);
        let l2 = LineItemBuilder::create_earning_line(code, dec!(100.00), None, None, None, None);
        assert_eq!(LineItemBuilder::compute_line_hash(&l1), LineItemBuilder::compute_line_hash(&l2));
        assert_eq!(LineItemBuilder::compute_line_hash(&l1).len(), 32);
    }

    #[test]
    fn line_hash_changes_with_amount() {
        let code = EarningCodeId::new();
        let l1 = LineItemBuilder::create_earning_line(code, dec!(100.00), None, None, None, None);
        let l2 = LineItemBuilder::create_earning_line(code, dec!(100.01), None, None, None, None);
        assert_ne!(LineItemBuilder::compute_line_hash(&l1), LineItemBuilder::compute_line_hash(&l2));
    }

    #[test]
    fn reconcile_rounding_is_a_no_op_when_balanced() {
        let lines = vec![LineItemBuilder::create_earning_line(
            EarningCodeId::new(),
            dec!(100.00),
            None,
            None,
            None,
            None,
        )];
        let reconciled = LineItemBuilder::reconcile_rounding(lines.clone(), dec!(100.00));
        assert_eq!(reconciled.len(), lines.len());
    }

    #[test]
    fn reconcile_rounding_appends_one_line_on_drift() {
        let lines = vec![LineItemBuilder::create_earning_line(
            EarningCodeId::new(),
            dec!(100.00),
            None,
            None,
            None,
            None,
        )];
        let reconciled = LineItemBuilder::reconcile_rounding(lines, dec!(100.01));
        assert_eq!(reconciled.len(), 2);
        assert_eq!(reconciled[1].line_type, LineType::Rounding);
        assert_eq!(reconciled[1].amount, dec!(0.01));
    }

    #[test]
    fn validate_line_signs_flags_violations() {
        let bad = LineCandidate {
            amount: dec!(-5.00),
            ..LineCandidate::blank(LineType::Earning)
        };
        let errors = LineItemBuilder::validate_line_signs(&[bad]);
        assert_eq!(errors.len(), 1);
    }
}
