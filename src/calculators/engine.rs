//! Per-employee calculation pipeline and pay-run-level orchestration (§4.5).
//!
//! The engine is pure with respect to persistence: every input (time
//! entries, adjustments, rate candidates, rule versions, garnishments) is
//! passed in by the caller (the commit service), and every output is a
//! plain [`CalculationResult`]. Nothing here reads or writes a repository.

use crate::calculators::line_builder::LineItemBuilder;
use crate::calculators::rate_resolver::{RateNotFoundError, RateResolver};
use crate::calculators::types::{
    DeductionRule, EmployeeCalculationContext, GarnishmentOrder, LineCandidate, LineType, TaxRule,
    TaxRulePayload,
};
use crate::domain::value_objects::{round_internal, round_to_cents};
use crate::domain::{Dimensions, EmployeeId, LegalEntityId, PayRateRecord, PayRunId, TimeEntry};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Engine identity, carried through every `calculation_id` so that a change
/// in calculation semantics invalidates previously-computed IDs (§4.5 step
/// 11, §9).
#[derive(Clone, Debug)]
pub struct EngineContext {
    pub engine_version: String,
}

/// Everything the engine needs to calculate one employee's pay for one
/// period. All fields are caller-supplied snapshots; the engine never loads
/// anything itself (§5: calculation stages do not suspend).
#[derive(Clone, Debug)]
pub struct EmployeeCalculationInputs {
    pub employee_id: EmployeeId,
    pub pay_run_id: PayRunId,
    pub legal_entity_id: LegalEntityId,
    pub as_of_date: NaiveDate,
    pub check_date: NaiveDate,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,

    pub time_entries: Vec<TimeEntry>,
    pub adjustments: Vec<crate::domain::PayInputAdjustment>,
    pub rate_candidates: Vec<PayRateRecord>,
    pub pretax_deductions: Vec<DeductionRule>,
    pub posttax_deductions: Vec<DeductionRule>,
    pub tax_rules: Vec<TaxRule>,
    pub garnishments: Vec<GarnishmentOrder>,
}

/// Per-employee outcome. An `Error` variant means nothing was persisted for
/// this employee and the run-level error flag is set (§4.5 "Failure
/// policy").
#[derive(Clone, Debug)]
pub enum CalculationResult {
    Success {
        employee_id: EmployeeId,
        calculation_id: String,
        gross: Decimal,
        net: Decimal,
        lines: Vec<LineCandidate>,
        inputs_fingerprint: String,
        rules_fingerprint: String,
    },
    Error {
        employee_id: EmployeeId,
        errors: Vec<String>,
    },
}

impl CalculationResult {
    pub fn employee_id(&self) -> EmployeeId {
        match self {
            Self::Success { employee_id, .. } | Self::Error { employee_id, .. } => *employee_id,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Whole-run output: one result per included employee, keyed for the commit
/// service to look up by employee.
#[derive(Clone, Debug, Default)]
pub struct PayRunCalculationResult {
    pub results: BTreeMap<EmployeeId, CalculationResult>,
}

impl PayRunCalculationResult {
    pub fn has_errors(&self) -> bool {
        self.results.values().any(CalculationResult::is_error)
    }

    pub fn successes(&self) -> impl Iterator<Item = &CalculationResult> {
        self.results.values().filter(|r| !r.is_error())
    }
}

pub struct PayrollEngine;

impl PayrollEngine {
    pub fn calculate_pay_run(
        ctx: &EngineContext,
        employees: &[EmployeeCalculationInputs],
    ) -> PayRunCalculationResult {
        let mut results = BTreeMap::new();
        for inputs in employees {
            let result = Self::calculate_employee(ctx, inputs);
            results.insert(inputs.employee_id, result);
        }
        PayRunCalculationResult { results }
    }

    /// The twelve-step pipeline of §4.5, run for a single employee.
    pub fn calculate_employee(ctx: &EngineContext, inputs: &EmployeeCalculationInputs) -> CalculationResult {
        let mut cctx = EmployeeCalculationContext::new(
            inputs.employee_id,
            inputs.pay_run_id,
            inputs.legal_entity_id,
            inputs.as_of_date,
            inputs.check_date,
            inputs.period_start,
            inputs.period_end,
        );

        // 1. Inputs gather + fingerprint.
        let inputs_fingerprint = Self::inputs_fingerprint(inputs);

        // 2. Rules gather + fingerprint.
        let rules_fingerprint = Self::rules_fingerprint(&inputs.tax_rules, &inputs.pretax_deductions, &inputs.posttax_deductions);

        // 3. Earnings.
        let mut gross = Decimal::ZERO;
        for entry in &inputs.time_entries {
            let requested = Dimensions {
                job_id: entry.job_id,
                project_id: entry.project_id,
                department_id: entry.department_id,
                worksite_id: entry.worksite_id,
            };
            let rate = match RateResolver::resolve_rate_for_time_entry(
                inputs.employee_id,
                entry.rate_override,
                &requested,
                inputs.as_of_date,
                &inputs.rate_candidates,
            ) {
                Ok(rate) => rate,
                Err(err) => {
                    cctx.errors.push(Self::rate_not_found_message(&err));
                    continue;
                }
            };
            let amount = round_internal(entry.hours * rate);
            gross += amount;
            cctx.lines.push(LineItemBuilder::create_earning_line(
                crate::domain::value_objects::EarningCodeId::from_uuid(entry.time_entry_id.as_uuid()),
                amount,
                Some(entry.hours),
                Some(rate),
                Some(entry.time_entry_id.as_uuid()),
                None,
            ));
        }

        // Adjustments: positive amounts are treated as REIMBURSEMENT
        // (non-taxable, included in gross); negative amounts as a
        // plain post-tax DEDUCTION. Neither carries a catalog code — an
        // adjustment is its own record of what it represents
        // (SPEC_FULL.md supplement; the original leaves this unmodeled).
        for adj in &inputs.adjustments {
            if adj.amount >= Decimal::ZERO {
                gross += round_internal(adj.amount);
                cctx.lines.push(LineItemBuilder::create_reimbursement_line(
                    crate::domain::value_objects::EarningCodeId::from_uuid(
                        adj.pay_input_adjustment_id.as_uuid(),
                    ),
                    adj.amount,
                    Some(adj.pay_input_adjustment_id.as_uuid()),
                    Some(adj.description.clone()),
                ));
            } else {
                cctx.lines.push(LineItemBuilder::create_deduction_line(
                    None,
                    adj.amount.abs(),
                    None,
                    None,
                    Some(adj.description.clone()),
                ));
            }
        }

        if cctx.has_errors() {
            return CalculationResult::Error { employee_id: inputs.employee_id, errors: cctx.errors };
        }

        gross = round_internal(gross);
        cctx.gross = round_to_cents(gross);

        // 4. Pre-tax deductions.
        let mut pretax_total = Decimal::ZERO;
        for rule in &inputs.pretax_deductions {
            if !rule.is_pretax {
                continue;
            }
            let amount = Self::deduction_amount(rule, gross);
            pretax_total += round_internal(amount);
            cctx.lines.push(LineItemBuilder::create_deduction_line(
                Some(rule.deduction_code_id),
                amount,
                Some(rule.rule_id),
                Some(rule.rule_version_id),
                None,
            ));
        }

        // 5. Taxable wages: uniform subtraction across federal/SS/medicare
        // (§4.5 step 5 explicitly defers per-tax taxability tables).
        let taxable = round_internal(gross - pretax_total);
        cctx.taxable_wages.federal = taxable;
        cctx.taxable_wages.social_security = taxable;
        cctx.taxable_wages.medicare = taxable;

        // 6 & 7. Employee and employer taxes.
        for rule in &inputs.tax_rules {
            let taxable_for_rule = Self::taxable_for_tax_type(&cctx, &rule.tax_type);
            let capped = match Self::wage_base_limit(&rule.payload) {
                Some(limit) => taxable_for_rule.min(limit),
                None => taxable_for_rule,
            };
            let tax_amount = Self::apply_tax_payload(&rule.payload, capped);
            if tax_amount == Decimal::ZERO {
                continue;
            }
            cctx.taxable_wages
                .state
                .entry(rule.jurisdiction_id.to_string())
                .or_insert(Decimal::ZERO);
            if rule.payload.is_employer() {
                cctx.lines.push(LineItemBuilder::create_employer_tax_line(
                    rule.jurisdiction_id,
                    tax_amount,
                    rule.rule_id,
                    rule.rule_version_id,
                    rule.tax_agency_id,
                    Some(rule.tax_type.clone()),
                ));
            } else {
                cctx.lines.push(LineItemBuilder::create_tax_line(
                    rule.jurisdiction_id,
                    tax_amount,
                    rule.rule_id,
                    rule.rule_version_id,
                    rule.tax_agency_id,
                    Some(rule.tax_type.clone()),
                ));
            }
        }

        // 8. Post-tax deductions.
        for rule in &inputs.posttax_deductions {
            if rule.is_pretax {
                continue;
            }
            let amount = Self::deduction_amount(rule, gross);
            cctx.lines.push(LineItemBuilder::create_deduction_line(
                Some(rule.deduction_code_id),
                amount,
                Some(rule.rule_id),
                Some(rule.rule_version_id),
                None,
            ));
        }

        // 9. Garnishments: disposable excludes garnishment lines already
        // built (none yet at this point, since garnishments run last).
        let mut sorted_garnishments = inputs.garnishments.clone();
        sorted_garnishments.sort_by_key(|g| std::cmp::Reverse(g.priority));
        for order in &sorted_garnishments {
            let disposable = LineItemBuilder::calculate_net_from_lines(&cctx.lines);
            let by_percent = order
                .max_percent
                .map(|p| disposable * p / Decimal::ONE_HUNDRED)
                .unwrap_or(disposable);
            let mut allowed = match order.max_amount {
                Some(max) => by_percent.min(max),
                None => by_percent,
            };
            allowed = allowed.max(Decimal::ZERO);
            if allowed == Decimal::ZERO {
                continue;
            }
            cctx.lines.push(LineItemBuilder::create_deduction_line(
                None,
                allowed,
                None,
                None,
                Some(format!(
                    "Garnishment {} ({})",
                    order.garnishment_order_id,
                    order.case_number.clone().unwrap_or_else(|| order.order_type.clone())
                )),
            ));
        }

        // 10. Rounding reconciliation: compare the 2dp-rounded sum of all
        // lines against the expected net computed at internal precision.
        let expected_net_internal: Decimal = cctx
            .lines
            .iter()
            .filter(|l| l.line_type != LineType::EmployerTax)
            .map(|l| l.amount)
            .sum();
        let expected_net = round_to_cents(round_internal(expected_net_internal));
        cctx.lines = LineItemBuilder::reconcile_rounding(cctx.lines, expected_net);

        cctx.net = LineItemBuilder::calculate_net_from_lines(&cctx.lines);
        cctx.gross = LineItemBuilder::calculate_gross_from_lines(&cctx.lines);

        // 11. Calculation ID.
        let calculation_id = Self::calculation_id(
            &ctx.engine_version,
            inputs.pay_run_id,
            inputs.employee_id,
            inputs.as_of_date,
            &inputs_fingerprint,
            &rules_fingerprint,
        );

        // 12. Sign validation.
        let sign_errors = LineItemBuilder::validate_line_signs(&cctx.lines);
        if !sign_errors.is_empty() {
            return CalculationResult::Error { employee_id: inputs.employee_id, errors: sign_errors };
        }

        CalculationResult::Success {
            employee_id: inputs.employee_id,
            calculation_id,
            gross: cctx.gross,
            net: cctx.net,
            lines: cctx.lines,
            inputs_fingerprint,
            rules_fingerprint,
        }
    }

    fn rate_not_found_message(err: &RateNotFoundError) -> String {
        format!(
            "no matching pay rate found for employee {} on {} with dimensions {:?}",
            err.employee_id, err.as_of_date, err.dimensions
        )
    }

    fn deduction_amount(rule: &DeductionRule, gross: Decimal) -> Decimal {
        if let Some(flat) = rule.flat_amount {
            flat
        } else if let Some(percent) = rule.percent_of_gross {
            round_internal(gross * percent / Decimal::ONE_HUNDRED)
        } else {
            Decimal::ZERO
        }
    }

    fn taxable_for_tax_type(cctx: &EmployeeCalculationContext, tax_type: &str) -> Decimal {
        match tax_type {
            "social_security" => cctx.taxable_wages.social_security,
            "medicare" => cctx.taxable_wages.medicare,
            _ => cctx.taxable_wages.federal,
        }
    }

    fn wage_base_limit(payload: &TaxRulePayload) -> Option<Decimal> {
        match payload {
            TaxRulePayload::Bracketed { wage_base_limit, .. } => *wage_base_limit,
            TaxRulePayload::Flat { .. } => None,
        }
    }

    /// Single-bracket lookup: a bracket's `flat_amount` already encodes the
    /// cumulative tax owed through the brackets below it, so only the
    /// bracket whose range contains `taxable` applies — not a sum across all
    /// intersecting brackets (§4.5 step 6, resolved per `TaxBracket`'s
    /// "flat amount at bracket start" contract).
    fn apply_tax_payload(payload: &TaxRulePayload, taxable: Decimal) -> Decimal {
        match payload {
            TaxRulePayload::Flat { rate, .. } => round_internal(taxable * *rate),
            TaxRulePayload::Bracketed { brackets, .. } => {
                for bracket in brackets {
                    let in_range = taxable >= bracket.min_amount
                        && bracket.max_amount.map_or(true, |max| taxable < max);
                    if in_range {
                        let over_min = taxable - bracket.min_amount;
                        return round_internal(bracket.flat_amount + bracket.rate * over_min);
                    }
                }
                Decimal::ZERO
            }
        }
    }

    fn inputs_fingerprint(inputs: &EmployeeCalculationInputs) -> String {
        #[derive(Serialize)]
        struct TimeEntryTuple {
            id: String,
            work_date: NaiveDate,
            hours: String,
            rate_override: Option<String>,
            job_id: Option<String>,
            project_id: Option<String>,
            department_id: Option<String>,
            worksite_id: Option<String>,
        }
        #[derive(Serialize)]
        struct AdjustmentTuple {
            id: String,
            amount: String,
            description: String,
        }

        let mut time_entries: Vec<TimeEntryTuple> = inputs
            .time_entries
            .iter()
            .map(|e| TimeEntryTuple {
                id: e.time_entry_id.to_string(),
                work_date: e.work_date,
                hours: e.hours.to_string(),
                rate_override: e.rate_override.map(|r| r.to_string()),
                job_id: e.job_id.map(|i| i.to_string()),
                project_id: e.project_id.map(|i| i.to_string()),
                department_id: e.department_id.map(|i| i.to_string()),
                worksite_id: e.worksite_id.map(|i| i.to_string()),
            })
            .collect();
        time_entries.sort_by(|a, b| a.id.cmp(&b.id));

        let mut adjustments: Vec<AdjustmentTuple> = inputs
            .adjustments
            .iter()
            .map(|a| AdjustmentTuple {
                id: a.pay_input_adjustment_id.to_string(),
                amount: a.amount.to_string(),
                description: a.description.clone(),
            })
            .collect();
        adjustments.sort_by(|a, b| a.id.cmp(&b.id));

        let mut pretax_ids: Vec<String> =
            inputs.pretax_deductions.iter().map(|d| d.rule_version_id.to_string()).collect();
        pretax_ids.sort();
        let mut posttax_ids: Vec<String> =
            inputs.posttax_deductions.iter().map(|d| d.rule_version_id.to_string()).collect();
        posttax_ids.sort();
        let mut garnishment_ids: Vec<String> =
            inputs.garnishments.iter().map(|g| g.garnishment_order_id.to_string()).collect();
        garnishment_ids.sort();

        let payload = serde_json::json!({
            "time_entries": time_entries,
            "adjustments": adjustments,
            "pretax_deductions": pretax_ids,
            "posttax_deductions": posttax_ids,
            "garnishments": garnishment_ids,
        });
        Self::sha256_hex(&Self::canonical_sorted(&payload))
    }

    fn rules_fingerprint(
        tax_rules: &[TaxRule],
        pretax_deductions: &[DeductionRule],
        posttax_deductions: &[DeductionRule],
    ) -> String {
        let mut logic_hashes: Vec<String> = tax_rules.iter().map(|r| r.logic_hash.clone()).collect();
        logic_hashes.extend(pretax_deductions.iter().map(|d| d.logic_hash.clone()));
        logic_hashes.extend(posttax_deductions.iter().map(|d| d.logic_hash.clone()));
        logic_hashes.sort();
        let payload = serde_json::json!({ "rule_logic_hashes": logic_hashes });
        Self::sha256_hex(&Self::canonical_sorted(&payload))
    }

    fn calculation_id(
        engine_version: &str,
        pay_run_id: PayRunId,
        employee_id: EmployeeId,
        as_of_date: NaiveDate,
        inputs_fingerprint: &str,
        rules_fingerprint: &str,
    ) -> String {
        let preimage =
            format!("{engine_version}\u{1f}{pay_run_id}\u{1f}{employee_id}\u{1f}{as_of_date}\u{1f}{inputs_fingerprint}\u{1f}{rules_fingerprint}");
        let digest = Sha256::digest(preimage.as_bytes());
        hex::encode(digest)[..32].to_string()
    }

    fn sha256_hex(json_str: &str) -> String {
        hex::encode(Sha256::digest(json_str.as_bytes()))
    }

    fn canonical_sorted(value: &Value) -> String {
        fn sort(value: &Value) -> Value {
            match value {
                Value::Object(map) => {
                    let sorted: BTreeMap<String, Value> =
                        map.iter().map(|(k, v)| (k.clone(), sort(v))).collect();
                    serde_json::to_value(sorted).expect("sorted map serializes")
                }
                Value::Array(items) => Value::Array(items.iter().map(sort).collect()),
                other => other.clone(),
            }
        }
        serde_json::to_string(&sort(value)).expect("canonical json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::types::TaxBracket;
    use crate::domain::value_objects::{
        DeductionCodeId, JurisdictionId, RuleId, RuleVersionId, TaxAgencyId, TimeEntryId,
    };
    use rust_decimal_macros::dec;

    fn base_inputs() -> EmployeeCalculationInputs {
        let employee_id = EmployeeId::new();
        let pay_run_id = PayRunId::new();
        let legal_entity_id = LegalEntityId::new();
        let as_of = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        EmployeeCalculationInputs {
            employee_id,
            pay_run_id,
            legal_entity_id,
            as_of_date: as_of,
            check_date: as_of,
            period_start: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            period_end: as_of,
            time_entries: vec![TimeEntry {
                time_entry_id: TimeEntryId::new(),
                employee_id,
                work_date: as_of,
                hours: dec!(40),
                job_id: None,
                project_id: None,
                department_id: None,
                worksite_id: None,
                rate_override: Some(dec!(25.00)),
                locked_by_pay_run_id: None,
                locked_at: None,
            }],
            adjustments: vec![],
            rate_candidates: vec![],
            pretax_deductions: vec![],
            posttax_deductions: vec![],
            tax_rules: vec![],
            garnishments: vec![],
        }
    }

    #[test]
    fn simple_hourly_pay_produces_matching_gross_and_net() {
        let ctx = EngineContext { engine_version: "test-1".to_string() };
        let inputs = base_inputs();
        let result = PayrollEngine::calculate_employee(&ctx, &inputs);
        match result {
            CalculationResult::Success { gross, net, .. } => {
                assert_eq!(gross, dec!(1000.00));
                assert_eq!(net, dec!(1000.00));
            }
            CalculationResult::Error { errors, .. } => panic!("expected success, got {errors:?}"),
        }
    }

    #[test]
    fn identical_inputs_produce_identical_calculation_id() {
        let ctx = EngineContext { engine_version: "test-1".to_string() };
        let inputs = base_inputs();
        let r1 = PayrollEngine::calculate_employee(&ctx, &inputs);
        let r2 = PayrollEngine::calculate_employee(&ctx, &inputs);
        let id1 = match r1 {
            CalculationResult::Success { calculation_id, .. } => calculation_id,
            _ => panic!("expected success"),
        };
        let id2 = match r2 {
            CalculationResult::Success { calculation_id, .. } => calculation_id,
            _ => panic!("expected success"),
        };
        assert_eq!(id1, id2);
        assert_eq!(id1.len(), 32);
    }

    #[test]
    fn missing_rate_marks_employee_in_error() {
        let ctx = EngineContext { engine_version: "test-1".to_string() };
        let mut inputs = base_inputs();
        inputs.time_entries[0].rate_override = None;
        let result = PayrollEngine::calculate_employee(&ctx, &inputs);
        assert!(result.is_error());
    }

    #[test]
    fn bracketed_tax_applies_single_matching_bracket() {
        let ctx = EngineContext { engine_version: "test-1".to_string() };
        let mut inputs = base_inputs();
        inputs.tax_rules.push(TaxRule {
            rule_id: RuleId::new(),
            rule_version_id: RuleVersionId::new(),
            jurisdiction_id: JurisdictionId::new(),
            tax_agency_id: Some(TaxAgencyId::new()),
            tax_type: "income".to_string(),
            payload: TaxRulePayload::Bracketed {
                brackets: vec![
                    TaxBracket { min_amount: dec!(0), max_amount: Some(dec!(500)), rate: dec!(0.10), flat_amount: dec!(0) },
                    TaxBracket { min_amount: dec!(500), max_amount: None, rate: dec!(0.20), flat_amount: dec!(50) },
                ],
                wage_base_limit: None,
                is_employer: false,
            },
            logic_hash: "h1".to_string(),
        });
        let result = PayrollEngine::calculate_employee(&ctx, &inputs);
        match result {
            CalculationResult::Success { net, .. } => {
                // gross 1000, taxable 1000 lands in bracket 2: 50 + 0.20*(1000-500) = 150
                assert_eq!(net, dec!(850.00));
            }
            CalculationResult::Error { errors, .. } => panic!("expected success, got {errors:?}"),
        }
    }

    #[test]
    fn pretax_deduction_reduces_taxable_wages() {
        let ctx = EngineContext { engine_version: "test-1".to_string() };
        let mut inputs = base_inputs();
        inputs.pretax_deductions.push(DeductionRule {
            deduction_code_id: DeductionCodeId::new(),
            rule_id: RuleId::new(),
            rule_version_id: RuleVersionId::new(),
            is_pretax: true,
            percent_of_gross: None,
            flat_amount: Some(dec!(100.00)),
            logic_hash: "d1".to_string(),
        });
        let result = PayrollEngine::calculate_employee(&ctx, &inputs);
        match result {
            CalculationResult::Success { gross, net, .. } => {
                assert_eq!(gross, dec!(1000.00));
                assert_eq!(net, dec!(900.00));
            }
            CalculationResult::Error { errors, .. } => panic!("expected success, got {errors:?}"),
        }
    }

    #[test]
    fn garnishment_is_capped_by_max_amount() {
        let ctx = EngineContext { engine_version: "test-1".to_string() };
        let mut inputs = base_inputs();
        inputs.garnishments.push(GarnishmentOrder {
            garnishment_order_id: crate::domain::value_objects::GarnishmentOrderId::new(),
            order_type: "child_support".to_string(),
            case_number: Some("CASE-1".to_string()),
            max_percent: Some(dec!(50)),
            max_amount: Some(dec!(100.00)),
            priority: 0,
        });
        let result = PayrollEngine::calculate_employee(&ctx, &inputs);
        match result {
            CalculationResult::Success { net, .. } => {
                assert_eq!(net, dec!(900.00));
            }
            CalculationResult::Error { errors, .. } => panic!("expected success, got {errors:?}"),
        }
    }
}
