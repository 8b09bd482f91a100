//! Deterministic calculation pipeline (§4.1, §4.2, §4.5).
//!
//! Calculators are pure with respect to persistence: they take plain data
//! (rates, rules, time entries) and return [`types::LineCandidate`] values
//! and a [`engine::CalculationResult`]. Nothing here talks to a repository;
//! the commit service (`crate::services::commit_service`) owns persistence.

pub mod engine;
pub mod line_builder;
pub mod rate_resolver;
pub mod types;

pub use engine::{CalculationResult, PayrollEngine, PayRunCalculationResult};
pub use line_builder::LineItemBuilder;
pub use rate_resolver::{RateNotFoundError, RateResolver};
pub use types::{
    DeductionRule, EmployeeCalculationContext, GarnishmentOrder, LineCandidate, LineType,
    TaxBracket, TaxRulePayload, TaxableWages,
};
