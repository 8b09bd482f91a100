//! Pay rate resolution with dimensional matching (§4.1).
//!
//! Priority order:
//! 1. A time entry's `rate_override`, if present, wins outright.
//! 2. Otherwise, score every candidate [`PayRateRecord`] effective on
//!    `as_of_date` against the requested dimensions and take the highest
//!    score, breaking ties by `priority` and then by the most recent
//!    `start_date` (SPEC_FULL.md supplement: the original breaks ties by
//!    priority alone, which leaves outcomes order-dependent when two rates
//!    share both score and priority).

use crate::domain::{Dimensions, EmployeeId, PayRateId, PayRateRecord};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

const JOB_WEIGHT: i32 = 8;
const PROJECT_WEIGHT: i32 = 4;
const DEPARTMENT_WEIGHT: i32 = 2;
const WORKSITE_WEIGHT: i32 = 1;

#[derive(Debug, Error)]
#[error("no matching pay rate found for employee {employee_id} on {as_of_date} with dimensions {dimensions:?}")]
pub struct RateNotFoundError {
    pub employee_id: EmployeeId,
    pub as_of_date: NaiveDate,
    pub dimensions: Dimensions,
}

pub struct RateResolver;

impl RateResolver {
    /// Per-dimension scoring: a requested dimension that the rate pins to a
    /// *different* value is an explicit mismatch (`-1`, disqualifying);
    /// a requested dimension the rate doesn't pin at all scores `0` for that
    /// dimension; a match scores the dimension's weight (§4.1).
    fn score(rate: &PayRateRecord, requested: &Dimensions) -> Option<i32> {
        let mut score = 0;
        score += Self::score_dimension(rate.dimensions.job_id, requested.job_id, JOB_WEIGHT)?;
        score += Self::score_dimension(rate.dimensions.project_id, requested.project_id, PROJECT_WEIGHT)?;
        score +=
            Self::score_dimension(rate.dimensions.department_id, requested.department_id, DEPARTMENT_WEIGHT)?;
        score += Self::score_dimension(rate.dimensions.worksite_id, requested.worksite_id, WORKSITE_WEIGHT)?;
        Some(score)
    }

    fn score_dimension<T: PartialEq>(rate_value: Option<T>, requested: Option<T>, weight: i32) -> Option<i32> {
        match rate_value {
            None => Some(0),
            Some(rv) => match requested {
                Some(req) if req == rv => Some(weight),
                _ => None,
            },
        }
    }

    fn best_candidate<'a>(
        rates: &'a [PayRateRecord],
        as_of_date: NaiveDate,
        requested: &Dimensions,
    ) -> Option<&'a PayRateRecord> {
        let mut best: Option<(&PayRateRecord, i32)> = None;
        for rate in rates {
            if !rate.is_effective_on(as_of_date) {
                continue;
            }
            let Some(score) = Self::score(rate, requested) else {
                continue;
            };
            best = match best {
                None => Some((rate, score)),
                Some((current, current_score)) => {
                    if score > current_score
                        || (score == current_score && rate.priority > current.priority)
                        || (score == current_score
                            && rate.priority == current.priority
                            && rate.start_date > current.start_date)
                    {
                        Some((rate, score))
                    } else {
                        Some((current, current_score))
                    }
                }
            };
        }
        best.map(|(rate, _)| rate)
    }

    /// Resolves the rate for a time entry: an explicit `rate_override` wins,
    /// otherwise dimensional matching against `candidate_rates` runs.
    pub fn resolve_rate_for_time_entry(
        employee_id: EmployeeId,
        rate_override: Option<Decimal>,
        requested: &Dimensions,
        as_of_date: NaiveDate,
        candidate_rates: &[PayRateRecord],
    ) -> Result<Decimal, RateNotFoundError> {
        if let Some(overridden) = rate_override {
            return Ok(overridden);
        }
        Self::resolve_rate_for_employee(employee_id, requested, as_of_date, candidate_rates)
    }

    pub fn resolve_rate_for_employee(
        employee_id: EmployeeId,
        requested: &Dimensions,
        as_of_date: NaiveDate,
        candidate_rates: &[PayRateRecord],
    ) -> Result<Decimal, RateNotFoundError> {
        Self::best_candidate(candidate_rates, as_of_date, requested)
            .map(|r| r.amount)
            .ok_or(RateNotFoundError {
                employee_id,
                as_of_date,
                dimensions: requested.clone(),
            })
    }

    pub fn resolve_rate_id_for_employee(
        employee_id: EmployeeId,
        requested: &Dimensions,
        as_of_date: NaiveDate,
        candidate_rates: &[PayRateRecord],
    ) -> Result<PayRateId, RateNotFoundError> {
        Self::best_candidate(candidate_rates, as_of_date, requested)
            .map(|r| r.pay_rate_id)
            .ok_or(RateNotFoundError {
                employee_id,
                as_of_date,
                dimensions: requested.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DepartmentId, JobId};
    use rust_decimal_macros::dec;

    fn rate(amount: Decimal, dims: Dimensions, priority: i32) -> PayRateRecord {
        PayRateRecord {
            pay_rate_id: PayRateId::new(),
            employee_id: EmployeeId::new(),
            amount,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: None,
            dimensions: dims,
            priority,
        }
    }

    #[test]
    fn generic_rate_wins_with_no_dimensions_requested() {
        let generic = rate(dec!(20.00), Dimensions::default(), 0);
        let resolved = RateResolver::resolve_rate_for_employee(
            EmployeeId::new(),
            &Dimensions::default(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            &[generic],
        )
        .unwrap();
        assert_eq!(resolved, dec!(20.00));
    }

    #[test]
    fn job_specific_rate_wins_over_generic_when_job_matches() {
        let job_id = JobId::new();
        let generic = rate(dec!(25.00), Dimensions::default(), 0);
        let job_rate = rate(
            dec!(35.00),
            Dimensions { job_id: Some(job_id), ..Default::default() },
            0,
        );
        let requested = Dimensions { job_id: Some(job_id), ..Default::default() };
        let resolved = RateResolver::resolve_rate_for_employee(
            EmployeeId::new(),
            &requested,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            &[generic, job_rate],
        )
        .unwrap();
        assert_eq!(resolved, dec!(35.00));
    }

    #[test]
    fn explicit_job_mismatch_disqualifies_the_rate() {
        let job_rate = rate(
            dec!(25.00),
            Dimensions { job_id: Some(JobId::new()), ..Default::default() },
            0,
        );
        let requested = Dimensions { job_id: Some(JobId::new()), ..Default::default() };
        let err = RateResolver::resolve_rate_for_employee(
            EmployeeId::new(),
            &requested,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            &[job_rate],
        )
        .unwrap_err();
        assert_eq!(err.dimensions, requested);
    }

    #[test]
    fn multi_dimensional_score_beats_single_dimension() {
        let job_id = JobId::new();
        let dept_id = DepartmentId::new();
        let job_only = rate(
            dec!(30.00),
            Dimensions { job_id: Some(job_id), ..Default::default() },
            0,
        );
        let job_and_dept = rate(
            dec!(40.00),
            Dimensions { job_id: Some(job_id), department_id: Some(dept_id), ..Default::default() },
            0,
        );
        let requested =
            Dimensions { job_id: Some(job_id), department_id: Some(dept_id), ..Default::default() };
        let resolved = RateResolver::resolve_rate_for_employee(
            EmployeeId::new(),
            &requested,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            &[job_only, job_and_dept],
        )
        .unwrap();
        assert_eq!(resolved, dec!(40.00));
    }

    #[test]
    fn rate_override_bypasses_table_lookup_entirely() {
        let resolved = RateResolver::resolve_rate_for_time_entry(
            EmployeeId::new(),
            Some(dec!(99.00)),
            &Dimensions::default(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            &[],
        )
        .unwrap();
        assert_eq!(resolved, dec!(99.00));
    }

    #[test]
    fn respects_effective_date_window() {
        let past = rate(dec!(25.00), Dimensions::default(), 0);
        let mut future = rate(dec!(30.00), Dimensions::default(), 0);
        future.start_date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();

        let before = RateResolver::resolve_rate_for_employee(
            EmployeeId::new(),
            &Dimensions::default(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            &[past.clone(), future.clone()],
        )
        .unwrap();
        assert_eq!(before, dec!(25.00));

        let after = RateResolver::resolve_rate_for_employee(
            EmployeeId::new(),
            &Dimensions::default(),
            NaiveDate::from_ymd_opt(2024, 7, 15).unwrap(),
            &[past, future],
        )
        .unwrap();
        assert_eq!(after, dec!(30.00));
    }
}
