//! Tenancy, legal entity, and employee/employment data model (§3).

use crate::domain::value_objects::{
    DepartmentId, EmployeeId, EmploymentId, JobId, LegalEntityId, PayRateId, ProjectId, TenantId,
    WorksiteId,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Outer tenancy scope. All monetary and instruction records are keyed by
/// `(tenant_id, legal_entity_id)`.
#[derive(Clone, Debug)]
pub struct Tenant {
    pub tenant_id: TenantId,
    pub name: String,
}

/// Employer identity within a tenant.
#[derive(Clone, Debug)]
pub struct LegalEntity {
    pub legal_entity_id: LegalEntityId,
    pub tenant_id: TenantId,
    pub name: String,
    pub ein: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerType {
    Employee,
    Contractor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlsaStatus {
    Exempt,
    NonExempt,
}

/// A time-bounded relationship between an employee and a legal entity.
#[derive(Clone, Debug)]
pub struct Employment {
    pub employment_id: EmploymentId,
    pub employee_id: EmployeeId,
    pub legal_entity_id: LegalEntityId,
    pub worker_type: WorkerType,
    pub flsa_status: FlsaStatus,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl Employment {
    pub fn is_active_on(&self, as_of: NaiveDate) -> bool {
        self.start_date <= as_of && self.end_date.map_or(true, |end| as_of <= end)
    }
}

/// Optional dimensional qualifiers used by the rate resolver (§4.1).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Dimensions {
    pub job_id: Option<JobId>,
    pub project_id: Option<ProjectId>,
    pub department_id: Option<DepartmentId>,
    pub worksite_id: Option<WorksiteId>,
}

/// An effective-dated pay rate, optionally qualified by dimensions, with a
/// tie-breaking priority (§3, §4.1).
#[derive(Clone, Debug)]
pub struct PayRateRecord {
    pub pay_rate_id: PayRateId,
    pub employee_id: EmployeeId,
    pub amount: Decimal,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub dimensions: Dimensions,
    pub priority: i32,
}

impl PayRateRecord {
    pub fn is_effective_on(&self, as_of: NaiveDate) -> bool {
        self.start_date <= as_of && self.end_date.map_or(true, |end| as_of <= end)
    }
}
