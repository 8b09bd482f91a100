//! PSP configuration objects (§6, §9).
//!
//! Configuration is explicit and frozen after construction. There are no
//! environment-variable defaults and no hidden defaults that move money —
//! every field that affects fund movement is either required or has a
//! documented, conservative default, validated once at construction time.

use crate::domain::value_objects::{LegalEntityId, TenantId};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("reservation_ttl_hours must be between 1 and 168, got {0}")]
    ReservationTtlOutOfRange(i64),
    #[error("batch_size must be between 1 and 10000, got {0}")]
    BatchSizeOutOfRange(i64),
    #[error("retention_days must be at least 1 when set, got {0}")]
    RetentionDaysOutOfRange(i64),
    #[error("provider name must not be empty")]
    EmptyProviderName,
    #[error("duplicate provider name: {0}")]
    DuplicateProviderName(String),
    #[error("at least one provider is required")]
    NoProviders,
    #[error("pay_gate_enabled may only be false outside production configuration")]
    PayGateDisabledNotAllowed,
}

/// Ledger behavior (§6).
#[derive(Clone, Debug)]
pub struct LedgerConfig {
    /// Every ledger entry must have equal debits and credits.
    pub require_balanced_entries: bool,
    /// If true, accounts may go negative. Only ever enable for liability
    /// accounts.
    pub allow_negative_balances: bool,
    /// If true, `balance()` subtracts active reservations from availability.
    pub enable_reservations: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            require_balanced_entries: true,
            allow_negative_balances: false,
            enable_reservations: true,
        }
    }
}

/// Which amounts count toward the funding gate's `required` figure (§4.7).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FundingModel {
    /// required = net + employee taxes + employer taxes + third-party amounts.
    PrefundAll,
    /// required = net pay only.
    NetPayOnly,
    /// required = net pay + employee/employer taxes, no third-party amounts.
    NetPlusTaxes,
}

/// Funding gate behavior (§6, §4.7). `pay_gate_enabled = false` is rejected
/// by [`FundingGateConfig::new`] unless `allow_pay_gate_disable_for_tests`
/// is explicitly set — disabling the pay gate is never permitted in production.
#[derive(Clone, Debug)]
pub struct FundingGateConfig {
    pub commit_gate_enabled: bool,
    pub pay_gate_enabled: bool,
    pub reservation_ttl_hours: i64,
    pub allow_partial_funding: bool,
    pub default_model: FundingModel,
}

impl FundingGateConfig {
    pub fn new(
        commit_gate_enabled: bool,
        pay_gate_enabled: bool,
        reservation_ttl_hours: i64,
        allow_partial_funding: bool,
        default_model: FundingModel,
    ) -> Result<Self, ConfigError> {
        if !(1..=168).contains(&reservation_ttl_hours) {
            return Err(ConfigError::ReservationTtlOutOfRange(reservation_ttl_hours));
        }
        if !pay_gate_enabled {
            return Err(ConfigError::PayGateDisabledNotAllowed);
        }
        Ok(Self {
            commit_gate_enabled,
            pay_gate_enabled,
            reservation_ttl_hours,
            allow_partial_funding,
            default_model,
        })
    }

    /// Test-only constructor that permits disabling the pay gate, matching
    /// the spec's explicit carve-out ("forbidden outside tests").
    #[cfg(any(test, feature = "test-util"))]
    pub fn new_for_tests(
        commit_gate_enabled: bool,
        pay_gate_enabled: bool,
        reservation_ttl_hours: i64,
        allow_partial_funding: bool,
        default_model: FundingModel,
    ) -> Result<Self, ConfigError> {
        if !(1..=168).contains(&reservation_ttl_hours) {
            return Err(ConfigError::ReservationTtlOutOfRange(reservation_ttl_hours));
        }
        Ok(Self {
            commit_gate_enabled,
            pay_gate_enabled,
            reservation_ttl_hours,
            allow_partial_funding,
            default_model,
        })
    }
}

impl Default for FundingGateConfig {
    fn default() -> Self {
        Self {
            commit_gate_enabled: true,
            pay_gate_enabled: true,
            reservation_ttl_hours: 48,
            allow_partial_funding: false,
            default_model: FundingModel::PrefundAll,
        }
    }
}

/// Rail types a [`ProviderConfig`] may declare (§4.9, §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RailKind {
    Ach,
    Fednow,
    Wire,
    Rtp,
    Check,
}

/// Configuration for one payment rail provider instance (§6).
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub name: String,
    pub provider_type: RailKind,
    pub sandbox: bool,
    pub credentials: std::collections::BTreeMap<String, String>,
    pub webhook_secret: Option<String>,
    pub timeout_seconds: u32,
    pub retry_count: u32,
    pub priority: i32,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, provider_type: RailKind) -> Result<Self, ConfigError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ConfigError::EmptyProviderName);
        }
        Ok(Self {
            name,
            provider_type,
            sandbox: true,
            credentials: Default::default(),
            webhook_secret: None,
            timeout_seconds: 30,
            retry_count: 3,
            priority: 0,
        })
    }
}

/// Event store configuration (§6).
#[derive(Clone, Debug)]
pub struct EventStoreConfig {
    pub retention_days: Option<i64>,
    pub enable_replay: bool,
    pub enable_subscriptions: bool,
    pub batch_size: i64,
}

impl EventStoreConfig {
    pub fn new(
        retention_days: Option<i64>,
        enable_replay: bool,
        enable_subscriptions: bool,
        batch_size: i64,
    ) -> Result<Self, ConfigError> {
        if let Some(days) = retention_days {
            if days < 1 {
                return Err(ConfigError::RetentionDaysOutOfRange(days));
            }
        }
        if !(1..=10_000).contains(&batch_size) {
            return Err(ConfigError::BatchSizeOutOfRange(batch_size));
        }
        Ok(Self {
            retention_days,
            enable_replay,
            enable_subscriptions,
            batch_size,
        })
    }
}

impl Default for EventStoreConfig {
    fn default() -> Self {
        Self {
            retention_days: None,
            enable_replay: true,
            enable_subscriptions: true,
            batch_size: 1000,
        }
    }
}

/// Reconciliation configuration (SPEC_FULL.md ambient supplement).
#[derive(Clone, Debug)]
pub struct ReconciliationConfig {
    pub auto_match: bool,
    pub match_tolerance_cents: i64,
    pub unmatched_alert_threshold: u32,
    pub stale_payment_days: u32,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            auto_match: true,
            match_tolerance_cents: 0,
            unmatched_alert_threshold: 10,
            stale_payment_days: 7,
        }
    }
}

/// Liability classification configuration (SPEC_FULL.md supplement).
#[derive(Clone, Debug)]
pub struct LiabilityConfig {
    pub auto_classify: bool,
    pub default_recovery_path: String,
    pub employer_return_codes: Vec<String>,
    pub platform_return_codes: Vec<String>,
}

impl Default for LiabilityConfig {
    fn default() -> Self {
        Self {
            auto_classify: true,
            default_recovery_path: "manual_review".to_string(),
            employer_return_codes: ["R01", "R02", "R03", "R04", "R07", "R08", "R10"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            platform_return_codes: ["R05", "R06", "R09"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Top-level, frozen PSP configuration tree (§6).
#[derive(Clone, Debug)]
pub struct PspConfig {
    pub tenant_id: TenantId,
    pub legal_entity_id: LegalEntityId,
    pub ledger: LedgerConfig,
    pub funding_gate: FundingGateConfig,
    pub providers: Vec<ProviderConfig>,
    pub event_store: EventStoreConfig,
    pub reconciliation: ReconciliationConfig,
    pub liability: LiabilityConfig,
}

impl PspConfig {
    pub fn new(
        tenant_id: TenantId,
        legal_entity_id: LegalEntityId,
        ledger: LedgerConfig,
        funding_gate: FundingGateConfig,
        providers: Vec<ProviderConfig>,
        event_store: EventStoreConfig,
        reconciliation: ReconciliationConfig,
        liability: LiabilityConfig,
    ) -> Result<Self, ConfigError> {
        if providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }
        let mut seen = std::collections::HashSet::new();
        for p in &providers {
            if !seen.insert(p.name.clone()) {
                return Err(ConfigError::DuplicateProviderName(p.name.clone()));
            }
        }
        Ok(Self {
            tenant_id,
            legal_entity_id,
            ledger,
            funding_gate,
            providers,
            event_store,
            reconciliation,
            liability,
        })
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    pub fn providers_by_type(&self, provider_type: RailKind) -> Vec<&ProviderConfig> {
        self.providers
            .iter()
            .filter(|p| p.provider_type == provider_type)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_reservation_ttl_out_of_range() {
        let err = FundingGateConfig::new(true, true, 0, false, FundingModel::PrefundAll).unwrap_err();
        assert_eq!(err, ConfigError::ReservationTtlOutOfRange(0));

        let err = FundingGateConfig::new(true, true, 169, false, FundingModel::PrefundAll).unwrap_err();
        assert_eq!(err, ConfigError::ReservationTtlOutOfRange(169));
    }

    #[test]
    fn rejects_pay_gate_disabled_outside_tests() {
        let err = FundingGateConfig::new(true, false, 48, false, FundingModel::PrefundAll).unwrap_err();
        assert_eq!(err, ConfigError::PayGateDisabledNotAllowed);
    }

    #[test]
    fn rejects_duplicate_provider_names() {
        let p1 = ProviderConfig::new("primary", RailKind::Ach).unwrap();
        let p2 = ProviderConfig::new("primary", RailKind::Fednow).unwrap();
        let err = PspConfig::new(
            TenantId::new(),
            LegalEntityId::new(),
            LedgerConfig::default(),
            FundingGateConfig::default(),
            vec![p1, p2],
            EventStoreConfig::default(),
            ReconciliationConfig::default(),
            LiabilityConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateProviderName("primary".to_string()));
    }

    #[test]
    fn rejects_empty_provider_list() {
        let err = PspConfig::new(
            TenantId::new(),
            LegalEntityId::new(),
            LedgerConfig::default(),
            FundingGateConfig::default(),
            vec![],
            EventStoreConfig::default(),
            ReconciliationConfig::default(),
            LiabilityConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::NoProviders);
    }
}
