//! Append-only event store (§4.11).
//!
//! Persisted domain events, queryable by tenant, time window, correlation id,
//! causation id, category, and type. Replay yields events in
//! timestamp-then-insertion order.

use super::{DomainEvent, EventCategory};
use crate::domain::value_objects::TenantId;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// A query against the event store. All fields are optional filters,
/// AND-combined.
#[derive(Clone, Debug, Default)]
pub struct EventQuery {
    pub tenant_id: Option<TenantId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub correlation_id: Option<Uuid>,
    pub causation_id: Option<Uuid>,
    pub category: Option<EventCategory>,
    pub event_type: Option<&'static str>,
}

struct Stamped {
    event: DomainEvent,
    insertion_seq: u64,
}

/// In-process append-only event store. A production deployment supplies a
/// durable implementation behind the same query surface; this one is the
/// reference implementation used by tests and the demo binary (see
/// SPEC_FULL.md "Persistence boundary").
#[derive(Default)]
pub struct EventStore {
    events: Mutex<Vec<Stamped>>,
    seq: AtomicU64,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event. Never fails, never mutates or removes prior entries.
    pub fn append(&self, event: DomainEvent) {
        let insertion_seq = self.seq.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(Stamped { event, insertion_seq });
    }

    /// Query the store, returning matches ordered by (timestamp, insertion
    /// order) as required for deterministic replay.
    pub fn query(&self, q: &EventQuery) -> Vec<DomainEvent> {
        let events = self.events.lock().unwrap();
        let mut matches: Vec<&Stamped> = events
            .iter()
            .filter(|s| Self::matches(&s.event, q))
            .collect();
        matches.sort_by(|a, b| {
            a.event
                .metadata()
                .timestamp
                .cmp(&b.event.metadata().timestamp)
                .then(a.insertion_seq.cmp(&b.insertion_seq))
        });
        matches.into_iter().map(|s| s.event.clone()).collect()
    }

    /// Replay every event for a correlation id, in order.
    pub fn replay_correlation(&self, correlation_id: Uuid) -> Vec<DomainEvent> {
        self.query(&EventQuery {
            correlation_id: Some(correlation_id),
            ..Default::default()
        })
    }

    fn matches(event: &DomainEvent, q: &EventQuery) -> bool {
        let meta = event.metadata();
        if let Some(tenant_id) = q.tenant_id {
            if meta.tenant_id != tenant_id {
                return false;
            }
        }
        if let Some(from) = q.from {
            if meta.timestamp < from {
                return false;
            }
        }
        if let Some(to) = q.to {
            if meta.timestamp > to {
                return false;
            }
        }
        if let Some(correlation_id) = q.correlation_id {
            if meta.correlation_id != correlation_id {
                return false;
            }
        }
        if let Some(causation_id) = q.causation_id {
            if meta.causation_id != Some(causation_id) {
                return false;
            }
        }
        if let Some(category) = q.category {
            if event.category() != category {
                return false;
            }
        }
        if let Some(event_type) = q.event_type {
            if event.event_type() != event_type {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::EventMetadata;
    use crate::domain::value_objects::PayRunId;
    use rust_decimal::Decimal;

    fn event_for(tenant_id: TenantId, correlation_id: Uuid) -> DomainEvent {
        DomainEvent::FundingRequested {
            metadata: EventMetadata::new(tenant_id, Some(correlation_id), "test"),
            pay_run_id: PayRunId::new(),
            required: Decimal::ONE_HUNDRED,
        }
    }

    #[test]
    fn replay_preserves_insertion_order_within_a_correlation() {
        let store = EventStore::new();
        let tenant = TenantId::new();
        let correlation = Uuid::new_v4();
        for _ in 0..5 {
            store.append(event_for(tenant, correlation));
        }
        let replayed = store.replay_correlation(correlation);
        assert_eq!(replayed.len(), 5);
    }

    #[test]
    fn query_filters_by_tenant() {
        let store = EventStore::new();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();
        store.append(event_for(tenant_a, Uuid::new_v4()));
        store.append(event_for(tenant_b, Uuid::new_v4()));

        let results = store.query(&EventQuery {
            tenant_id: Some(tenant_a),
            ..Default::default()
        });
        assert_eq!(results.len(), 1);
    }
}
