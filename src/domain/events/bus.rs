//! Pairs the dispatching [`EventEmitter`] with the append-only [`EventStore`]
//! behind a single shared handle, so services have one thing to hold instead
//! of threading both through every call (§4.11).

use super::{DomainEvent, EventEmitter};
use crate::domain::events::emitter::HandlerError;
use crate::domain::events::store::EventStore;
use std::sync::Mutex;

#[derive(Default)]
pub struct EventPublisher {
    pub store: EventStore,
    emitter: Mutex<EventEmitter>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler before any `publish` calls are made.
    pub fn register(&self, f: impl FnOnce(&mut EventEmitter)) {
        let mut emitter = self.emitter.lock().unwrap();
        f(&mut emitter);
    }

    /// Append to the store, then dispatch to registered handlers.
    pub fn publish(&self, event: DomainEvent) -> Vec<HandlerError> {
        self.store.append(event.clone());
        self.emitter.lock().unwrap().emit(event)
    }

    /// Run `f` as an atomic batch: the events it returns only reach the
    /// store and the handlers if `f` returns `Ok` (§4.11, S7). `f` builds
    /// its events purely and returns them alongside its value; nothing is
    /// published until `f` has already succeeded.
    pub fn batch<T, E, F>(&self, f: F) -> Result<(T, Vec<HandlerError>), E>
    where
        F: FnOnce() -> Result<(T, Vec<DomainEvent>), E>,
    {
        let (value, events) = f()?;
        let mut errors = Vec::new();
        let mut emitter = self.emitter.lock().unwrap();
        for event in events {
            self.store.append(event.clone());
            errors.extend(emitter.emit(event));
        }
        Ok((value, errors))
    }
}
