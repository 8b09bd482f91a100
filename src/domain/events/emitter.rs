//! Event emitters (§4.11).
//!
//! Two emitters share the same registration/filtering model:
//! - [`EventEmitter`] dispatches synchronously, handler by handler, in
//!   registration order. A failing handler is logged and skipped — it never
//!   suppresses delivery to the handlers registered after it (§4.11, P8).
//! - [`AsyncEventEmitter`] runs its async handlers concurrently per emission
//!   and gathers their results; synchronous handlers registered on it still
//!   run inline, matching the original's `on_sync` escape hatch.
//!
//! Both support a batching context: events raised inside `batch()` accumulate
//! in order and are only dispatched if the closure returns `Ok`; an `Err`
//! return discards the whole batch (§4.11, S7).

use super::DomainEvent;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type HandlerError = anyhow::Error;
type SyncHandlerFn = dyn Fn(&DomainEvent) -> Result<(), HandlerError> + Send + Sync;
type AsyncHandlerFn =
    dyn Fn(DomainEvent) -> Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send>> + Send + Sync;

/// What a handler registration is filtered by. `None` on both fields means
/// "all events" (`on_all`).
struct Filter {
    event_types: Option<Vec<&'static str>>,
    categories: Option<Vec<super::EventCategory>>,
}

impl Filter {
    fn matches(&self, event: &DomainEvent) -> bool {
        if let Some(types) = &self.event_types {
            if !types.contains(&event.event_type()) {
                return false;
            }
        }
        if let Some(cats) = &self.categories {
            if !cats.contains(&event.category()) {
                return false;
            }
        }
        true
    }
}

struct SyncRegistration {
    filter: Filter,
    handler: Arc<SyncHandlerFn>,
}

/// Synchronous, in-process event emitter.
#[derive(Default)]
pub struct EventEmitter {
    handlers: Vec<SyncRegistration>,
    batch: Option<Vec<DomainEvent>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one or more specific event type names
    /// (as returned by [`DomainEvent::event_type`]).
    pub fn on<F>(&mut self, event_types: &[&'static str], handler: F)
    where
        F: Fn(&DomainEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.handlers.push(SyncRegistration {
            filter: Filter {
                event_types: Some(event_types.to_vec()),
                categories: None,
            },
            handler: Arc::new(handler),
        });
    }

    /// Register a handler for one or more event categories.
    pub fn on_category<F>(&mut self, categories: &[super::EventCategory], handler: F)
    where
        F: Fn(&DomainEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.handlers.push(SyncRegistration {
            filter: Filter {
                event_types: None,
                categories: Some(categories.to_vec()),
            },
            handler: Arc::new(handler),
        });
    }

    /// Register a handler for every event.
    pub fn on_all<F>(&mut self, handler: F)
    where
        F: Fn(&DomainEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.handlers.push(SyncRegistration {
            filter: Filter {
                event_types: None,
                categories: None,
            },
            handler: Arc::new(handler),
        });
    }

    /// Emit a single event. If currently inside a `batch()`, the event is
    /// queued instead of dispatched.
    pub fn emit(&mut self, event: DomainEvent) -> Vec<HandlerError> {
        if let Some(batch) = self.batch.as_mut() {
            batch.push(event);
            return Vec::new();
        }
        self.dispatch(&event)
    }

    fn dispatch(&self, event: &DomainEvent) -> Vec<HandlerError> {
        let mut errors = Vec::new();
        for reg in &self.handlers {
            if !reg.filter.matches(event) {
                continue;
            }
            if let Err(e) = (reg.handler)(event) {
                tracing::warn!(event_type = event.event_type(), error = %e, "event handler failed");
                errors.push(e);
            }
        }
        errors
    }

    /// Run `f` with events collected into a batch; on `Ok`, dispatch them in
    /// order and return the collected handler errors alongside `f`'s value.
    /// On `Err`, the batch is discarded and zero handlers ever see the events.
    pub fn batch<T, E, F>(&mut self, f: F) -> Result<(T, Vec<HandlerError>), E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        let outer = self.batch.replace(Vec::new());
        let result = f(self);
        match result {
            Ok(value) => {
                let events = self.batch.take().unwrap_or_default();
                self.batch = outer;
                let mut errors = Vec::new();
                for event in &events {
                    errors.extend(self.dispatch(event));
                }
                Ok((value, errors))
            }
            Err(e) => {
                self.batch = outer;
                Err(e)
            }
        }
    }
}

struct AsyncRegistration {
    filter: Filter,
    is_async: bool,
    sync_handler: Option<Arc<SyncHandlerFn>>,
    async_handler: Option<Arc<AsyncHandlerFn>>,
}

/// Event emitter with concurrent async-handler dispatch (SPEC_FULL.md
/// supplement, grounded in `AsyncEventEmitter` in the original Python).
#[derive(Default)]
pub struct AsyncEventEmitter {
    handlers: Vec<AsyncRegistration>,
    batch: Option<Vec<DomainEvent>>,
}

impl AsyncEventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an async handler for specific event types.
    pub fn on<F, Fut>(&mut self, event_types: &[&'static str], handler: F)
    where
        F: Fn(DomainEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.handlers.push(AsyncRegistration {
            filter: Filter {
                event_types: Some(event_types.to_vec()),
                categories: None,
            },
            is_async: true,
            sync_handler: None,
            async_handler: Some(Arc::new(move |e| Box::pin(handler(e)))),
        });
    }

    /// Register a synchronous handler on the async emitter; it runs inline,
    /// not concurrently, matching the original's `on_sync`.
    pub fn on_sync<F>(&mut self, event_types: &[&'static str], handler: F)
    where
        F: Fn(&DomainEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.handlers.push(AsyncRegistration {
            filter: Filter {
                event_types: Some(event_types.to_vec()),
                categories: None,
            },
            is_async: false,
            sync_handler: Some(Arc::new(handler)),
            async_handler: None,
        });
    }

    pub fn on_category<F, Fut>(&mut self, categories: &[super::EventCategory], handler: F)
    where
        F: Fn(DomainEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.handlers.push(AsyncRegistration {
            filter: Filter {
                event_types: None,
                categories: Some(categories.to_vec()),
            },
            is_async: true,
            sync_handler: None,
            async_handler: Some(Arc::new(move |e| Box::pin(handler(e)))),
        });
    }

    pub fn on_all<F, Fut>(&mut self, handler: F)
    where
        F: Fn(DomainEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.handlers.push(AsyncRegistration {
            filter: Filter {
                event_types: None,
                categories: None,
            },
            is_async: true,
            sync_handler: None,
            async_handler: Some(Arc::new(move |e| Box::pin(handler(e)))),
        });
    }

    pub async fn emit(&mut self, event: DomainEvent) -> Vec<HandlerError> {
        if let Some(batch) = self.batch.as_mut() {
            batch.push(event);
            return Vec::new();
        }
        self.dispatch(&event).await
    }

    async fn dispatch(&self, event: &DomainEvent) -> Vec<HandlerError> {
        let mut errors = Vec::new();
        let mut tasks = Vec::new();

        for reg in &self.handlers {
            if !reg.filter.matches(event) {
                continue;
            }
            if reg.is_async {
                let handler = reg.async_handler.clone().expect("async registration");
                let event = event.clone();
                tasks.push(tokio::spawn(async move { (handler)(event).await }));
            } else if let Some(handler) = &reg.sync_handler {
                if let Err(e) = (handler)(event) {
                    tracing::warn!(event_type = event.event_type(), error = %e, "sync event handler failed");
                    errors.push(e);
                }
            }
        }

        for task in tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(event_type = event.event_type(), error = %e, "async event handler failed");
                    errors.push(e);
                }
                Err(join_err) => {
                    tracing::warn!(event_type = event.event_type(), error = %join_err, "async event handler panicked");
                    errors.push(anyhow::anyhow!(join_err));
                }
            }
        }

        errors
    }

    pub async fn batch<T, E, F, Fut>(&mut self, f: F) -> Result<(T, Vec<HandlerError>), E>
    where
        F: FnOnce(&mut Self) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let outer = self.batch.replace(Vec::new());
        let result = f(self).await;
        match result {
            Ok(value) => {
                let events = self.batch.take().unwrap_or_default();
                self.batch = outer;
                let mut errors = Vec::new();
                for event in &events {
                    errors.extend(self.dispatch(event).await);
                }
                Ok((value, errors))
            }
            Err(e) => {
                self.batch = outer;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::{EventCategory, EventMetadata};
    use crate::domain::value_objects::{PayRunId, TenantId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn funding_event() -> DomainEvent {
        DomainEvent::FundingRequested {
            metadata: EventMetadata::new(TenantId::new(), None, "test"),
            pay_run_id: PayRunId::new(),
            required: rust_decimal::Decimal::ONE_HUNDRED,
        }
    }

    #[test]
    fn handlers_fire_in_registration_order() {
        let mut emitter = EventEmitter::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let o1 = order.clone();
        let o2 = order.clone();
        emitter.on_all(move |_| {
            o1.lock().unwrap().push(1);
            Ok(())
        });
        emitter.on_all(move |_| {
            o2.lock().unwrap().push(2);
            Ok(())
        });
        emitter.emit(funding_event());
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn a_failing_handler_does_not_suppress_others() {
        let mut emitter = EventEmitter::new();
        let called = Arc::new(AtomicUsize::new(0));
        let c = called.clone();
        emitter.on_all(|_| Err(anyhow::anyhow!("boom")));
        emitter.on_all(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let errors = emitter.emit(funding_event());
        assert_eq!(errors.len(), 1);
        assert_eq!(called.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn category_filter_only_matches_declared_categories() {
        let mut emitter = EventEmitter::new();
        let called = Arc::new(AtomicUsize::new(0));
        let c = called.clone();
        emitter.on_category(&[EventCategory::Payment], move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        emitter.emit(funding_event());
        assert_eq!(called.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn batch_discards_on_error_and_delivers_nothing() {
        let mut emitter = EventEmitter::new();
        let called = Arc::new(AtomicUsize::new(0));
        let c = called.clone();
        emitter.on_all(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let result: Result<((), Vec<HandlerError>), &str> = emitter.batch(|b| {
            b.emit(funding_event());
            b.emit(funding_event());
            Err("abort")
        });
        assert!(result.is_err());
        assert_eq!(called.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn batch_delivers_all_events_in_order_on_success() {
        let mut emitter = EventEmitter::new();
        let called = Arc::new(AtomicUsize::new(0));
        let c = called.clone();
        emitter.on_all(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let result: Result<((), Vec<HandlerError>), &str> = emitter.batch(|b| {
            b.emit(funding_event());
            b.emit(funding_event());
            Ok(())
        });
        assert!(result.is_ok());
        assert_eq!(called.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn async_emitter_gathers_concurrent_handlers() {
        let mut emitter = AsyncEventEmitter::new();
        let called = Arc::new(AtomicUsize::new(0));
        let c1 = called.clone();
        let c2 = called.clone();
        emitter.on_all(move |_| {
            let c = c1.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        emitter.on_sync(&["FundingRequested"], move |_| {
            c2.fetch_add(10, Ordering::SeqCst);
            Ok(())
        });
        let errors = emitter.emit(funding_event()).await;
        assert!(errors.is_empty());
        assert_eq!(called.load(Ordering::SeqCst), 11);
    }

    #[tokio::test]
    async fn async_batch_discards_on_error() {
        let mut emitter = AsyncEventEmitter::new();
        let called = Arc::new(AtomicUsize::new(0));
        let c = called.clone();
        emitter.on_all(move |_| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let result: Result<((), Vec<HandlerError>), &str> = emitter
            .batch(|b| async move {
                b.emit(funding_event()).await;
                Err("abort")
            })
            .await;
        assert!(result.is_err());
        assert_eq!(called.load(Ordering::SeqCst), 0);
    }
}
