//! Multicast handler registry.
//!
//! Every registered handler receives every emitted value. A panicking handler
//! is isolated: it is logged and delivery continues with the next handler.
//! Registration returns a [`Subscription`]; dropping it unregisters the
//! handler unless it was [detached](Subscription::detach).

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    handlers: Vec<(u64, Handler<T>)>,
}

fn lock<T>(registry: &Mutex<Registry<T>>) -> MutexGuard<'_, Registry<T>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Subscribers<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> Clone for Subscribers<T> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
        }
    }
}

impl<T: 'static> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Subscribers<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                handlers: Vec::new(),
            })),
        }
    }

    pub fn subscribe(&self, handler: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = {
            let mut registry = lock(&self.registry);
            let id = registry.next_id;
            registry.next_id += 1;
            registry.handlers.push((id, Arc::new(handler)));
            id
        };

        let registry = Arc::downgrade(&self.registry);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    lock(&registry).handlers.retain(|(handler_id, _)| *handler_id != id);
                }
            })),
        }
    }

    /// Deliver `value` to every handler registered at the time of the call.
    ///
    /// Handlers run outside the registry lock, so a handler may subscribe or
    /// unsubscribe without deadlocking; such changes apply from the next emit.
    pub fn emit(&self, value: &T) {
        let handlers: Vec<Handler<T>> = lock(&self.registry)
            .handlers
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(value))).is_err() {
                tracing::error!("subscriber panicked; continuing delivery to remaining subscribers");
            }
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.registry).handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Registration handle returned by every `on_*` method.
#[must_use = "dropping a Subscription unregisters its handler; call `detach` to keep it"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }

    /// Keep the handler registered for the lifetime of the publisher.
    pub fn detach(mut self) {
        self.unsubscribe.take();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}
