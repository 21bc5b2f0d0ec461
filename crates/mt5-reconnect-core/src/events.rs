//! Listener fan-out for executor events.
//!
//! Executors report every reconnect and the final outcome of each call as an
//! event. Listeners are registered on the executor configuration and called
//! synchronously, in registration order, on the task that produced the event.

use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// An event produced by a named executor.
pub trait ExecutorEvent: Send + Sync + fmt::Debug {
    /// Short snake_case tag such as `"reconnected"`.
    fn event_type(&self) -> &'static str;

    fn timestamp(&self) -> Instant;

    fn executor_name(&self) -> &str;
}

/// Receives events of type `E`.
pub trait EventListener<E: ExecutorEvent>: Send + Sync {
    fn on_event(&self, event: &E);
}

/// Ordered set of listeners sharing one event type.
///
/// Cloning is cheap: listeners are reference counted.
pub struct EventListeners<E: ExecutorEvent> {
    listeners: Vec<Arc<dyn EventListener<E>>>,
}

impl<E: ExecutorEvent> EventListeners<E> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Registers `listener` after the existing ones.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Hands `event` to every listener.
    ///
    /// A listener that panics is skipped; the panic never reaches the caller.
    pub fn emit(&self, event: &E) {
        self.listeners.iter().for_each(|listener| {
            let _ = panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
        });
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: ExecutorEvent> Clone for EventListeners<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: self.listeners.iter().map(Arc::clone).collect(),
        }
    }
}

impl<E: ExecutorEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ExecutorEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventListeners({})", self.listeners.len())
    }
}

/// Adapts a closure into an [`EventListener`].
pub struct FnListener<E, F> {
    callback: F,
    _event: PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self {
            callback,
            _event: PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: ExecutorEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.callback)(event)
    }
}
