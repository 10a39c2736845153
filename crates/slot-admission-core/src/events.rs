//! Event system for admission queues.
//!
//! Hosts use listeners instead of busy-polling: every participant state change
//! in a queue is published as an event to the registered listeners.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Trait for events emitted by an admission queue.
pub trait SlotEvent: Send + Sync + fmt::Debug {
    /// Returns the type of event (e.g., "admitted", "demoted").
    fn event_type(&self) -> &'static str;

    /// Returns when this event occurred, as read from the controller's clock.
    fn timestamp(&self) -> Instant;

    /// Returns the id of the queue that emitted this event.
    fn queue_id(&self) -> &str;
}

/// Trait for listening to queue events.
pub trait EventListener<E: SlotEvent>: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &E);
}

/// Type alias for shared event listeners.
pub type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// An ordered collection of event listeners.
#[derive(Clone)]
pub struct EventListeners<E: SlotEvent> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: SlotEvent> EventListeners<E> {
    /// Creates a new empty listener collection.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Adds a listener to the collection.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Emits an event to every listener, in registration order.
    ///
    /// A panicking listener does not stop delivery to the listeners after it.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));

            #[cfg(feature = "tracing")]
            {
                if outcome.is_err() {
                    tracing::warn!(
                        queue = event.queue_id(),
                        event = event.event_type(),
                        "event listener panicked"
                    );
                }
            }
            #[cfg(not(feature = "tracing"))]
            let _ = outcome;
        }
    }

    /// Emits a batch of events; each event reaches all listeners before the next one.
    pub fn emit_all<'a, I>(&self, events: I)
    where
        I: IntoIterator<Item = &'a E>,
        E: 'a,
    {
        if self.listeners.is_empty() {
            return;
        }
        for event in events {
            self.emit(event);
        }
    }

    /// Returns true if there are no listeners.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Returns the number of listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: SlotEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: SlotEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// A closure-backed event listener.
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _phantom: std::marker::PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Wraps a closure as a listener.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: SlotEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}
