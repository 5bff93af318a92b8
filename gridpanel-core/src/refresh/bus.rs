//! Named events with namespaced listeners.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::trace;

/// Callback bound to an event name; receives the name that fired.
pub type Listener = Arc<dyn Fn(&str) + Send + Sync>;

/// Namespace under which auto-refresh binds an entity's listeners.
pub fn refresh_namespace(entity: &str) -> String {
    format!("refresh.{}", entity)
}

struct Binding {
    event: String,
    namespace: String,
    listener: Listener,
}

/// Page-level event bus, the counterpart of namespaced DOM events.
///
/// Removing listeners always names a namespace, so one subscriber can never
/// unbind another's listener on the same event.
#[derive(Default)]
pub struct EventBus {
    bindings: RwLock<Vec<Binding>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a listener to `event` under `namespace`.
    pub fn on<F>(&self, event: impl Into<String>, namespace: impl Into<String>, listener: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Binding {
                event: event.into(),
                namespace: namespace.into(),
                listener: Arc::new(listener),
            });
    }

    /// Remove the listeners of `namespace`, on one event or on all of them.
    /// Returns how many were removed.
    pub fn off(&self, event: Option<&str>, namespace: &str) -> usize {
        let mut bindings = self.bindings.write().unwrap_or_else(PoisonError::into_inner);
        let before = bindings.len();
        bindings.retain(|b| {
            b.namespace != namespace || event.is_some_and(|event| b.event != event)
        });
        before - bindings.len()
    }

    /// Fire an event. Returns how many listeners ran.
    pub fn emit(&self, event: &str) -> usize {
        // Listeners run outside the lock so they may bind or unbind
        let listeners: Vec<Listener> = self
            .bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|b| b.event == event)
            .map(|b| b.listener.clone())
            .collect();

        trace!(event, listeners = listeners.len(), "event emitted");
        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    /// Number of listeners bound to an event.
    pub fn listener_count(&self, event: &str) -> usize {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|b| b.event == event)
            .count()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .bindings
            .read()
            .map(|b| b.len())
            .unwrap_or_default();
        f.debug_struct("EventBus").field("bindings", &count).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(bus: &EventBus, event: &str, namespace: &str) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        bus.on(event, namespace, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        count
    }

    #[test]
    fn test_emit_reaches_matching_listeners() {
        let bus = EventBus::new();
        let saved = counter(&bus, "order_saved", "refresh.order");
        let deleted = counter(&bus, "order_deleted", "refresh.order");

        assert_eq!(bus.emit("order_saved"), 1);
        assert_eq!(saved.load(Ordering::SeqCst), 1);
        assert_eq!(deleted.load(Ordering::SeqCst), 0);
        assert_eq!(bus.emit("unknown"), 0);
    }

    #[test]
    fn test_off_only_touches_its_namespace() {
        let bus = EventBus::new();
        let orders = counter(&bus, "saved", &refresh_namespace("order"));
        let customers = counter(&bus, "saved", &refresh_namespace("customer"));

        assert_eq!(bus.off(None, "refresh.order"), 1);
        bus.emit("saved");
        assert_eq!(orders.load(Ordering::SeqCst), 0);
        assert_eq!(customers.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count("saved"), 1);
    }

    #[test]
    fn test_off_single_event() {
        let bus = EventBus::new();
        counter(&bus, "a", "ns");
        counter(&bus, "b", "ns");
        assert_eq!(bus.off(Some("a"), "ns"), 1);
        assert_eq!(bus.listener_count("a"), 0);
        assert_eq!(bus.listener_count("b"), 1);
    }
}
