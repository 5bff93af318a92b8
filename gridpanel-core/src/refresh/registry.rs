//! Debounced auto-refresh of grids on named update events.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::config::RefreshDefaults;
use crate::error::{Error, Result};
use crate::query::is_entity_name;

use super::bus::{refresh_namespace, EventBus};
use super::grid::{GridClient, GridLocator, GridPresence};

/// Custom refresh action run instead of re-fetching the grid.
pub type RefreshAction = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// What a registration asks for.
#[derive(Clone, Default)]
pub struct RefreshConfig {
    pub grid_selector: String,
    pub events: Vec<String>,
    /// Falls back to [`RefreshDefaults::debounce_ms`]
    pub debounce_ms: Option<u64>,
    grid: Option<GridClient>,
    action: Option<RefreshAction>,
}

impl RefreshConfig {
    pub fn new(grid_selector: impl Into<String>) -> Self {
        Self {
            grid_selector: grid_selector.into(),
            ..Self::default()
        }
    }

    /// Add a trigger event name.
    pub fn on_event(mut self, event: impl Into<String>) -> Self {
        self.events.push(event.into());
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = Some(ms);
        self
    }

    /// Refresh by re-issuing this grid's current request.
    pub fn grid(mut self, grid: GridClient) -> Self {
        self.grid = Some(grid);
        self
    }

    /// Refresh by running a custom action.
    pub fn action<F>(mut self, action: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        self.action = Some(Arc::new(action));
        self
    }
}

impl std::fmt::Debug for RefreshConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshConfig")
            .field("grid_selector", &self.grid_selector)
            .field("events", &self.events)
            .field("debounce_ms", &self.debounce_ms)
            .field("custom_action", &self.action.is_some())
            .finish()
    }
}

/// A registered subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSubscription {
    pub entity: String,
    pub grid_selector: String,
    pub trigger_event_names: Vec<String>,
    pub debounce_window: Duration,
}

#[derive(Clone)]
enum RefreshTarget {
    Grid(GridClient),
    Custom(RefreshAction),
}

struct Entry {
    subscription: RefreshSubscription,
    target: RefreshTarget,
}

struct Timer {
    seq: u64,
    handle: AbortHandle,
}

#[derive(Default)]
struct RegistryInner {
    entries: HashMap<String, Entry>,
    /// Keyed by (entity, event): events never reset each other's timers
    timers: HashMap<(String, String), Timer>,
    seq: u64,
    refreshes: HashMap<String, u64>,
}

struct RegistryShared {
    bus: Arc<EventBus>,
    locator: Arc<dyn GridLocator>,
    defaults: RefreshDefaults,
    runtime: Handle,
    inner: Mutex<RegistryInner>,
}

/// Maps update events to grid refreshes, debounced per event name.
#[derive(Clone)]
pub struct AutoRefreshRegistry {
    shared: Arc<RegistryShared>,
}

impl AutoRefreshRegistry {
    /// Create a registry bound to the current tokio runtime.
    pub fn new(
        bus: Arc<EventBus>,
        locator: Arc<dyn GridLocator>,
        defaults: RefreshDefaults,
    ) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|_| Error::config("refresh registry must be created inside a tokio runtime"))?;
        Ok(Self {
            shared: Arc::new(RegistryShared {
                bus,
                locator,
                defaults,
                runtime,
                inner: Mutex::new(RegistryInner::default()),
            }),
        })
    }

    /// Subscribe an entity's grid to update events.
    ///
    /// Registering an entity again replaces its previous subscription.
    pub fn register(&self, entity: &str, config: RefreshConfig) -> Result<()> {
        if !is_entity_name(entity) {
            return Err(Error::config(format!("invalid entity name '{}'", entity)));
        }
        if config.grid_selector.trim().is_empty() {
            return Err(Error::config(format!("refresh for '{}' needs a grid selector", entity)));
        }
        if config.events.is_empty() || config.events.iter().any(|e| e.trim().is_empty()) {
            return Err(Error::config(format!(
                "refresh for '{}' needs at least one named trigger event",
                entity
            )));
        }
        let target = match (config.action, config.grid) {
            (Some(action), _) => RefreshTarget::Custom(action),
            (None, Some(grid)) => RefreshTarget::Grid(grid),
            (None, None) => {
                return Err(Error::config(format!(
                    "refresh for '{}' needs a grid or a custom action",
                    entity
                )))
            }
        };

        self.unregister(entity);

        let mut seen = HashSet::new();
        let events: Vec<String> = config
            .events
            .into_iter()
            .filter(|e| seen.insert(e.clone()))
            .collect();
        let subscription = RefreshSubscription {
            entity: entity.to_string(),
            grid_selector: config.grid_selector,
            trigger_event_names: events.clone(),
            debounce_window: config
                .debounce_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| self.shared.defaults.debounce()),
        };

        let namespace = refresh_namespace(entity);
        for event in &events {
            let registry = Arc::downgrade(&self.shared);
            let owner = entity.to_string();
            self.shared.bus.on(event.clone(), namespace.clone(), move |fired| {
                if let Some(shared) = Weak::upgrade(&registry) {
                    AutoRefreshRegistry { shared }.schedule(&owner, fired);
                }
            });
        }

        debug!(entity, events = ?events, "auto-refresh registered");
        self.lock().entries.insert(
            entity.to_string(),
            Entry {
                subscription,
                target,
            },
        );
        Ok(())
    }

    /// Drop an entity's subscription, its pending timers and only its
    /// listeners. Returns whether it was registered.
    pub fn unregister(&self, entity: &str) -> bool {
        let removed = {
            let mut inner = self.lock();
            inner.timers.retain(|(owner, _), timer| {
                if owner == entity {
                    timer.handle.abort();
                    false
                } else {
                    true
                }
            });
            inner.entries.remove(entity).is_some()
        };
        self.shared.bus.off(None, &refresh_namespace(entity));
        if removed {
            debug!(entity, "auto-refresh unregistered");
        }
        removed
    }

    /// Fire an update event on the bus.
    pub fn trigger(&self, event: &str) -> usize {
        self.shared.bus.emit(event)
    }

    pub fn subscription(&self, entity: &str) -> Option<RefreshSubscription> {
        self.lock()
            .entries
            .get(entity)
            .map(|e| e.subscription.clone())
    }

    pub fn subscriptions(&self) -> Vec<RefreshSubscription> {
        let mut subscriptions: Vec<_> = self
            .lock()
            .entries
            .values()
            .map(|e| e.subscription.clone())
            .collect();
        subscriptions.sort_by(|a, b| a.entity.cmp(&b.entity));
        subscriptions
    }

    /// Debounce timers currently waiting for an entity.
    pub fn pending_timers(&self, entity: &str) -> usize {
        self.lock()
            .timers
            .keys()
            .filter(|(owner, _)| owner == entity)
            .count()
    }

    /// Refreshes that actually ran for an entity.
    pub fn refresh_count(&self, entity: &str) -> u64 {
        self.lock().refreshes.get(entity).copied().unwrap_or(0)
    }

    // ==================== Internals ====================

    /// Restart the (entity, event) debounce timer.
    fn schedule(&self, entity: &str, event: &str) {
        let mut inner = self.lock();
        let Some(window) = inner
            .entries
            .get(entity)
            .map(|e| e.subscription.debounce_window)
        else {
            return;
        };

        inner.seq += 1;
        let seq = inner.seq;
        let key = (entity.to_string(), event.to_string());
        if let Some(previous) = inner.timers.remove(&key) {
            previous.handle.abort();
        }

        let this = self.clone();
        let (owner, fired) = key.clone();
        let handle = self
            .shared
            .runtime
            .spawn(async move {
                tokio::time::sleep(window).await;
                this.fire(&owner, &fired, seq).await;
            })
            .abort_handle();
        inner.timers.insert(key, Timer { seq, handle });
    }

    async fn fire(&self, entity: &str, event: &str, seq: u64) {
        let (selector, target) = {
            let mut inner = self.lock();
            let key = (entity.to_string(), event.to_string());
            match inner.timers.get(&key) {
                Some(timer) if timer.seq == seq => {
                    inner.timers.remove(&key);
                }
                _ => return,
            }
            let Some(entry) = inner.entries.get(entity) else {
                return;
            };
            (
                entry.subscription.grid_selector.clone(),
                entry.target.clone(),
            )
        };

        match self.shared.locator.locate(&selector) {
            GridPresence::Absent => {
                debug!(entity, event, selector = %selector, "grid not on page, skipping refresh");
                return;
            }
            GridPresence::NestedInDetail => {
                debug!(entity, event, selector = %selector, "grid nested in detail panel, skipping refresh");
                return;
            }
            GridPresence::Present => {}
        }

        debug!(entity, event, "refreshing grid");
        *self.lock().refreshes.entry(entity.to_string()).or_default() += 1;
        let result = match target {
            RefreshTarget::Grid(grid) => grid.reload().await.map(|_| ()),
            RefreshTarget::Custom(action) => action().await,
        };
        if let Err(e) = result {
            warn!(entity, event, error = %e, "refresh failed");
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::query::ListRequest;
    use crate::refresh::grid::tests::RecordingSource;
    use crate::refresh::GridDirectory;
    use futures::FutureExt;
    use pretty_assertions::assert_eq;

    struct Fixture {
        registry: AutoRefreshRegistry,
        bus: Arc<EventBus>,
        directory: Arc<GridDirectory>,
    }

    fn fixture() -> Fixture {
        let bus = Arc::new(EventBus::new());
        let directory = Arc::new(GridDirectory::new());
        let registry =
            AutoRefreshRegistry::new(bus.clone(), directory.clone(), RefreshDefaults::default())
                .unwrap();
        Fixture {
            registry,
            bus,
            directory,
        }
    }

    fn counting(config: RefreshConfig) -> (RefreshConfig, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let config = config.action(move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<(), Error>(())
            }
            .boxed()
        });
        (config, count)
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_validation() {
        let f = fixture();
        let (no_selector, _) = counting(RefreshConfig::new("").on_event("saved"));
        assert!(f.registry.register("order", no_selector).is_err());
        let (no_events, _) = counting(RefreshConfig::new("#orders"));
        assert!(f.registry.register("order", no_events).is_err());
        let no_target = RefreshConfig::new("#orders").on_event("saved");
        assert!(f.registry.register("order", no_target).is_err());
        assert!(f.registry.subscriptions().is_empty());
        assert_eq!(f.bus.listener_count("saved"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_into_one_refresh() {
        let f = fixture();
        f.directory.mount("#orders");
        let (config, count) = counting(RefreshConfig::new("#orders").on_event("order_saved"));
        f.registry.register("order", config).unwrap();

        for _ in 0..5 {
            f.registry.trigger("order_saved");
            advance(50).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(f.registry.pending_timers("order"), 1);

        advance(400).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(f.registry.refresh_count("order"), 1);
        assert_eq!(f.registry.pending_timers("order"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_refresh_separately() {
        let f = fixture();
        f.directory.mount("#orders");
        let (config, count) = counting(RefreshConfig::new("#orders").on_event("order_saved"));
        f.registry.register("order", config).unwrap();

        f.registry.trigger("order_saved");
        advance(400).await;
        f.registry.trigger("order_saved");
        advance(400).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timers_are_per_event_name() {
        let f = fixture();
        f.directory.mount("#orders");
        let (config, count) = counting(
            RefreshConfig::new("#orders")
                .on_event("order_saved")
                .on_event("order_deleted")
                .debounce_ms(100),
        );
        f.registry.register("order", config).unwrap();

        f.registry.trigger("order_saved");
        advance(50).await;
        f.registry.trigger("order_deleted");
        assert_eq!(f.registry.pending_timers("order"), 2);
        advance(200).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unregister_is_namespaced() {
        let f = fixture();
        f.directory.mount("#orders");
        f.directory.mount("#invoices");
        let (orders, order_count) = counting(RefreshConfig::new("#orders").on_event("saved"));
        let (invoices, invoice_count) = counting(RefreshConfig::new("#invoices").on_event("saved"));
        f.registry.register("order", orders).unwrap();
        f.registry.register("invoice", invoices).unwrap();
        assert_eq!(f.bus.listener_count("saved"), 2);

        assert!(f.registry.unregister("order"));
        assert!(!f.registry.unregister("order"));
        assert_eq!(f.bus.listener_count("saved"), 1);

        f.registry.trigger("saved");
        advance(400).await;
        assert_eq!(order_count.load(Ordering::SeqCst), 0);
        assert_eq!(invoice_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unregister_cancels_pending_timers() {
        let f = fixture();
        f.directory.mount("#orders");
        let (config, count) = counting(RefreshConfig::new("#orders").on_event("saved"));
        f.registry.register("order", config).unwrap();

        f.registry.trigger("saved");
        advance(100).await;
        f.registry.unregister("order");
        advance(400).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(f.registry.pending_timers("order"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_and_nested_grids_are_skipped() {
        let f = fixture();
        f.directory.mount_in_detail("#customer-orders");
        let (absent, absent_count) = counting(RefreshConfig::new("#orders").on_event("saved"));
        let (nested, nested_count) =
            counting(RefreshConfig::new("#customer-orders").on_event("saved"));
        f.registry.register("order", absent).unwrap();
        f.registry.register("customer-order", nested).unwrap();

        f.registry.trigger("saved");
        advance(400).await;
        assert_eq!(absent_count.load(Ordering::SeqCst), 0);
        assert_eq!(nested_count.load(Ordering::SeqCst), 0);
        assert_eq!(f.registry.refresh_count("order"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_refresh_reissues_grid_request() {
        let f = fixture();
        f.directory.mount("#orders");
        let source = Arc::new(RecordingSource::default());
        let grid = GridClient::new("order", source.clone());
        grid.set_request(ListRequest::new(0).page(3, 10).search("late"));

        f.registry
            .register("order", RefreshConfig::new("#orders").on_event("saved").grid(grid.clone()))
            .unwrap();
        f.registry.trigger("saved");
        f.registry.trigger("saved");
        advance(400).await;

        let requests = source.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].start, 30);
        assert_eq!(requests[0].search.value, "late");
        assert_eq!(grid.last_response().map(|r| r.draw), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reregister_replaces_subscription() {
        let f = fixture();
        let (first, _) = counting(RefreshConfig::new("#orders").on_event("saved"));
        let (second, _) = counting(RefreshConfig::new("#orders").on_event("paid").debounce_ms(50));
        f.registry.register("order", first).unwrap();
        f.registry.register("order", second).unwrap();

        assert_eq!(f.bus.listener_count("saved"), 0);
        assert_eq!(f.bus.listener_count("paid"), 1);
        let subscription = f.registry.subscription("order").unwrap();
        assert_eq!(subscription.trigger_event_names, vec!["paid".to_string()]);
        assert_eq!(subscription.debounce_window, Duration::from_millis(50));
    }
}
