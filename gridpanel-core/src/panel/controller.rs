//! Open/close lifecycle of a detail panel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::config::PanelConfig;
use crate::error::{Error, Result};
use crate::query::{is_entity_name, PresentationRecord};
use crate::tabs::{validate_tabs, TabBinding, TabController, TabDefinition};

use super::events::{PanelEvent, PanelEvents};
use super::hash::{is_empty_hash, HashStore, MemoryHashStore, PanelLocation};
use super::region::{PanelPhase, PanelRegion};
use super::transport::{DetailPayload, DetailTransport, RequestId};

/// Observable state of a panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelState {
    pub is_open: bool,
    pub entity: String,
    /// Set while open and during the close transition
    pub record_id: Option<i64>,
    pub in_flight_request: Option<RequestId>,
    pub phase: PanelPhase,
}

struct InFlight {
    id: RequestId,
    handle: Option<AbortHandle>,
}

#[derive(Default)]
struct PanelInner {
    phase: PanelPhase,
    record_id: Option<i64>,
    /// Bumped on every open and close; transition timers carry it
    generation: u64,
    in_flight: Option<InFlight>,
    loading_timer: Option<AbortHandle>,
    transition: Option<AbortHandle>,
}

impl PanelInner {
    /// Abort the detail fetch and every timer. Returns the dropped request.
    fn cancel_pending(&mut self) -> Option<RequestId> {
        if let Some(timer) = self.loading_timer.take() {
            timer.abort();
        }
        if let Some(transition) = self.transition.take() {
            transition.abort();
        }
        self.in_flight.take().map(|request| {
            if let Some(handle) = request.handle {
                handle.abort();
            }
            request.id
        })
    }
}

struct PanelShared {
    entity: String,
    config: PanelConfig,
    transport: Arc<dyn DetailTransport>,
    hash: Arc<dyn HashStore>,
    region: Arc<PanelRegion>,
    events: PanelEvents,
    tabs: TabController,
    runtime: Handle,
    inner: Mutex<PanelInner>,
}

/// Builder for [`PanelController`].
pub struct PanelControllerBuilder {
    entity: String,
    tabs: Vec<TabDefinition>,
    transport: Option<Arc<dyn DetailTransport>>,
    hash: Option<Arc<dyn HashStore>>,
    config: PanelConfig,
}

impl PanelControllerBuilder {
    /// Declare the next tab; the first one ships with the detail payload.
    pub fn tab(mut self, tab: TabDefinition) -> Self {
        self.tabs.push(tab);
        self
    }

    pub fn tabs(mut self, tabs: impl IntoIterator<Item = TabDefinition>) -> Self {
        self.tabs.extend(tabs);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn DetailTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// The page's location hash; defaults to an in-memory one.
    pub fn hash_store(mut self, hash: Arc<dyn HashStore>) -> Self {
        self.hash = Some(hash);
        self
    }

    pub fn config(mut self, config: PanelConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate and bind the controller to the current tokio runtime.
    pub fn build(self) -> Result<PanelController> {
        if !is_entity_name(&self.entity) {
            return Err(Error::config(format!("invalid entity name '{}'", self.entity)));
        }
        validate_tabs(&self.tabs)?;
        let transport = self
            .transport
            .ok_or_else(|| Error::config(format!("panel '{}' has no transport", self.entity)))?;
        let runtime = Handle::try_current()
            .map_err(|_| Error::config("panel controllers must be built inside a tokio runtime"))?;

        let hash = self
            .hash
            .unwrap_or_else(|| Arc::new(MemoryHashStore::new()));
        let region = Arc::new(PanelRegion::new());
        let events = PanelEvents::new(self.config.event_capacity);
        let tabs = TabController::bind(TabBinding {
            entity: self.entity.clone(),
            tabs: self.tabs,
            transport: transport.clone(),
            hash: hash.clone(),
            region: region.clone(),
            events: events.clone(),
            runtime: runtime.clone(),
        });

        Ok(PanelController {
            shared: Arc::new(PanelShared {
                entity: self.entity,
                config: self.config,
                transport,
                hash,
                region,
                events,
                tabs,
                runtime,
                inner: Mutex::new(PanelInner::default()),
            }),
        })
    }
}

/// Detail panel bound to one entity and one page region.
///
/// All operations are synchronous; fetches and timers run as tasks on the
/// runtime the controller was built in. Only the most recently issued detail
/// fetch can populate the region.
#[derive(Clone)]
pub struct PanelController {
    shared: Arc<PanelShared>,
}

impl PanelController {
    pub fn builder(entity: impl Into<String>) -> PanelControllerBuilder {
        PanelControllerBuilder {
            entity: entity.into(),
            tabs: Vec::new(),
            transport: None,
            hash: None,
            config: PanelConfig::default(),
        }
    }

    pub fn entity(&self) -> &str {
        &self.shared.entity
    }

    pub fn region(&self) -> Arc<PanelRegion> {
        self.shared.region.clone()
    }

    pub fn tabs(&self) -> &TabController {
        &self.shared.tabs
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PanelEvent> {
        self.shared.events.subscribe()
    }

    pub fn state(&self) -> PanelState {
        let inner = self.lock();
        PanelState {
            is_open: inner.phase.is_open(),
            entity: self.shared.entity.clone(),
            record_id: inner.record_id,
            in_flight_request: inner.in_flight.as_ref().map(|r| r.id),
            phase: inner.phase,
        }
    }

    /// Open a record. No-op if that record is already open or the id is
    /// not positive.
    pub fn open(&self, record_id: i64) {
        let location = PanelLocation::new(self.shared.entity.clone(), record_id);
        self.open_location(location, true);
    }

    /// Open the record a grid row identifies.
    ///
    /// Returns `false` when the row carries no identity or belongs to
    /// another entity.
    pub fn open_row(&self, record: &PresentationRecord) -> bool {
        match record.identity() {
            Some(identity) if identity.entity == self.shared.entity => {
                self.open(identity.id);
                true
            }
            Some(identity) => {
                warn!(
                    entity = %self.shared.entity,
                    row_entity = %identity.entity,
                    "row belongs to another entity, ignoring"
                );
                false
            }
            None => {
                warn!(entity = %self.shared.entity, "row has no identity, ignoring");
                false
            }
        }
    }

    /// Close the panel. No-op unless open.
    pub fn close(&self) {
        let shared = &self.shared;
        let (record_id, generation) = {
            let mut inner = self.lock();
            if !inner.phase.is_open() {
                return;
            }
            if let Some(cancelled) = inner.cancel_pending() {
                debug!(entity = %shared.entity, request = %cancelled, "detail fetch cancelled by close");
            }
            inner.generation += 1;
            inner.phase = PanelPhase::Closing;
            (inner.record_id, inner.generation)
        };

        shared.tabs.detach();
        self.write_hash("");
        shared.region.hide_loading();
        shared.region.set_phase(PanelPhase::Closing);
        if let Some(record_id) = record_id {
            shared.events.emit(PanelEvent::Closing {
                entity: shared.entity.clone(),
                record_id,
            });
        }
        self.start_transition(generation);
    }

    /// Follow an external hash change (back/forward navigation).
    ///
    /// An empty hash closes the panel; a hash for this entity opens its
    /// record, or only switches tabs if that record is already open. Hashes
    /// for other entities are ignored.
    pub fn handle_hash_change(&self, hash: &str) {
        if is_empty_hash(hash) {
            self.close();
            return;
        }
        let Some(location) = PanelLocation::parse(hash) else {
            debug!(entity = %self.shared.entity, hash, "hash names no record");
            return;
        };
        if location.entity != self.shared.entity {
            return;
        }

        let already_open = {
            let inner = self.lock();
            inner.phase.is_open() && inner.record_id == Some(location.record_id)
        };
        if already_open {
            self.shared.tabs.sync_from_hash(location.tab.as_deref());
        } else {
            self.open_location(location, false);
        }
    }

    /// Open whatever the current hash deep-links to.
    pub fn restore_from_hash(&self) {
        let hash = self.shared.hash.read();
        if !is_empty_hash(&hash) {
            self.handle_hash_change(&hash);
        }
    }

    /// Fetch the open record's detail payload again. Returns `false` when
    /// no record is open.
    pub fn reload(&self) -> bool {
        let record_id = {
            let inner = self.lock();
            match inner.record_id {
                Some(id) if inner.phase.is_open() => id,
                _ => return false,
            }
        };
        let requested = PanelLocation::parse(&self.shared.hash.read()).and_then(|loc| loc.tab);
        self.shared.tabs.begin_record(record_id, requested.as_deref());
        self.start_fetch(record_id);
        true
    }

    // ==================== Internals ====================

    fn open_location(&self, location: PanelLocation, write_hash: bool) {
        let shared = &self.shared;
        let record_id = location.record_id;
        if record_id <= 0 {
            debug!(entity = %shared.entity, record_id, "ignoring non-positive record id");
            return;
        }
        let generation = {
            let mut inner = self.lock();
            if inner.phase.is_open() && inner.record_id == Some(record_id) {
                debug!(entity = %shared.entity, record_id, "record already open");
                return;
            }
            if let Some(cancelled) = inner.cancel_pending() {
                debug!(entity = %shared.entity, request = %cancelled, "superseded detail fetch cancelled");
            }
            inner.generation += 1;
            inner.phase = PanelPhase::Opening;
            inner.record_id = Some(record_id);
            inner.generation
        };

        if write_hash {
            self.write_hash(&location.to_hash());
        }
        shared.region.hide_loading();
        shared.region.begin_opening(&shared.entity, record_id);
        shared.tabs.begin_record(record_id, location.tab.as_deref());
        shared.events.emit(PanelEvent::Opening {
            entity: shared.entity.clone(),
            record_id,
        });

        self.start_transition(generation);
        self.start_fetch(record_id);
    }

    /// Write the hash unless it already holds `value`, so history only
    /// grows on real navigation.
    fn write_hash(&self, value: &str) {
        let current = self.shared.hash.read();
        let unchanged = if is_empty_hash(value) {
            is_empty_hash(&current)
        } else {
            current == value
        };
        if !unchanged {
            self.shared.hash.write(value);
        }
    }

    fn start_transition(&self, generation: u64) {
        let this = self.clone();
        let delay = self.shared.config.transition();
        let handle = self
            .shared
            .runtime
            .spawn(async move {
                tokio::time::sleep(delay).await;
                this.finish_transition(generation);
            })
            .abort_handle();

        let mut inner = self.lock();
        if inner.generation == generation {
            inner.transition = Some(handle);
        } else {
            handle.abort();
        }
    }

    fn finish_transition(&self, generation: u64) {
        let shared = &self.shared;
        let mut inner = self.lock();
        if inner.generation != generation {
            return;
        }
        inner.transition = None;

        match inner.phase {
            PanelPhase::Opening => {
                inner.phase = PanelPhase::Open;
                let record_id = inner.record_id;
                drop(inner);

                shared.region.set_phase(PanelPhase::Open);
                shared.events.emit(PanelEvent::LayoutChanged { panel_open: true });
                if let Some(record_id) = record_id {
                    shared.events.emit(PanelEvent::Opened {
                        entity: shared.entity.clone(),
                        record_id,
                    });
                }
            }
            PanelPhase::Closing => {
                inner.phase = PanelPhase::Closed;
                inner.record_id = None;
                drop(inner);

                shared.tabs.reset();
                shared.region.clear();
                shared.events.emit(PanelEvent::LayoutChanged { panel_open: false });
                shared.events.emit(PanelEvent::Closed {
                    entity: shared.entity.clone(),
                });
            }
            PanelPhase::Open | PanelPhase::Closed => {}
        }
    }

    fn start_fetch(&self, record_id: i64) {
        let shared = &self.shared;
        let request_id = RequestId::new();
        {
            let mut inner = self.lock();
            if let Some(timer) = inner.loading_timer.take() {
                timer.abort();
            }
            if let Some(previous) = inner.in_flight.take() {
                if let Some(handle) = previous.handle {
                    handle.abort();
                }
                debug!(entity = %shared.entity, request = %previous.id, "superseded detail fetch cancelled");
            }
            inner.in_flight = Some(InFlight {
                id: request_id,
                handle: None,
            });
        }
        debug!(entity = %shared.entity, record_id, request = %request_id, "fetching detail");

        let this = self.clone();
        let fetch = shared
            .runtime
            .spawn(async move {
                let result = this
                    .shared
                    .transport
                    .fetch_detail(&this.shared.entity, record_id)
                    .await;
                this.complete_fetch(request_id, result);
            })
            .abort_handle();

        let this = self.clone();
        let delay = shared.config.loading_delay();
        let timer = shared
            .runtime
            .spawn(async move {
                tokio::time::sleep(delay).await;
                this.show_loading(request_id);
            })
            .abort_handle();

        let mut inner = self.lock();
        match inner.in_flight.as_mut() {
            Some(request) if request.id == request_id => {
                request.handle = Some(fetch);
                inner.loading_timer = Some(timer);
            }
            // Already completed or superseded
            _ => {
                fetch.abort();
                timer.abort();
            }
        }
    }

    fn show_loading(&self, request_id: RequestId) {
        {
            let mut inner = self.lock();
            if inner.in_flight.as_ref().map(|r| r.id) != Some(request_id) {
                return;
            }
            inner.loading_timer = None;
        }
        self.shared.region.show_loading();
    }

    fn complete_fetch(&self, request_id: RequestId, result: Result<DetailPayload>) {
        let shared = &self.shared;
        let record_id = {
            let mut inner = self.lock();
            if inner.in_flight.as_ref().map(|r| r.id) != Some(request_id) {
                debug!(entity = %shared.entity, request = %request_id, "discarding superseded detail response");
                return;
            }
            inner.in_flight = None;
            if let Some(timer) = inner.loading_timer.take() {
                timer.abort();
            }
            inner.record_id
        };
        let Some(record_id) = record_id else {
            return;
        };

        shared.region.hide_loading();
        match result {
            Ok(payload) => {
                shared
                    .region
                    .apply_detail(&payload.title, payload.content.as_deref());
                shared.tabs.apply_payload(&payload);
                shared.events.emit(PanelEvent::DataLoaded {
                    entity: shared.entity.clone(),
                    record_id,
                });
            }
            Err(e) if e.is_cancelled() => {
                debug!(entity = %shared.entity, record_id, "detail fetch cancelled");
            }
            Err(e) => {
                warn!(entity = %shared.entity, record_id, error = %e, "detail fetch failed");
                shared.region.show_error(e.to_string());
                shared.events.emit(PanelEvent::FetchFailed {
                    entity: shared.entity.clone(),
                    record_id,
                    message: e.to_string(),
                });
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, PanelInner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
