//! Active tab, loaded set, lazy loads.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::error::Result;
use crate::panel::{
    DetailPayload, DetailTransport, HashStore, PanelEvent, PanelEvents, PanelLocation,
    PanelRegion, TabContent, TabPayload,
};

use super::types::{TabDefinition, TabKey, TabState};

/// Everything a tab controller shares with the panel that owns it.
pub(crate) struct TabBinding {
    pub entity: String,
    pub tabs: Vec<TabDefinition>,
    pub transport: Arc<dyn DetailTransport>,
    pub hash: Arc<dyn HashStore>,
    pub region: Arc<PanelRegion>,
    pub events: PanelEvents,
    pub runtime: Handle,
}

#[derive(Debug, Default)]
struct TabInner {
    record_id: Option<i64>,
    /// Bumped whenever the bound record changes; lazy results carry the
    /// generation they were issued under
    generation: u64,
    active: Option<String>,
    loaded: BTreeSet<String>,
    pending: BTreeSet<String>,
}

struct TabShared {
    binding: TabBinding,
    inner: Mutex<TabInner>,
}

/// Tab strip of one detail panel.
///
/// Created by `PanelController` for its region; every input source (pointer,
/// keyboard, hash navigation) ends up in the same activation path.
#[derive(Clone)]
pub struct TabController {
    shared: Arc<TabShared>,
}

impl TabController {
    pub(crate) fn bind(binding: TabBinding) -> Self {
        Self {
            shared: Arc::new(TabShared {
                binding,
                inner: Mutex::new(TabInner::default()),
            }),
        }
    }

    /// Declared tabs in display order.
    pub fn definitions(&self) -> &[TabDefinition] {
        &self.shared.binding.tabs
    }

    pub fn state(&self) -> TabState {
        let inner = self.lock();
        TabState {
            active_tab_id: inner.active.clone(),
            loaded_tab_ids: inner.loaded.clone(),
            pending_tab_ids: inner.pending.clone(),
        }
    }

    pub fn active_tab(&self) -> Option<String> {
        self.lock().active.clone()
    }

    /// Activate a tab, writing it into the URL hash.
    ///
    /// Returns `false` for unknown tabs, the already active tab, or when no
    /// record is bound.
    pub fn switch_to(&self, tab_id: &str) -> bool {
        self.activate(tab_id, true)
    }

    /// Move along the tab strip with wraparound. Returns the tab switched to.
    pub fn handle_key(&self, key: TabKey) -> Option<String> {
        let tabs = self.definitions();
        let current = {
            let inner = self.lock();
            inner
                .active
                .as_deref()
                .and_then(|active| tabs.iter().position(|t| t.id == active))
                .unwrap_or(0)
        };
        let target = tabs.get(key.target(current, tabs.len()))?.id.clone();
        self.switch_to(&target).then_some(target)
    }

    /// Dismiss the inline error of a tab.
    pub fn dismiss_error(&self, tab_id: &str) {
        self.shared.binding.region.dismiss_tab_error(tab_id);
    }

    // ==================== Panel-driven lifecycle ====================

    /// Bind a new record: only the first tab counts as loaded.
    pub(crate) fn begin_record(&self, record_id: i64, requested_tab: Option<&str>) {
        let binding = &self.shared.binding;
        let active = self.resolve(requested_tab);
        {
            let mut inner = self.lock();
            inner.generation += 1;
            inner.record_id = Some(record_id);
            inner.loaded = self.first_tab().into_iter().collect();
            inner.pending.clear();
            inner.active = active.clone();
        }

        let ids: Vec<String> = binding.tabs.iter().map(|t| t.id.clone()).collect();
        binding.region.reset_tabs(&ids);
        binding.region.set_active_tab(active.as_deref());
    }

    /// Inject the tab content shipped with a detail payload.
    ///
    /// The active tab is re-resolved from the URL hash, and loaded lazily if
    /// the payload did not carry it.
    pub(crate) fn apply_payload(&self, payload: &DetailPayload) {
        let binding = &self.shared.binding;
        let hash = binding.hash.read();

        let mut inner = self.lock();
        let Some(record_id) = inner.record_id else {
            return;
        };

        let mut ready = Vec::new();
        for (tab, html) in &payload.tabs {
            if self.definition(tab).is_none() {
                warn!(entity = %binding.entity, record_id, tab = %tab, "payload names an unknown tab, ignoring");
                continue;
            }
            inner.loaded.insert(tab.clone());
            ready.push((tab, html));
        }

        let requested = PanelLocation::parse(&hash)
            .filter(|loc| loc.entity == binding.entity && loc.record_id == record_id)
            .and_then(|loc| loc.tab);
        let active = self.resolve(requested.as_deref());
        let changed = inner.active != active;
        inner.active = active.clone();

        let load = active.clone().filter(|tab| self.needs_load(&inner, tab));
        if let Some(tab) = &load {
            inner.pending.insert(tab.clone());
        }
        let generation = inner.generation;
        drop(inner);

        for (tab, html) in ready {
            binding
                .region
                .set_tab_content(tab, TabContent::Ready(html.clone()));
        }
        binding.region.set_active_tab(active.as_deref());
        if changed {
            if let Some(tab) = active {
                binding.events.emit(PanelEvent::TabActivated { tab });
            }
        }
        if let Some(tab) = load {
            self.spawn_load(tab, record_id, generation);
        }
    }

    /// Follow the tab named by an external hash change without rewriting it.
    pub(crate) fn sync_from_hash(&self, requested_tab: Option<&str>) {
        if let Some(tab) = self.resolve(requested_tab) {
            self.activate(&tab, false);
        }
    }

    /// Stop following the record while the panel closes.
    ///
    /// The strip keeps rendering its last state, but switches and keys are
    /// refused and lazy loads still in flight are discarded on arrival.
    pub(crate) fn detach(&self) {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.record_id = None;
        inner.pending.clear();
    }

    /// Unbind the record. Lazy loads still in flight are discarded on arrival.
    pub(crate) fn reset(&self) {
        {
            let mut inner = self.lock();
            inner.generation += 1;
            inner.record_id = None;
            inner.active = None;
            inner.loaded.clear();
            inner.pending.clear();
        }
        self.shared.binding.region.set_active_tab(None);
    }

    // ==================== Internals ====================

    fn activate(&self, tab_id: &str, write_hash: bool) -> bool {
        let binding = &self.shared.binding;
        if self.definition(tab_id).is_none() {
            debug!(entity = %binding.entity, tab = tab_id, "ignoring unknown tab");
            return false;
        }

        let mut inner = self.lock();
        let Some(record_id) = inner.record_id else {
            return false;
        };
        if inner.active.as_deref() == Some(tab_id) {
            return false;
        }
        inner.active = Some(tab_id.to_string());
        let load = self.needs_load(&inner, tab_id);
        if load {
            inner.pending.insert(tab_id.to_string());
        }
        let generation = inner.generation;
        drop(inner);

        binding.region.set_active_tab(Some(tab_id));
        if write_hash {
            let location = PanelLocation::new(binding.entity.clone(), record_id).with_tab(tab_id);
            binding.hash.write(&location.to_hash());
        }
        binding.events.emit(PanelEvent::TabActivated {
            tab: tab_id.to_string(),
        });
        if load {
            self.spawn_load(tab_id.to_string(), record_id, generation);
        }
        true
    }

    fn spawn_load(&self, tab: String, record_id: i64, generation: u64) {
        let binding = &self.shared.binding;
        debug!(entity = %binding.entity, record_id, tab = %tab, "lazy loading tab");
        binding.region.set_tab_content(&tab, TabContent::Loading);

        let this = self.clone();
        binding.runtime.spawn(async move {
            let result = this
                .shared
                .binding
                .transport
                .fetch_tab(&this.shared.binding.entity, record_id, &tab)
                .await;
            this.finish_load(&tab, generation, result);
        });
    }

    fn finish_load(&self, tab: &str, generation: u64, result: Result<TabPayload>) {
        let binding = &self.shared.binding;
        {
            let mut inner = self.lock();
            if inner.generation != generation {
                debug!(entity = %binding.entity, tab, "discarding tab content of a previous record");
                return;
            }
            inner.pending.remove(tab);
            if result.is_ok() {
                inner.loaded.insert(tab.to_string());
            }
        }

        match result {
            Ok(payload) => {
                binding
                    .region
                    .set_tab_content(tab, TabContent::Ready(payload.html));
                binding.events.emit(PanelEvent::TabLoaded {
                    tab: tab.to_string(),
                });
            }
            Err(e) if e.is_cancelled() => {
                debug!(entity = %binding.entity, tab, "tab load cancelled");
                binding.region.set_tab_content(tab, TabContent::Empty);
            }
            Err(e) => {
                warn!(entity = %binding.entity, tab, error = %e, "tab load failed");
                binding
                    .region
                    .set_tab_content(tab, TabContent::Failed(e.to_string()));
                binding.events.emit(PanelEvent::TabLoadFailed {
                    tab: tab.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    fn needs_load(&self, inner: &TabInner, tab_id: &str) -> bool {
        self.definition(tab_id).is_some_and(|t| t.deferred)
            && !inner.loaded.contains(tab_id)
            && !inner.pending.contains(tab_id)
    }

    fn definition(&self, tab_id: &str) -> Option<&TabDefinition> {
        self.shared.binding.tabs.iter().find(|t| t.id == tab_id)
    }

    fn first_tab(&self) -> Option<String> {
        self.shared.binding.tabs.first().map(|t| t.id.clone())
    }

    /// The requested tab if declared, otherwise the first tab.
    fn resolve(&self, requested: Option<&str>) -> Option<String> {
        requested
            .filter(|tab| self.definition(tab).is_some())
            .map(str::to_string)
            .or_else(|| self.first_tab())
    }

    fn lock(&self) -> MutexGuard<'_, TabInner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
