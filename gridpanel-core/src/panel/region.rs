//! The DOM region a panel/tab pair is bound to, as a render model.
//!
//! Controllers are the only writers; hosts read [`PanelRegion::snapshot`]
//! and render it. Users may dismiss inline errors.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Visual lifecycle of the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PanelPhase {
    #[default]
    Closed,
    Opening,
    Open,
    Closing,
}

impl PanelPhase {
    /// `Opening` and `Open` both count as open for transitions.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Opening | Self::Open)
    }
}

impl std::fmt::Display for PanelPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Opening => write!(f, "opening"),
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
        }
    }
}

/// Content of one tab pane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", content = "html", rename_all = "snake_case")]
pub enum TabContent {
    #[default]
    Empty,
    Loading,
    Ready(String),
    /// Inline, dismissible error
    Failed(String),
}

/// Everything a renderer needs to draw the panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RegionSnapshot {
    pub phase: PanelPhase,
    pub entity: Option<String>,
    pub record_id: Option<i64>,
    pub title: Option<String>,
    /// Content outside the tab panes
    pub body: Option<String>,
    pub loading_visible: bool,
    /// How many times the loading indicator has been shown
    pub loading_shows: u32,
    /// Inline, dismissible error for the whole detail fetch
    pub error: Option<String>,
    pub active_tab: Option<String>,
    pub tabs: BTreeMap<String, TabContent>,
    pub loaded_at: Option<DateTime<Utc>>,
}

/// Shared render model of one panel.
#[derive(Debug, Default)]
pub struct PanelRegion {
    state: RwLock<RegionSnapshot>,
}

impl PanelRegion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current render state.
    pub fn snapshot(&self) -> RegionSnapshot {
        self.read().clone()
    }

    /// Dismiss the panel-level inline error.
    pub fn dismiss_error(&self) {
        self.write().error = None;
    }

    /// Dismiss a tab's inline error, leaving the pane empty.
    pub fn dismiss_tab_error(&self, tab: &str) {
        let mut state = self.write();
        if let Some(content @ TabContent::Failed(_)) = state.tabs.get_mut(tab) {
            *content = TabContent::Empty;
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RegionSnapshot> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegionSnapshot> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ==================== Controller writes ====================

    pub(crate) fn begin_opening(&self, entity: &str, record_id: i64) {
        let mut state = self.write();
        state.phase = PanelPhase::Opening;
        if state.record_id != Some(record_id) || state.entity.as_deref() != Some(entity) {
            state.title = None;
            state.body = None;
            state.tabs.clear();
            state.loaded_at = None;
        }
        state.entity = Some(entity.to_string());
        state.record_id = Some(record_id);
        state.error = None;
    }

    pub(crate) fn set_phase(&self, phase: PanelPhase) {
        self.write().phase = phase;
    }

    pub(crate) fn show_loading(&self) {
        let mut state = self.write();
        state.loading_visible = true;
        state.loading_shows += 1;
    }

    pub(crate) fn hide_loading(&self) {
        self.write().loading_visible = false;
    }

    pub(crate) fn show_error(&self, message: impl Into<String>) {
        self.write().error = Some(message.into());
    }

    pub(crate) fn apply_detail(&self, title: &str, body: Option<&str>) {
        let mut state = self.write();
        state.title = Some(title.to_string());
        state.body = body.map(str::to_string);
        state.error = None;
        state.loaded_at = Some(Utc::now());
    }

    pub(crate) fn set_tab_content(&self, tab: &str, content: TabContent) {
        self.write().tabs.insert(tab.to_string(), content);
    }

    #[cfg(test)]
    pub(crate) fn tab_content(&self, tab: &str) -> TabContent {
        self.read().tabs.get(tab).cloned().unwrap_or_default()
    }

    pub(crate) fn set_active_tab(&self, tab: Option<&str>) {
        self.write().active_tab = tab.map(str::to_string);
    }

    pub(crate) fn reset_tabs(&self, tab_ids: &[String]) {
        let mut state = self.write();
        state.tabs = tab_ids
            .iter()
            .map(|id| (id.clone(), TabContent::Empty))
            .collect();
    }

    /// Back to the closed, empty state.
    pub(crate) fn clear(&self) {
        let shows = self.read().loading_shows;
        *self.write() = RegionSnapshot {
            loading_shows: shows,
            ..RegionSnapshot::default()
        };
    }
}
