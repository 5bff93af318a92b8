//! Tab declarations and keyboard input.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One declared tab of a detail panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabDefinition {
    pub id: String,
    pub label: String,
    /// Content is fetched on first activation instead of shipping with the
    /// detail payload
    #[serde(default)]
    pub deferred: bool,
}

impl TabDefinition {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            deferred: false,
        }
    }

    /// Mark the tab as lazily loaded.
    pub fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }
}

/// Check a tab list: non-empty, unique ids, eager first tab.
pub fn validate_tabs(tabs: &[TabDefinition]) -> Result<()> {
    let first = tabs
        .first()
        .ok_or_else(|| Error::config("a panel needs at least one tab"))?;
    if first.deferred {
        return Err(Error::config(format!(
            "first tab '{}' ships with the detail payload and cannot be deferred",
            first.id
        )));
    }

    let mut seen = BTreeSet::new();
    for tab in tabs {
        if tab.id.is_empty() || tab.id.contains(['&', '=', '#']) {
            return Err(Error::config(format!("invalid tab id '{}'", tab.id)));
        }
        if !seen.insert(tab.id.as_str()) {
            return Err(Error::config(format!("duplicate tab id '{}'", tab.id)));
        }
    }
    Ok(())
}

/// Directional keyboard input on the tab strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TabKey {
    Next,
    Previous,
    First,
    Last,
}

impl TabKey {
    /// Map a DOM `KeyboardEvent.key` name.
    pub fn from_key_name(name: &str) -> Option<Self> {
        match name {
            "ArrowRight" | "ArrowDown" => Some(Self::Next),
            "ArrowLeft" | "ArrowUp" => Some(Self::Previous),
            "Home" => Some(Self::First),
            "End" => Some(Self::Last),
            _ => None,
        }
    }

    /// Target index from `current` among `len` tabs, wrapping at both ends.
    pub fn target(self, current: usize, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        match self {
            Self::Next => (current + 1) % len,
            Self::Previous => (current + len - 1) % len,
            Self::First => 0,
            Self::Last => len - 1,
        }
    }
}

/// Observable tab state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabState {
    pub active_tab_id: Option<String>,
    pub loaded_tab_ids: BTreeSet<String>,
    /// Deferred tabs with a lazy fetch in flight
    pub pending_tab_ids: BTreeSet<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_tabs() {
        let tabs = vec![
            TabDefinition::new("overview", "Overview"),
            TabDefinition::new("history", "History").deferred(),
        ];
        assert!(validate_tabs(&tabs).is_ok());
        assert!(validate_tabs(&[]).is_err());
        assert!(validate_tabs(&[TabDefinition::new("a", "A").deferred()]).is_err());
        assert!(validate_tabs(&[TabDefinition::new("a", "A"), TabDefinition::new("a", "B")]).is_err());
        assert!(validate_tabs(&[TabDefinition::new("a&b", "A")]).is_err());
    }

    #[test]
    fn test_key_names() {
        assert_eq!(TabKey::from_key_name("ArrowRight"), Some(TabKey::Next));
        assert_eq!(TabKey::from_key_name("ArrowUp"), Some(TabKey::Previous));
        assert_eq!(TabKey::from_key_name("End"), Some(TabKey::Last));
        assert_eq!(TabKey::from_key_name("Enter"), None);
    }

    #[test]
    fn test_wraparound() {
        assert_eq!(TabKey::Next.target(2, 3), 0);
        assert_eq!(TabKey::Previous.target(0, 3), 2);
        assert_eq!(TabKey::Next.target(0, 3), 1);
        assert_eq!(TabKey::Last.target(0, 3), 2);
        assert_eq!(TabKey::First.target(2, 3), 0);
    }
}
