//! URL hash encoding of the open panel: `#<entity>-<id>[&tab=<tab>]`.

use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use regex::Regex;

fn record_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<entity>[A-Za-z0-9_]+(?:-[A-Za-z0-9_]+)*)-(?P<id>\d+)$")
            .expect("record hash pattern")
    })
}

/// The `(entity, record, tab)` a hash points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PanelLocation {
    pub entity: String,
    pub record_id: i64,
    pub tab: Option<String>,
}

impl PanelLocation {
    pub fn new(entity: impl Into<String>, record_id: i64) -> Self {
        Self {
            entity: entity.into(),
            record_id,
            tab: None,
        }
    }

    pub fn with_tab(mut self, tab: impl Into<String>) -> Self {
        self.tab = Some(tab.into());
        self
    }

    /// Parse a hash, with or without the leading `#`.
    ///
    /// Returns `None` for an empty hash or one that names no record. Unknown
    /// `key=value` parameters after the record are ignored.
    pub fn parse(hash: &str) -> Option<Self> {
        let hash = hash.trim().trim_start_matches('#');
        let mut parts = hash.split('&');
        let head = parts.next()?;
        let caps = record_pattern().captures(head)?;
        let record_id = caps["id"].parse().ok()?;

        let tab = parts
            .filter_map(|p| p.split_once('='))
            .find(|(k, _)| *k == "tab")
            .map(|(_, v)| v.to_string())
            .filter(|v| !v.is_empty());

        Some(Self {
            entity: caps["entity"].to_string(),
            record_id,
            tab,
        })
    }

    /// Encode as a hash with the leading `#`.
    pub fn to_hash(&self) -> String {
        match &self.tab {
            Some(tab) => format!("#{}-{}&tab={}", self.entity, self.record_id, tab),
            None => format!("#{}-{}", self.entity, self.record_id),
        }
    }
}

impl std::fmt::Display for PanelLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hash())
    }
}

/// Whether a hash encodes a closed panel.
pub fn is_empty_hash(hash: &str) -> bool {
    hash.trim().trim_start_matches('#').is_empty()
}

/// The host page's location hash.
///
/// Writing the hash is expected to push a history entry; hosts forward
/// external changes back through `PanelController::handle_hash_change`.
pub trait HashStore: Send + Sync {
    fn read(&self) -> String;
    fn write(&self, hash: &str);
}

/// In-memory hash with a write history.
#[derive(Debug, Default)]
pub struct MemoryHashStore {
    state: Mutex<(String, Vec<String>)>,
}

impl MemoryHashStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing hash (e.g. a deep link).
    pub fn with_hash(hash: impl Into<String>) -> Self {
        Self {
            state: Mutex::new((hash.into(), Vec::new())),
        }
    }

    /// Every value written so far, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.lock().1.clone()
    }

    fn lock(&self) -> MutexGuard<'_, (String, Vec<String>)> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HashStore for MemoryHashStore {
    fn read(&self) -> String {
        self.lock().0.clone()
    }

    fn write(&self, hash: &str) {
        let mut state = self.lock();
        state.0 = hash.to_string();
        state.1.push(hash.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip() {
        let loc = PanelLocation::new("widget", 42);
        assert_eq!(loc.to_hash(), "#widget-42");
        assert_eq!(PanelLocation::parse("#widget-42"), Some(loc.clone()));

        let tabbed = loc.with_tab("history");
        assert_eq!(tabbed.to_hash(), "#widget-42&tab=history");
        assert_eq!(PanelLocation::parse(&tabbed.to_hash()), Some(tabbed));
    }

    #[test]
    fn test_hyphenated_entity() {
        let loc = PanelLocation::parse("support-ticket-7").unwrap();
        assert_eq!(loc.entity, "support-ticket");
        assert_eq!(loc.record_id, 7);
    }

    #[test]
    fn test_unknown_params_ignored() {
        let loc = PanelLocation::parse("#widget-3&ref=mail&tab=notes").unwrap();
        assert_eq!(loc.tab.as_deref(), Some("notes"));
    }

    #[test]
    fn test_rejects_non_records() {
        assert_eq!(PanelLocation::parse(""), None);
        assert_eq!(PanelLocation::parse("#"), None);
        assert_eq!(PanelLocation::parse("#widget"), None);
        assert_eq!(PanelLocation::parse("#widget-abc"), None);
        assert_eq!(PanelLocation::parse("#-5"), None);
    }

    #[test]
    fn test_empty_hash() {
        assert!(is_empty_hash(""));
        assert!(is_empty_hash("#"));
        assert!(!is_empty_hash("#widget-1"));
    }

    #[test]
    fn test_memory_store_history() {
        let store = MemoryHashStore::new();
        store.write("#a-1");
        store.write("");
        assert_eq!(store.read(), "");
        assert_eq!(store.history(), vec!["#a-1".to_string(), String::new()]);
    }

    #[test]
    fn test_memory_store_survives_poisoned_lock() {
        let store = std::sync::Arc::new(MemoryHashStore::with_hash("#a-1"));
        let holder = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.state.lock().unwrap();
            panic!("writer panicked");
        })
        .join();
        assert!(store.state.is_poisoned());

        assert_eq!(store.read(), "#a-1");
        store.write("#b-2");
        assert_eq!(store.read(), "#b-2");
        assert_eq!(store.history(), vec!["#b-2".to_string()]);
    }
}
