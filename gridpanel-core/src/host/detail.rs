//! Plugin-side contracts the router calls into.

use std::collections::HashSet;

use crate::error::Result;
use crate::panel::{DetailPayload, TabPayload};

/// Renders the detail view of one entity's records.
pub trait DetailProvider: Send + Sync {
    /// Title, eagerly shipped tab content and optional body.
    fn detail(&self, record_id: i64) -> Result<DetailPayload>;

    /// Content of one deferred tab.
    fn tab(&self, record_id: i64, tab: &str) -> Result<TabPayload>;
}

/// The host's capability layer.
pub trait CapabilityCheck: Send + Sync {
    fn allows(&self, capability: &str) -> bool;
}

/// Fixed set of granted capabilities.
#[derive(Debug, Clone, Default)]
pub struct StaticCapabilities {
    granted: HashSet<String>,
}

impl StaticCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, capability: impl Into<String>) -> Self {
        self.granted.insert(capability.into());
        self
    }
}

impl CapabilityCheck for StaticCapabilities {
    fn allows(&self, capability: &str) -> bool {
        self.granted.contains(capability)
    }
}
