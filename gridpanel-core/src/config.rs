//! Framework configuration.
//!
//! Every section deserializes with defaults, so a host can ship a partial
//! JSON document and only override what it cares about.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Upper bound for any configured page size.
pub const HARD_MAX_PAGE_SIZE: usize = 1000;

// =============================================================================
// Query limits
// =============================================================================

/// Page size bounds for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryLimits {
    /// Page size used when the request carries none
    pub default_page_size: usize,
    /// Largest page a single request may fetch
    pub max_page_size: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_page_size: 25,
            max_page_size: 100,
        }
    }
}

impl QueryLimits {
    /// Resolve a requested page length against these limits.
    ///
    /// A missing length uses `default_page_size`. Zero or negative lengths
    /// (`-1` means "all" on the wire) resolve to the maximum; the result is
    /// never above [`HARD_MAX_PAGE_SIZE`].
    pub fn resolve_page_size(&self, requested: Option<i64>) -> usize {
        let max = self.max_page_size.clamp(1, HARD_MAX_PAGE_SIZE);
        match requested {
            None => self.default_page_size.clamp(1, max),
            Some(len) if len <= 0 => max,
            Some(len) => usize::try_from(len).map_or(max, |len| len.min(max)),
        }
    }
}

// =============================================================================
// Panel timing
// =============================================================================

/// Timing for the detail panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Duration of the open/close visual transition
    pub transition_ms: u64,
    /// Delay before the loading indicator appears
    pub loading_delay_ms: u64,
    /// Capacity of the panel event channel
    pub event_capacity: usize,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            transition_ms: 300,
            loading_delay_ms: 150,
            event_capacity: 64,
        }
    }
}

impl PanelConfig {
    pub fn transition(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }

    pub fn loading_delay(&self) -> Duration {
        Duration::from_millis(self.loading_delay_ms)
    }

    /// Set the transition duration.
    pub fn with_transition_ms(mut self, ms: u64) -> Self {
        self.transition_ms = ms;
        self
    }

    /// Set the loading indicator delay.
    pub fn with_loading_delay_ms(mut self, ms: u64) -> Self {
        self.loading_delay_ms = ms;
        self
    }
}

// =============================================================================
// Refresh defaults
// =============================================================================

/// Defaults for auto-refresh subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshDefaults {
    /// Debounce window applied when a subscription names none
    pub debounce_ms: u64,
}

impl Default for RefreshDefaults {
    fn default() -> Self {
        Self { debounce_ms: 300 }
    }
}

impl RefreshDefaults {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

// =============================================================================
// Framework config
// =============================================================================

/// Top-level configuration for all components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameworkConfig {
    pub query: QueryLimits,
    pub panel: PanelConfig,
    pub refresh: RefreshDefaults,
}

impl FrameworkConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set query limits.
    pub fn query(mut self, limits: QueryLimits) -> Self {
        self.query = limits;
        self
    }

    /// Set panel timing.
    pub fn panel(mut self, panel: PanelConfig) -> Self {
        self.panel = panel;
        self
    }

    /// Set refresh defaults.
    pub fn refresh(mut self, refresh: RefreshDefaults) -> Self {
        self.refresh = refresh;
        self
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.query.max_page_size == 0 || self.query.max_page_size > HARD_MAX_PAGE_SIZE {
            return Err(Error::config(format!(
                "max_page_size must be between 1 and {HARD_MAX_PAGE_SIZE}, got {}",
                self.query.max_page_size
            )));
        }
        if self.query.default_page_size == 0
            || self.query.default_page_size > self.query.max_page_size
        {
            return Err(Error::config(format!(
                "default_page_size must be between 1 and max_page_size ({}), got {}",
                self.query.max_page_size, self.query.default_page_size
            )));
        }
        if self.panel.event_capacity == 0 {
            return Err(Error::config("panel event_capacity must be positive"));
        }
        Ok(())
    }
}
