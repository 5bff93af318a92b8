//! # gridpanel-core
//!
//! Building blocks for "master list + detail" admin screens: a paginated,
//! searchable grid paired with a slide-in detail panel holding tabbed content.
//!
//! ## Core Components
//!
//! - **Query**: server-side list engine with five extension points
//! - **Panel**: detail panel lifecycle, URL-hash deep links, race-free fetches
//! - **Tabs**: active tab, lazy loading of deferred tabs, keyboard navigation
//! - **Refresh**: debounced grid refresh on named update events
//! - **Host**: ajax routing of list/detail/tab actions to entity handlers
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gridpanel_core::{EntityDefinition, EscapingFormatter, ListRequest, QueryEngine, SqliteRowStore};
//!
//! let store = Arc::new(SqliteRowStore::open("site.db")?);
//! let engine = QueryEngine::new(
//!     EntityDefinition::new("customer", "customers")
//!         .column("t.name")
//!         .column("t.id")
//!         .searchable("t.name"),
//!     store,
//!     Arc::new(EscapingFormatter),
//! )?;
//!
//! let page = engine.process(&ListRequest::new(1).page(0, 25).search("acme"));
//! println!("{} of {} customers", page.records_filtered, page.records_total);
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod panel;
pub mod query;
pub mod refresh;
pub mod tabs;

// Re-exports for convenience
pub use config::{FrameworkConfig, PanelConfig, QueryLimits, RefreshDefaults};
pub use error::{Error, Result};
pub use host::{AjaxEnvelope, AjaxRouter, CapabilityCheck, DetailProvider, EntityRoute};
pub use panel::{
    DetailPayload, DetailTransport, HashStore, HttpTransport, HttpTransportConfig,
    MemoryHashStore, PanelController, PanelEvent, PanelLocation, PanelPhase, PanelRegion,
    PanelState, TabPayload,
};
pub use query::{
    EntityDefinition, EscapingFormatter, Extensions, ListRequest, ListResponse,
    PresentationRecord, QueryEngine, RowFormatter, RowIdentity, RowStore, SqliteRowStore,
};
pub use refresh::{AutoRefreshRegistry, EventBus, GridClient, GridDirectory, RefreshConfig};
pub use tabs::{TabController, TabDefinition, TabKey, TabState};
