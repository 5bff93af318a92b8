//! Slide-in detail panel.
//!
//! A [`PanelController`] owns the open/close lifecycle of one entity's
//! detail view, keeps it in step with the URL hash, and guarantees that only
//! the most recent detail fetch can populate its [`PanelRegion`]. Its tab
//! strip is driven by the [`crate::tabs::TabController`] it creates.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gridpanel_core::panel::{HttpTransport, HttpTransportConfig, PanelController};
//! use gridpanel_core::tabs::TabDefinition;
//!
//! let transport = Arc::new(HttpTransport::new(HttpTransportConfig::new(
//!     "https://example.test/admin-ajax.php",
//!     "gp",
//! ))?);
//! let panel = PanelController::builder("customer")
//!     .tab(TabDefinition::new("overview", "Overview"))
//!     .tab(TabDefinition::new("orders", "Orders").deferred())
//!     .transport(transport)
//!     .build()?;
//!
//! panel.open(42);
//! panel.tabs().switch_to("orders");
//! ```

mod controller;
mod events;
mod hash;
mod region;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{PanelController, PanelControllerBuilder, PanelState};
pub use events::{PanelEvent, PanelEvents};
pub use hash::{is_empty_hash, HashStore, MemoryHashStore, PanelLocation};
pub use region::{PanelPhase, PanelRegion, RegionSnapshot, TabContent};
pub use transport::{
    DetailPayload, DetailTransport, HttpTransport, HttpTransportConfig, RequestId, TabPayload,
};
