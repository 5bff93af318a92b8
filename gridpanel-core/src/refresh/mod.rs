//! Auto-refresh of grids when other parts of the page report updates.
//!
//! Plugins register an entity's grid once with the [`AutoRefreshRegistry`];
//! each named update event then restarts a debounce timer for that event and
//! the grid re-issues its current request when the timer elapses.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gridpanel_core::config::RefreshDefaults;
//! use gridpanel_core::refresh::{
//!     AutoRefreshRegistry, EventBus, GridClient, GridDirectory, RefreshConfig,
//! };
//!
//! let bus = Arc::new(EventBus::new());
//! let directory = Arc::new(GridDirectory::new());
//! directory.mount("#orders-grid");
//!
//! let registry = AutoRefreshRegistry::new(bus.clone(), directory, RefreshDefaults::default())?;
//! registry.register(
//!     "order",
//!     RefreshConfig::new("#orders-grid")
//!         .on_event("order_saved")
//!         .grid(GridClient::new("order", transport)),
//! )?;
//!
//! bus.emit("order_saved");
//! ```

mod bus;
mod grid;
mod registry;

pub use bus::{refresh_namespace, EventBus, Listener};
pub use grid::{GridClient, GridDirectory, GridLocator, GridPresence, ListSource};
pub use registry::{AutoRefreshRegistry, RefreshAction, RefreshConfig, RefreshSubscription};
