//! Tabbed content inside a detail panel.
//!
//! The first declared tab ships with the detail payload; deferred tabs are
//! fetched the first time they become active and stay loaded until the panel
//! moves to another record.

mod controller;
mod types;

pub use controller::TabController;
pub(crate) use controller::TabBinding;
pub use types::{validate_tabs, TabDefinition, TabKey, TabState};
