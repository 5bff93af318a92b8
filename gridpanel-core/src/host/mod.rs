//! Server-side boundary to the host CMS.
//!
//! The host owns routing, authentication and transport; this module only
//! maps its ajax actions onto an entity's [`QueryEngine`](crate::query::QueryEngine)
//! and [`DetailProvider`], behind a [`CapabilityCheck`].

mod detail;
mod envelope;
mod router;

pub use detail::{CapabilityCheck, DetailProvider, StaticCapabilities};
pub use envelope::AjaxEnvelope;
pub use router::{AjaxRouter, EntityRoute};
