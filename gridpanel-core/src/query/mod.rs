//! Server-side tabular query engine.
//!
//! A [`QueryEngine`] serves one entity's grid. Each list request runs a fixed
//! pipeline: projection, predicates, joins, search, order, paging, execution,
//! row formatting, response assembly. Third parties hook into five points of
//! that pipeline through [`Extensions`] without touching the engine.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gridpanel_core::query::{
//!     EntityDefinition, EscapingFormatter, ListRequest, QueryEngine, SqliteRowStore,
//! };
//!
//! let store = Arc::new(SqliteRowStore::open("site.db")?);
//! let entity = EntityDefinition::new("customer", "customers")
//!     .column("t.name AS customer_name")
//!     .column("t.id")
//!     .searchable("t.name");
//!
//! let mut engine = QueryEngine::new(entity, store, Arc::new(EscapingFormatter))?;
//! engine.extensions_mut().on_where("active-only", |mut preds, _, _| {
//!     preds.push(Predicate::new("t.active = 1"));
//!     preds
//! });
//!
//! let page = engine.process(&ListRequest::new(1).search("acme"));
//! ```

mod engine;
mod entity;
mod extension;
mod formatter;
mod proptest;
mod sql;
mod store;
mod types;

pub use engine::QueryEngine;
pub use entity::{is_entity_name, is_identifier, EntityDefinition};
pub use extension::{
    ColumnsHook, ExtensionChain, ExtensionPoint, Extensions, JoinsHook, ResponseHook,
    RowOutputHook, WhereHook,
};
pub use formatter::{
    escape_html, identity_from_row, row_actions, status_badge, BadgeTone, EscapingFormatter,
    RowAction, RowFormatter,
};
pub use sql::{escape_like, search_predicate, Column, Join, OrderTerm, Predicate, QueryPlan, Statement};
pub use store::{RawRow, RowStore, SqliteRowStore};
pub use types::{
    ListRequest, ListResponse, OrderParam, PresentationRecord, RowIdentity, SearchParam,
    SortDirection, ROW_IDENTITY_KEY, ROW_ID_KEY,
};
