//! Extension chains for the list query pipeline.
//!
//! Five points accept named transforms, applied in registration order:
//!
//! - **columns**: the projection
//! - **where**: predicates, with access to the raw request
//! - **joins**: join clauses
//! - **row-output**: each formatted record, with access to its raw row
//! - **response**: the assembled page
//!
//! Each transform receives the previous stage's value and returns a value of
//! the same shape. A panicking transform is not caught.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::entity::EntityDefinition;
use super::sql::{Column, Join, Predicate};
use super::store::RawRow;
use super::types::{ListRequest, ListResponse, PresentationRecord};

pub type ColumnsHook = dyn Fn(Vec<Column>, &EntityDefinition) -> Vec<Column> + Send + Sync;
pub type WhereHook =
    dyn Fn(Vec<Predicate>, &ListRequest, &EntityDefinition) -> Vec<Predicate> + Send + Sync;
pub type JoinsHook = dyn Fn(Vec<Join>, &EntityDefinition) -> Vec<Join> + Send + Sync;
pub type RowOutputHook =
    dyn Fn(PresentationRecord, &RawRow, &EntityDefinition) -> PresentationRecord + Send + Sync;
pub type ResponseHook =
    dyn Fn(ListResponse, &ListRequest, &EntityDefinition) -> ListResponse + Send + Sync;

/// A pipeline point extensions attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionPoint {
    Columns,
    Where,
    Joins,
    RowOutput,
    Response,
}

impl std::fmt::Display for ExtensionPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Columns => write!(f, "columns"),
            Self::Where => write!(f, "where"),
            Self::Joins => write!(f, "joins"),
            Self::RowOutput => write!(f, "row_output"),
            Self::Response => write!(f, "response"),
        }
    }
}

/// Ordered, named transforms for one extension point.
pub struct ExtensionChain<H: ?Sized> {
    stages: Vec<(String, Arc<H>)>,
}

impl<H: ?Sized> Default for ExtensionChain<H> {
    fn default() -> Self {
        Self { stages: Vec::new() }
    }
}

impl<H: ?Sized> Clone for ExtensionChain<H> {
    fn clone(&self) -> Self {
        Self {
            stages: self.stages.clone(),
        }
    }
}

impl<H: ?Sized> ExtensionChain<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transform. Registration order is application order.
    pub fn push(&mut self, name: impl Into<String>, hook: Arc<H>) {
        self.stages.push((name.into(), hook));
    }

    /// Remove every transform registered under `name`.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.stages.len();
        self.stages.retain(|(n, _)| n != name);
        self.stages.len() != before
    }

    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &H)> {
        self.stages.iter().map(|(n, h)| (n.as_str(), h.as_ref()))
    }
}

/// All five extension chains of one query engine.
#[derive(Clone, Default)]
pub struct Extensions {
    pub columns: ExtensionChain<ColumnsHook>,
    pub where_clause: ExtensionChain<WhereHook>,
    pub joins: ExtensionChain<JoinsHook>,
    pub row_output: ExtensionChain<RowOutputHook>,
    pub response: ExtensionChain<ResponseHook>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a columns transform.
    pub fn on_columns<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(Vec<Column>, &EntityDefinition) -> Vec<Column> + Send + Sync + 'static,
    {
        self.columns.push(name, Arc::new(f));
        self
    }

    /// Register a where transform.
    pub fn on_where<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(Vec<Predicate>, &ListRequest, &EntityDefinition) -> Vec<Predicate>
            + Send
            + Sync
            + 'static,
    {
        self.where_clause.push(name, Arc::new(f));
        self
    }

    /// Register a joins transform.
    pub fn on_joins<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(Vec<Join>, &EntityDefinition) -> Vec<Join> + Send + Sync + 'static,
    {
        self.joins.push(name, Arc::new(f));
        self
    }

    /// Register a row-output transform.
    pub fn on_row_output<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(PresentationRecord, &RawRow, &EntityDefinition) -> PresentationRecord
            + Send
            + Sync
            + 'static,
    {
        self.row_output.push(name, Arc::new(f));
        self
    }

    /// Register a response transform.
    pub fn on_response<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(ListResponse, &ListRequest, &EntityDefinition) -> ListResponse
            + Send
            + Sync
            + 'static,
    {
        self.response.push(name, Arc::new(f));
        self
    }

    /// Names registered at one point, in application order.
    pub fn registered(&self, point: ExtensionPoint) -> Vec<&str> {
        match point {
            ExtensionPoint::Columns => self.columns.names(),
            ExtensionPoint::Where => self.where_clause.names(),
            ExtensionPoint::Joins => self.joins.names(),
            ExtensionPoint::RowOutput => self.row_output.names(),
            ExtensionPoint::Response => self.response.names(),
        }
    }

    pub(crate) fn apply_columns(&self, columns: Vec<Column>, entity: &EntityDefinition) -> Vec<Column> {
        self.columns.iter().fold(columns, |acc, (name, hook)| {
            trace!(point = "columns", extension = name, "Applying extension");
            hook(acc, entity)
        })
    }

    pub(crate) fn apply_where(
        &self,
        predicates: Vec<Predicate>,
        request: &ListRequest,
        entity: &EntityDefinition,
    ) -> Vec<Predicate> {
        self.where_clause.iter().fold(predicates, |acc, (name, hook)| {
            trace!(point = "where", extension = name, "Applying extension");
            hook(acc, request, entity)
        })
    }

    pub(crate) fn apply_joins(&self, joins: Vec<Join>, entity: &EntityDefinition) -> Vec<Join> {
        self.joins.iter().fold(joins, |acc, (name, hook)| {
            trace!(point = "joins", extension = name, "Applying extension");
            hook(acc, entity)
        })
    }

    pub(crate) fn apply_row_output(
        &self,
        record: PresentationRecord,
        raw: &RawRow,
        entity: &EntityDefinition,
    ) -> PresentationRecord {
        self.row_output
            .iter()
            .fold(record, |acc, (_, hook)| hook(acc, raw, entity))
    }

    pub(crate) fn apply_response(
        &self,
        response: ListResponse,
        request: &ListRequest,
        entity: &EntityDefinition,
    ) -> ListResponse {
        self.response.iter().fold(response, |acc, (name, hook)| {
            trace!(point = "response", extension = name, "Applying extension");
            hook(acc, request, entity)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entity() -> EntityDefinition {
        EntityDefinition::new("widget", "widgets").column("t.id")
    }

    #[test]
    fn test_registration_order_is_application_order() {
        let mut ext = Extensions::new();
        ext.on_columns("first", |mut cols, _| {
            cols.push(Column::new("t.a"));
            cols
        })
        .on_columns("second", |mut cols, _| {
            cols.push(Column::new("t.b"));
            cols
        });

        let cols = ext.apply_columns(vec![Column::new("t.id")], &entity());
        let exprs: Vec<&str> = cols.iter().map(|c| c.expr.as_str()).collect();
        assert_eq!(exprs, vec!["t.id", "t.a", "t.b"]);
        assert_eq!(ext.registered(ExtensionPoint::Columns), vec!["first", "second"]);
    }

    #[test]
    fn test_where_sees_request() {
        let mut ext = Extensions::new();
        ext.on_where("status", |mut preds, request, _| {
            if let Some(status) = request.param_str("status") {
                preds.push(Predicate::new("t.status = ?").bind(status.to_string()));
            }
            preds
        });

        let with = ext.apply_where(
            Vec::new(),
            &ListRequest::new(1).with_param("status", "active"),
            &entity(),
        );
        let without = ext.apply_where(Vec::new(), &ListRequest::new(1), &entity());
        assert_eq!(with.len(), 1);
        assert!(without.is_empty());
    }

    #[test]
    fn test_row_output_sees_raw_row() {
        let mut ext = Extensions::new();
        ext.on_row_output("flag", |record, raw, _| {
            let flagged = raw.get_i64("priority").unwrap_or(0) > 5;
            record.with_cell("flagged", flagged)
        });
        let raw = RawRow::new().with("priority", 9);
        let record = ext.apply_row_output(PresentationRecord::new(), &raw, &entity());
        assert_eq!(record.get("flagged"), Some(&serde_json::Value::Bool(true)));
    }

    #[test]
    fn test_remove_by_name() {
        let mut ext = Extensions::new();
        ext.on_joins("owners", |joins, _| joins);
        assert!(ext.joins.remove("owners"));
        assert!(!ext.joins.remove("owners"));
        assert!(ext.joins.is_empty());
    }
}
