//! Wire types for list requests and responses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved record key holding the row identity.
pub const ROW_IDENTITY_KEY: &str = "DT_RowData";

/// Reserved record key holding the rendered row id.
pub const ROW_ID_KEY: &str = "DT_RowId";

// =============================================================================
// Request
// =============================================================================

/// Sort direction for an order clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[serde(alias = "ASC")]
    Asc,
    #[default]
    #[serde(alias = "DESC")]
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl std::fmt::Display for SortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

/// Global search parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParam {
    #[serde(default)]
    pub value: String,
}

/// A single order clause as sent by the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderParam {
    /// Index into the displayed columns
    pub column: usize,
    #[serde(default)]
    pub dir: SortDirection,
}

/// One grid fetch: page, sort and search state plus the echoed draw token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListRequest {
    /// Opaque sequence number echoed back in the response
    #[serde(default)]
    pub draw: u64,
    /// Zero-based row offset
    #[serde(default)]
    pub start: u64,
    /// Requested page length; `-1` asks for the largest allowed page and
    /// `None` for the configured default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<i64>,
    #[serde(default)]
    pub search: SearchParam,
    #[serde(default)]
    pub order: Vec<OrderParam>,
    /// Additional request parameters, readable by "where" extensions
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for ListRequest {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ListRequest {
    /// First page with default length, no sort and no search.
    pub fn new(draw: u64) -> Self {
        Self {
            draw,
            start: 0,
            length: None,
            search: SearchParam::default(),
            order: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Set the page by zero-based index and size.
    pub fn page(mut self, page_index: u64, page_size: u64) -> Self {
        self.start = page_index.saturating_mul(page_size);
        self.length = Some(i64::try_from(page_size).unwrap_or(i64::MAX));
        self
    }

    /// Replace the sort with a single column.
    pub fn sort_by(mut self, column: usize, dir: SortDirection) -> Self {
        self.order = vec![OrderParam { column, dir }];
        self
    }

    /// Set the search term.
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search.value = term.into();
        self
    }

    /// Add an extra parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Trimmed search term, `None` when blank.
    pub fn search_term(&self) -> Option<&str> {
        let term = self.search.value.trim();
        (!term.is_empty()).then_some(term)
    }

    /// The primary sort clause, if any.
    pub fn primary_order(&self) -> Option<OrderParam> {
        self.order.first().copied()
    }

    /// Zero-based page index derived from `start` and a page size.
    pub fn page_index(&self, page_size: usize) -> u64 {
        if page_size == 0 {
            return 0;
        }
        self.start / page_size as u64
    }

    /// Read an extra parameter as a string.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

// =============================================================================
// Response
// =============================================================================

/// Stable identity of the record behind a rendered row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowIdentity {
    pub id: i64,
    pub entity: String,
}

impl RowIdentity {
    pub fn new(entity: impl Into<String>, id: i64) -> Self {
        Self {
            id,
            entity: entity.into(),
        }
    }

    /// Rendered row id, `<entity>-<id>`.
    pub fn row_id(&self) -> String {
        format!("{}-{}", self.entity, self.id)
    }
}

/// One rendered row: display column name → ready-to-render value.
///
/// The identity travels next to the cells so row activation never has to
/// parse markup to learn which record it addresses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresentationRecord {
    #[serde(rename = "DT_RowId", default, skip_serializing_if = "Option::is_none")]
    row_id: Option<String>,
    #[serde(rename = "DT_RowData", default, skip_serializing_if = "Option::is_none")]
    identity: Option<RowIdentity>,
    #[serde(flatten)]
    cells: BTreeMap<String, Value>,
}

impl PresentationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the row identity.
    pub fn with_identity(mut self, identity: RowIdentity) -> Self {
        self.row_id = Some(identity.row_id());
        self.identity = Some(identity);
        self
    }

    /// Set a display cell.
    pub fn with_cell(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a display cell in place. Reserved keys are ignored.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        if column == ROW_IDENTITY_KEY || column == ROW_ID_KEY {
            tracing::warn!(column = %column, "Ignoring write to reserved record key");
            return;
        }
        self.cells.insert(column, value.into());
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells.get(column)
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.cells.remove(column)
    }

    pub fn identity(&self) -> Option<&RowIdentity> {
        self.identity.as_ref()
    }

    pub fn cells(&self) -> &BTreeMap<String, Value> {
        &self.cells
    }
}

/// One page of rendered rows plus counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    /// Echo of the request's draw token
    pub draw: u64,
    /// Rows matching the base predicates
    pub records_total: u64,
    /// Rows matching the base predicates and the search term
    pub records_filtered: u64,
    pub data: Vec<PresentationRecord>,
}

impl ListResponse {
    /// Empty page for a request, used when the store is unavailable.
    pub fn empty(draw: u64) -> Self {
        Self {
            draw,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_request_from_wire() {
        let wire = json!({
            "draw": 3,
            "start": 20,
            "length": 10,
            "search": {"value": "  acme "},
            "order": [{"column": 2, "dir": "asc"}],
            "status": "active"
        });
        let request: ListRequest = serde_json::from_value(wire).unwrap();
        assert_eq!(request.draw, 3);
        assert_eq!(request.page_index(10), 2);
        assert_eq!(request.search_term(), Some("acme"));
        assert_eq!(
            request.primary_order(),
            Some(OrderParam {
                column: 2,
                dir: SortDirection::Asc
            })
        );
        assert_eq!(request.param_str("status"), Some("active"));
    }

    #[test]
    fn test_request_defaults() {
        let request: ListRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.start, 0);
        assert_eq!(request.length, None);
        assert_eq!(request.search_term(), None);
        assert!(request.order.is_empty());
    }

    #[test]
    fn test_page_builder() {
        let request = ListRequest::new(1).page(3, 20);
        assert_eq!(request.start, 60);
        assert_eq!(request.length, Some(20));
    }

    #[test]
    fn test_record_serializes_identity_block() {
        let record = PresentationRecord::new()
            .with_identity(RowIdentity::new("widget", 42))
            .with_cell("name", "Sprocket");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "DT_RowId": "widget-42",
                "DT_RowData": {"id": 42, "entity": "widget"},
                "name": "Sprocket"
            })
        );

        let back: PresentationRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back.identity(), Some(&RowIdentity::new("widget", 42)));
        assert_eq!(back.cells().len(), 1);
    }

    #[test]
    fn test_reserved_keys_cannot_be_overwritten() {
        let mut record = PresentationRecord::new().with_identity(RowIdentity::new("widget", 1));
        record.set(ROW_IDENTITY_KEY, "oops");
        assert_eq!(record.identity().map(|i| i.id), Some(1));
        assert!(record.get(ROW_IDENTITY_KEY).is_none());
    }

    #[test]
    fn test_response_wire_names() {
        let value = serde_json::to_value(ListResponse::empty(7)).unwrap();
        assert_eq!(
            value,
            json!({"draw": 7, "recordsTotal": 0, "recordsFiltered": 0, "data": []})
        );
    }
}
