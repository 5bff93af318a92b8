//! Entity definitions: the table, projection and search surface of one record type.

use std::sync::OnceLock;

use regex::Regex;

use super::sql::{Column, Join, Predicate};
use crate::error::{Error, Result};

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern"))
}

fn entity_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_]+(?:-[A-Za-z0-9_]+)*$").expect("entity name pattern")
    })
}

/// Whether `name` is a plain SQL identifier.
pub fn is_identifier(name: &str) -> bool {
    identifier_pattern().is_match(name)
}

/// Whether `name` is usable as an entity name in hashes and action names.
pub fn is_entity_name(name: &str) -> bool {
    entity_name_pattern().is_match(name)
}

/// A record type served by one grid/detail pairing.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDefinition {
    /// Entity name, e.g. `customer`
    pub name: String,
    /// Backing table
    pub table: String,
    /// Alias the table is selected under
    pub table_alias: String,
    /// Primary key column (unqualified)
    pub primary_key: String,
    /// Base projection, in display order
    pub columns: Vec<Column>,
    /// Expressions matched by the global search
    pub searchable: Vec<String>,
    /// Predicates applied to every request
    pub predicates: Vec<Predicate>,
    /// Joins applied to every request
    pub joins: Vec<Join>,
}

impl EntityDefinition {
    /// Create a definition selecting from `table` aliased as `t`, keyed by `id`.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            table_alias: "t".to_string(),
            primary_key: "id".to_string(),
            columns: Vec::new(),
            searchable: Vec::new(),
            predicates: Vec::new(),
            joins: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.table_alias = alias.into();
        self
    }

    pub fn primary_key(mut self, key: impl Into<String>) -> Self {
        self.primary_key = key.into();
        self
    }

    /// Add a display column; accepts `"expr AS alias"`.
    pub fn column(mut self, column: impl Into<Column>) -> Self {
        self.columns.push(column.into());
        self
    }

    /// Add an expression to the search surface.
    pub fn searchable(mut self, expr: impl Into<String>) -> Self {
        self.searchable.push(expr.into());
        self
    }

    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// `table alias` for the FROM clause.
    pub fn from_clause(&self) -> String {
        format!("{} {}", self.table, self.table_alias)
    }

    /// Primary key qualified with the table alias.
    pub fn qualified_key(&self) -> String {
        format!("{}.{}", self.table_alias, self.primary_key)
    }

    /// Name the primary key appears under in result rows.
    pub fn key_output_name(&self) -> &str {
        self.columns
            .iter()
            .find(|c| c.expr == self.qualified_key() || c.expr == self.primary_key)
            .map_or(self.primary_key.as_str(), Column::output_name)
    }

    /// Reject definitions that cannot produce a safe statement.
    pub fn validate(&self) -> Result<()> {
        if !is_entity_name(&self.name) {
            return Err(Error::config(format!(
                "invalid entity name '{}'",
                self.name
            )));
        }
        for (what, value) in [
            ("table", &self.table),
            ("table alias", &self.table_alias),
            ("primary key", &self.primary_key),
        ] {
            if !is_identifier(value) {
                return Err(Error::config(format!(
                    "entity '{}' has invalid {what} '{value}'",
                    self.name
                )));
            }
        }
        if self.columns.is_empty() {
            return Err(Error::config(format!(
                "entity '{}' declares no columns",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget() -> EntityDefinition {
        EntityDefinition::new("widget", "widgets")
            .alias("w")
            .column("w.id")
            .column("w.name AS widget_name")
            .searchable("w.name")
    }

    #[test]
    fn test_valid_definition() {
        let def = widget();
        assert!(def.validate().is_ok());
        assert_eq!(def.from_clause(), "widgets w");
        assert_eq!(def.qualified_key(), "w.id");
        assert_eq!(def.key_output_name(), "id");
    }

    #[test]
    fn test_key_output_name_follows_alias() {
        let def = EntityDefinition::new("widget", "widgets")
            .column("t.id AS widget_id")
            .column("t.name");
        assert_eq!(def.key_output_name(), "widget_id");
    }

    #[test]
    fn test_rejects_injection_in_table_name() {
        let def = EntityDefinition::new("widget", "widgets; DROP TABLE x").column("t.id");
        assert!(matches!(def.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_empty_name_and_columns() {
        assert!(EntityDefinition::new("", "widgets").column("t.id").validate().is_err());
        assert!(EntityDefinition::new("widget", "widgets").validate().is_err());
    }

    #[test]
    fn test_entity_names_may_contain_hyphens() {
        assert!(is_entity_name("support-ticket"));
        assert!(!is_entity_name("-ticket"));
        assert!(!is_entity_name("a b"));
    }
}
