//! Parameterized SQL fragments and statement assembly.

use rusqlite::types::Value as SqlValue;

use super::types::SortDirection;

/// A projected column, optionally carrying a display alias.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Underlying SQL expression
    pub expr: String,
    /// Display alias (`expr AS alias`)
    pub alias: Option<String>,
}

impl Column {
    pub fn new(expr: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            alias: None,
        }
    }

    pub fn aliased(expr: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            alias: Some(alias.into()),
        }
    }

    /// Parse `"expr AS alias"` (case-insensitive `AS`) or a bare expression.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let upper = trimmed.to_ascii_uppercase();
        match upper.rfind(" AS ") {
            Some(pos) => {
                let alias = trimmed[pos + 4..].trim();
                if alias.is_empty() {
                    Self::new(trimmed)
                } else {
                    Self::aliased(trimmed[..pos].trim(), alias)
                }
            }
            None => Self::new(trimmed),
        }
    }

    /// Select-list form.
    pub fn sql(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{} AS {}", self.expr, alias),
            None => self.expr.clone(),
        }
    }

    /// Name the value appears under in a result row.
    pub fn output_name(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self.expr.rsplit('.').next().unwrap_or(&self.expr),
        }
    }

    /// Expression used for ordering, with the display alias stripped.
    pub fn sort_expr(&self) -> &str {
        &self.expr
    }
}

impl From<&str> for Column {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

/// A WHERE predicate with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Predicate {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Bind one more parameter.
    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.params.push(value.into());
        self
    }
}

/// A JOIN clause with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Join {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.params.push(value.into());
        self
    }
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    pub expr: String,
    pub dir: SortDirection,
}

/// A statement ready for the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Escape LIKE wildcards using `!` as the escape character.
pub fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        match c {
            '!' | '%' | '_' => {
                out.push('!');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Disjunctive substring match of `term` over `columns`.
///
/// Returns `None` when there is nothing to search in.
pub fn search_predicate(columns: &[String], term: &str) -> Option<Predicate> {
    if columns.is_empty() {
        return None;
    }
    let pattern = format!("%{}%", escape_like(term));
    let clauses: Vec<String> = columns
        .iter()
        .map(|c| format!("{c} LIKE ? ESCAPE '!'"))
        .collect();
    let params = columns
        .iter()
        .map(|_| SqlValue::Text(pattern.clone()))
        .collect();
    Some(Predicate::with_params(
        format!("({})", clauses.join(" OR ")),
        params,
    ))
}

/// Resolved steps 1-6 of a list query, before execution.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    /// `table alias`
    pub from: String,
    pub columns: Vec<Column>,
    pub joins: Vec<Join>,
    /// Base and extension predicates; determines the total count
    pub predicates: Vec<Predicate>,
    /// Search predicate; added for the filtered count and the page
    pub search: Option<Predicate>,
    pub order: Vec<OrderTerm>,
    pub limit: usize,
    pub offset: u64,
}

impl QueryPlan {
    /// Statement fetching the requested page.
    pub fn page_statement(&self) -> Statement {
        let select: Vec<String> = self.columns.iter().map(Column::sql).collect();
        let mut sql = format!("SELECT {} FROM {}", select.join(", "), self.from);
        let mut params = Vec::new();
        self.push_joins(&mut sql, &mut params);
        self.push_where(&mut sql, &mut params, true);

        if !self.order.is_empty() {
            let terms: Vec<String> = self
                .order
                .iter()
                .map(|t| format!("{} {}", t.expr, t.dir.as_sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        sql.push_str(" LIMIT ? OFFSET ?");
        params.push(SqlValue::Integer(i64::try_from(self.limit).unwrap_or(i64::MAX)));
        params.push(SqlValue::Integer(i64::try_from(self.offset).unwrap_or(i64::MAX)));

        Statement { sql, params }
    }

    /// Count statement; `with_search` selects filtered vs. total count.
    pub fn count_statement(&self, with_search: bool) -> Statement {
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.from);
        let mut params = Vec::new();
        self.push_joins(&mut sql, &mut params);
        self.push_where(&mut sql, &mut params, with_search);
        Statement { sql, params }
    }

    fn push_joins(&self, sql: &mut String, params: &mut Vec<SqlValue>) {
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.sql);
            params.extend(join.params.iter().cloned());
        }
    }

    fn push_where(&self, sql: &mut String, params: &mut Vec<SqlValue>, with_search: bool) {
        let search = if with_search { self.search.as_ref() } else { None };
        let parts: Vec<&Predicate> = self.predicates.iter().chain(search).collect();
        if parts.is_empty() {
            return;
        }
        let clauses: Vec<String> = parts.iter().map(|p| format!("({})", p.sql)).collect();
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
        for part in parts {
            params.extend(part.params.iter().cloned());
        }
    }
}
