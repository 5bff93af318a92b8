//! The tabular query engine.

use std::sync::Arc;

use tracing::{debug, error, instrument};

use super::entity::EntityDefinition;
use super::extension::Extensions;
use super::formatter::RowFormatter;
use super::sql::{search_predicate, OrderTerm, QueryPlan};
use super::store::RowStore;
use super::types::{ListRequest, ListResponse, SortDirection};
use crate::config::QueryLimits;
use crate::error::Result;

/// Turns list requests for one entity into pages of presentation records.
pub struct QueryEngine {
    entity: EntityDefinition,
    store: Arc<dyn RowStore>,
    formatter: Arc<dyn RowFormatter>,
    extensions: Extensions,
    limits: QueryLimits,
}

impl QueryEngine {
    /// Create an engine; the entity definition is validated here.
    pub fn new(
        entity: EntityDefinition,
        store: Arc<dyn RowStore>,
        formatter: Arc<dyn RowFormatter>,
    ) -> Result<Self> {
        entity.validate()?;
        Ok(Self {
            entity,
            store,
            formatter,
            extensions: Extensions::default(),
            limits: QueryLimits::default(),
        })
    }

    /// Replace the extension chains.
    pub fn with_extensions(mut self, extensions: Extensions) -> Self {
        self.extensions = extensions;
        self
    }

    /// Set page size limits.
    pub fn with_limits(mut self, limits: QueryLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn entity(&self) -> &EntityDefinition {
        &self.entity
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Mutable access for registering extensions at setup time.
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Resolve projection, predicates, joins, search, order and paging.
    pub fn plan(&self, request: &ListRequest) -> QueryPlan {
        let entity = &self.entity;

        let columns = self
            .extensions
            .apply_columns(entity.columns.clone(), entity);
        let predicates = self
            .extensions
            .apply_where(entity.predicates.clone(), request, entity);
        let joins = self.extensions.apply_joins(entity.joins.clone(), entity);

        let search = request
            .search_term()
            .and_then(|term| search_predicate(&entity.searchable, term));

        let key = entity.qualified_key();
        let mut order = match request
            .primary_order()
            .and_then(|o| columns.get(o.column).map(|c| (c, o.dir)))
        {
            Some((column, dir)) => vec![OrderTerm {
                expr: column.sort_expr().to_string(),
                dir,
            }],
            None => {
                if let Some(o) = request.primary_order() {
                    debug!(entity = %entity.name, column = o.column, "Sort column out of range; using primary key");
                }
                vec![OrderTerm {
                    expr: key.clone(),
                    dir: SortDirection::Desc,
                }]
            }
        };
        // Equal sort keys are broken by the primary key so pages never overlap.
        if order[0].expr != key && order[0].expr != entity.primary_key {
            let dir = order[0].dir;
            order.push(OrderTerm { expr: key, dir });
        }

        let limit = self.limits.resolve_page_size(request.length);
        QueryPlan {
            from: entity.from_clause(),
            columns,
            joins,
            predicates,
            search,
            order,
            limit,
            offset: request.start,
        }
    }

    /// Serve one list request.
    ///
    /// Store failures are logged with the failing statement and degrade to
    /// an empty page; extension panics propagate.
    #[instrument(skip(self, request), fields(entity = %self.entity.name, draw = request.draw))]
    pub fn process(&self, request: &ListRequest) -> ListResponse {
        let plan = self.plan(request);

        let page = plan.page_statement();
        let total = plan.count_statement(false);
        let filtered = plan.count_statement(true);

        let fetched = self.store.query_rows(&page).and_then(|rows| {
            let records_total = self.store.query_count(&total)?;
            let records_filtered = if plan.search.is_some() {
                self.store.query_count(&filtered)?
            } else {
                records_total
            };
            Ok((rows, records_total, records_filtered))
        });

        let (rows, records_total, records_filtered) = match fetched {
            Ok(result) => result,
            Err(e) => {
                let statement = e.statement().unwrap_or(&page.sql);
                error!(error = %e, statement, "List query failed; returning empty page");
                return ListResponse::empty(request.draw);
            }
        };

        debug!(rows = rows.len(), records_total, records_filtered, "List query complete");

        let data = rows
            .iter()
            .map(|raw| {
                let record = self.formatter.format(raw, &self.entity);
                self.extensions.apply_row_output(record, raw, &self.entity)
            })
            .collect();

        let response = ListResponse {
            draw: request.draw,
            records_total,
            records_filtered,
            data,
        };
        self.extensions.apply_response(response, request, &self.entity)
    }
}
