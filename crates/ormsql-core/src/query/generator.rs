//! SQL statement assembly.
//!
//! The query builder translates predicates and collects state; a
//! [`QueryGenerator`] turns that state into statement text. The provided
//! method bodies assemble ANSI-style SQL through the generator's
//! [`Dialect`]; backends override only what their syntax needs.

use ormsql_proto::{col, JoinKind, OrderDirection, OrderSpec, Page, Predicate, Value};

use super::dialect::{Dialect, StandardDialect};
use super::translate::{ParamNamer, PredicateTranslator, QueryParam};
use crate::entity::{column_key, TableShape};
use crate::error::{Error, Result};

/// Statement text and its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    /// SQL text.
    pub sql: String,
    /// Parameters in binding order.
    pub params: Vec<QueryParam>,
}

/// One table joined into a select.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedTable {
    /// Join flavor.
    pub kind: JoinKind,
    /// Joined table.
    pub shape: TableShape,
    /// Alias of the joined table.
    pub alias: String,
    /// Alias of the table it joins onto.
    pub source_alias: String,
    /// Column on the source side.
    pub source_column: String,
    /// Column on the joined side.
    pub target_column: String,
}

/// A selected column and the key it is read back under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedColumn {
    /// Alias of the owning table.
    pub table_alias: String,
    /// Column name.
    pub column: String,
    /// Result-set key, `Alias.Column`.
    pub key: String,
}

/// Everything needed to assemble a select or count.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectState {
    /// Root table.
    pub root: TableShape,
    /// Alias of the root table.
    pub root_alias: String,
    /// Join chain in declaration order.
    pub joins: Vec<JoinedTable>,
    /// Translated filter, without the `WHERE` keyword.
    pub condition: Option<String>,
    /// Parameters of `condition`.
    pub params: Vec<QueryParam>,
    /// Ordering. An explicit member entity holds the table alias.
    pub order_by: Vec<OrderSpec>,
    /// Paging window. With joins present it counts distinct roots.
    pub page: Option<Page>,
}

impl SelectState {
    /// Select all rows of `root`.
    pub fn new(root: TableShape) -> Self {
        let root_alias = root.entity.clone();
        Self {
            root,
            root_alias,
            joins: Vec::new(),
            condition: None,
            params: Vec::new(),
            order_by: Vec::new(),
            page: None,
        }
    }

    /// Selected columns: the root table first, then each join in order.
    pub fn projection(&self) -> Vec<ProjectedColumn> {
        let tables = std::iter::once((&self.root, &self.root_alias))
            .chain(self.joins.iter().map(|j| (&j.shape, &j.alias)));

        tables
            .flat_map(|(shape, alias)| {
                shape.columns.iter().map(move |c| ProjectedColumn {
                    table_alias: alias.clone(),
                    column: c.name.clone(),
                    key: column_key(alias, &c.name),
                })
            })
            .collect()
    }

    /// Result-set keys in projection order.
    pub fn column_keys(&self) -> Vec<String> {
        self.projection().into_iter().map(|c| c.key).collect()
    }
}

/// Assembles statements for one SQL dialect.
pub trait QueryGenerator: Send + Sync {
    /// The dialect used for translation and assembly.
    fn dialect(&self) -> &dyn Dialect;

    /// `SELECT` with joins, filter, ordering, and paging.
    fn select(&self, state: &SelectState) -> Result<SqlStatement> {
        let d = self.dialect();

        let columns: Vec<String> = state
            .projection()
            .iter()
            .map(|c| {
                format!(
                    "{}.{} AS {}",
                    d.quote_identifier(&c.table_alias),
                    d.quote_identifier(&c.column),
                    d.quote_alias(&c.key)
                )
            })
            .collect();

        let mut sql = format!("SELECT {} FROM {}", columns.join(", "), from_clause(d, state));

        let mut order_by = state.order_by.clone();
        if order_by.is_empty() && state.page.is_some() {
            // paging needs a deterministic order
            if let Some(key) = state.root.key() {
                order_by.push(OrderSpec::asc(col(key.name.clone())));
            }
        }

        match (&state.page, state.root.key()) {
            (Some(page), Some(key)) if !state.joins.is_empty() => {
                // page over distinct roots; every row of a selected root is kept
                let keyed = format!(
                    "{}.{}",
                    d.quote_identifier(&state.root_alias),
                    d.quote_identifier(&key.name)
                );
                if !order_by.iter().any(|o| is_column(state, o, &key.name)) {
                    order_by.push(OrderSpec::asc(col(key.name.clone())));
                }

                let window = root_window(d, state, &keyed, &key.name, &order_by, page);
                match &state.condition {
                    Some(condition) => {
                        sql.push_str(&format!(" WHERE ({condition}) AND {keyed} IN ({window})"))
                    }
                    None => sql.push_str(&format!(" WHERE {keyed} IN ({window})")),
                }
                push_order_by(d, state, &order_by, &mut sql);
            }
            _ => {
                if let Some(condition) = &state.condition {
                    sql.push_str(" WHERE ");
                    sql.push_str(condition);
                }
                push_order_by(d, state, &order_by, &mut sql);
                if let Some(page) = &state.page {
                    sql.push(' ');
                    sql.push_str(&d.paging_clause(page));
                }
            }
        }

        Ok(SqlStatement {
            sql,
            params: state.params.clone(),
        })
    }

    /// `SELECT COUNT` over the same filter and joins, ignoring order and paging.
    ///
    /// With joins present, distinct root keys are counted.
    fn count(&self, state: &SelectState) -> Result<SqlStatement> {
        let d = self.dialect();

        let counted = if state.joins.is_empty() {
            "COUNT(*)".to_string()
        } else {
            let key = state
                .root
                .key()
                .ok_or_else(|| Error::configuration(&state.root.entity, "no key property"))?;
            format!(
                "COUNT(DISTINCT {}.{})",
                d.quote_identifier(&state.root_alias),
                d.quote_identifier(&key.name)
            )
        };

        let mut sql = format!("SELECT {counted} FROM {}", from_clause(d, state));
        if let Some(condition) = &state.condition {
            sql.push_str(" WHERE ");
            sql.push_str(condition);
        }

        Ok(SqlStatement {
            sql,
            params: state.params.clone(),
        })
    }

    /// `INSERT` of the given column values.
    fn insert(&self, shape: &TableShape, values: &[(String, Value)]) -> Result<SqlStatement> {
        let d = self.dialect();
        let table = d.quote_identifier(&shape.table);

        if values.is_empty() {
            return Ok(SqlStatement {
                sql: format!("INSERT INTO {table} DEFAULT VALUES"),
                params: Vec::new(),
            });
        }

        let mut namer = ParamNamer::new();
        let mut columns = Vec::with_capacity(values.len());
        let mut placeholders = Vec::with_capacity(values.len());
        let mut params = Vec::with_capacity(values.len());
        for (column, value) in values {
            let name = namer.name(column);
            columns.push(d.quote_identifier(column));
            placeholders.push(format!("{}{name}", d.parameter_prefix()));
            params.push(QueryParam::new(name, value.clone()));
        }

        Ok(SqlStatement {
            sql: format!(
                "INSERT INTO {table} ({}) VALUES ({})",
                columns.join(", "),
                placeholders.join(", ")
            ),
            params,
        })
    }

    /// `UPDATE` of one row identified by its key.
    fn update(&self, shape: &TableShape, values: &[(String, Value)], key: &Value) -> Result<SqlStatement> {
        let key_column = shape
            .key()
            .ok_or_else(|| Error::configuration(&shape.entity, "no key property"))?;
        let assignments: Vec<(String, Value)> = values
            .iter()
            .filter(|(column, _)| column != &key_column.name)
            .cloned()
            .collect();
        let filter = col(key_column.name.clone()).eq(key.clone());
        self.update_where(shape, &assignments, &[filter])
    }

    /// `UPDATE` of every row matching `filter`.
    fn update_where(
        &self,
        shape: &TableShape,
        values: &[(String, Value)],
        filter: &[Predicate],
    ) -> Result<SqlStatement> {
        let d = self.dialect();
        let mut translator = PredicateTranslator::new(d).with_alias(&shape.entity, &shape.entity);
        let assignments = translator.translate_assignments(values)?;
        let condition = translator.translate(filter)?;

        let mut sql = format!("UPDATE {} SET {assignments}", d.quote_identifier(&shape.table));
        if let Some(condition) = condition {
            sql.push_str(" WHERE ");
            sql.push_str(&condition);
        }

        Ok(SqlStatement {
            sql,
            params: translator.into_params(),
        })
    }

    /// `DELETE` of one row identified by its key.
    fn delete(&self, shape: &TableShape, key: &Value) -> Result<SqlStatement> {
        let key_column = shape
            .key()
            .ok_or_else(|| Error::configuration(&shape.entity, "no key property"))?;
        self.delete_where(shape, &[col(key_column.name.clone()).eq(key.clone())])
    }

    /// `DELETE` of every row matching `filter`. An empty filter deletes all rows.
    fn delete_where(&self, shape: &TableShape, filter: &[Predicate]) -> Result<SqlStatement> {
        let d = self.dialect();
        let mut translator = PredicateTranslator::new(d).with_alias(&shape.entity, &shape.entity);
        let condition = translator.translate(filter)?;

        let mut sql = format!("DELETE FROM {}", d.quote_identifier(&shape.table));
        if let Some(condition) = condition {
            sql.push_str(" WHERE ");
            sql.push_str(&condition);
        }

        Ok(SqlStatement {
            sql,
            params: translator.into_params(),
        })
    }
}

fn order_column(d: &dyn Dialect, state: &SelectState, order: &OrderSpec) -> String {
    let table = order.member.entity.as_deref().unwrap_or(&state.root_alias);
    format!(
        "{}.{}",
        d.quote_identifier(table),
        d.quote_identifier(&order.member.name)
    )
}

fn direction(order: &OrderSpec) -> &'static str {
    match order.direction {
        OrderDirection::Asc => "ASC",
        OrderDirection::Desc => "DESC",
    }
}

fn is_column(state: &SelectState, order: &OrderSpec, column: &str) -> bool {
    order.member.name == column
        && order
            .member
            .entity
            .as_deref()
            .map_or(true, |alias| alias == state.root_alias)
}

fn push_order_by(d: &dyn Dialect, state: &SelectState, order_by: &[OrderSpec], sql: &mut String) {
    if order_by.is_empty() {
        return;
    }
    let terms: Vec<String> = order_by
        .iter()
        .map(|o| format!("{} {}", order_column(d, state, o), direction(o)))
        .collect();
    sql.push_str(" ORDER BY ");
    sql.push_str(&terms.join(", "));
}

/// Keys of the roots on `page`.
///
/// Roots are grouped by key and ordered by the smallest (ascending) or
/// largest (descending) value among their rows.
fn root_window(
    d: &dyn Dialect,
    state: &SelectState,
    keyed: &str,
    key: &str,
    order_by: &[OrderSpec],
    page: &Page,
) -> String {
    let mut sql = format!("SELECT {keyed} FROM {}", from_clause(d, state));
    if let Some(condition) = &state.condition {
        sql.push_str(" WHERE ");
        sql.push_str(condition);
    }
    sql.push_str(&format!(" GROUP BY {keyed}"));

    let terms: Vec<String> = order_by
        .iter()
        .map(|o| {
            let column = order_column(d, state, o);
            if is_column(state, o, key) {
                format!("{column} {}", direction(o))
            } else {
                let aggregate = match o.direction {
                    OrderDirection::Asc => "MIN",
                    OrderDirection::Desc => "MAX",
                };
                format!("{aggregate}({column}) {}", direction(o))
            }
        })
        .collect();
    sql.push_str(" ORDER BY ");
    sql.push_str(&terms.join(", "));
    sql.push(' ');
    sql.push_str(&d.paging_clause(page));
    sql
}

fn table_ref(d: &dyn Dialect, table: &str, alias: &str) -> String {
    if table == alias {
        d.quote_identifier(table)
    } else {
        format!("{} AS {}", d.quote_identifier(table), d.quote_identifier(alias))
    }
}

fn from_clause(d: &dyn Dialect, state: &SelectState) -> String {
    let mut from = table_ref(d, &state.root.table, &state.root_alias);
    for join in &state.joins {
        from.push_str(&format!(
            " {} {} ON {}.{} = {}.{}",
            join.kind.as_sql(),
            table_ref(d, &join.shape.table, &join.alias),
            d.quote_identifier(&join.source_alias),
            d.quote_identifier(&join.source_column),
            d.quote_identifier(&join.alias),
            d.quote_identifier(&join.target_column),
        ));
    }
    from
}

/// Generator using [`StandardDialect`] and the provided assembly.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardGenerator {
    dialect: StandardDialect,
}

impl StandardGenerator {
    /// Create a generator.
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueryGenerator for StandardGenerator {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }
}
