//! Fluent query builder.
//!
//! A [`QueryBuilder`] accumulates filters, joins, relates, ordering, and
//! paging in any order. A terminal call (`select`, `select_single`,
//! `select_nested`, `select_with_total_matches`, `count`) consumes it.

use std::collections::HashMap;
use std::sync::Arc;

use ormsql_proto::{JoinKind, Member, OrderSpec, Page, Predicate};

use super::generator::{JoinedTable, SelectState};
use super::materialize::materialize;
use super::relate::{fold, Relate};
use super::translate::PredicateTranslator;
use crate::cache::AccessorTable;
use crate::entity::{table_alias, Entity, TableShape};
use crate::error::{Error, Result};
use crate::session::Database;

struct JoinDecl {
    kind: JoinKind,
    source_entity: &'static str,
    source_column: String,
    target_entity: &'static str,
    target_column: String,
    target: TableShape,
}

/// Accumulates query state for one root entity type.
pub struct QueryBuilder<'db, T: Entity> {
    db: &'db Database,
    filters: Vec<Predicate>,
    order_by: Vec<OrderSpec>,
    joins: Vec<JoinDecl>,
    relates: Vec<Relate<'db, T>>,
    page: Option<Page>,
    error: Option<Error>,
}

impl<'db, T: Entity> QueryBuilder<'db, T> {
    pub(crate) fn new(db: &'db Database) -> Self {
        Self {
            db,
            filters: Vec::new(),
            order_by: Vec::new(),
            joins: Vec::new(),
            relates: Vec::new(),
            page: None,
            error: None,
        }
    }

    /// Add a filter. Filters are ANDed together.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    /// Order ascending by `member`.
    pub fn order_by(mut self, member: Member) -> Self {
        self.order_by.push(OrderSpec::asc(member));
        self
    }

    /// Order descending by `member`.
    pub fn order_by_desc(mut self, member: Member) -> Self {
        self.order_by.push(OrderSpec::desc(member));
        self
    }

    /// Inner-join `D` onto `S`, where `S` is the root or an earlier join.
    pub fn join<S: Entity, D: Entity>(self, source_column: &str, target_column: &str) -> Self {
        self.join_as::<S, D>(source_column, target_column, JoinKind::Inner)
    }

    /// Left-outer-join `D` onto `S`.
    pub fn left_join<S: Entity, D: Entity>(self, source_column: &str, target_column: &str) -> Self {
        self.join_as::<S, D>(source_column, target_column, JoinKind::LeftOuter)
    }

    /// Join `D` onto `S` with the given flavor.
    pub fn join_as<S: Entity, D: Entity>(
        mut self,
        source_column: &str,
        target_column: &str,
        kind: JoinKind,
    ) -> Self {
        match self.db.shape::<D>() {
            Ok(target) => self.joins.push(JoinDecl {
                kind,
                source_entity: S::TYPE_NAME,
                source_column: source_column.to_string(),
                target_entity: D::TYPE_NAME,
                target_column: target_column.to_string(),
                target,
            }),
            Err(e) => self.defer(e),
        }
        self
    }

    /// Attach joined `C` rows to their root with `callback`.
    ///
    /// The callback runs once per physical row in which a `C` is present.
    /// When `C` is joined more than once, its latest join is used.
    pub fn relate<C, F>(mut self, callback: F) -> Self
    where
        C: Entity,
        F: Fn(&mut T, C) + 'db,
    {
        match self.db.accessors::<C>() {
            Ok(table) => self.relates.push(Relate::new(table, callback)),
            Err(e) => self.defer(e),
        }
        self
    }

    /// Select roots `(page - 1) * count .. page * count` of the ordered result.
    ///
    /// With joins present the window counts distinct roots, so every
    /// physical row of a selected root is returned.
    pub fn page(mut self, page: u32, count: u32) -> Self {
        self.page = Some(Page::new(page, count));
        self
    }

    /// Select page `page` using the configured default page size.
    pub fn page_number(self, page: u32) -> Self {
        let count = self.db.config().default_page_size;
        self.page(page, count)
    }

    /// One root instance per physical row.
    pub fn select(mut self) -> Result<Vec<T>> {
        let (root, state) = self.state()?;
        let stmt = self.db.generator().select(&state)?;
        let rows = self.db.fetch(&stmt, &state.column_keys())?;

        rows.iter()
            .map(|row| materialize(&root, row, &state.root_alias))
            .collect()
    }

    /// The first row, if any.
    pub fn select_single(self) -> Result<Option<T>> {
        Ok(self.select()?.into_iter().next())
    }

    /// Root instances grouped by key with relates applied.
    pub fn select_nested(mut self) -> Result<Vec<T>> {
        let (root, state) = self.state()?;
        self.fetch_nested(&root, &state)
    }

    /// A page of results plus the unpaged match count.
    ///
    /// Results are folded when relates are declared.
    pub fn select_with_total_matches(mut self) -> Result<(Vec<T>, u64)> {
        let (root, state) = self.state()?;

        let items = if self.relates.is_empty() {
            let stmt = self.db.generator().select(&state)?;
            self.db
                .fetch(&stmt, &state.column_keys())?
                .iter()
                .map(|row| materialize(&root, row, &state.root_alias))
                .collect::<Result<Vec<_>>>()?
        } else {
            self.fetch_nested(&root, &state)?
        };

        let unpaged = SelectState {
            order_by: Vec::new(),
            page: None,
            ..state
        };
        let total = self.db.fetch_count(&self.db.generator().count(&unpaged)?)?;
        Ok((items, total))
    }

    /// Number of matching rows, or distinct roots when joined.
    pub fn count(mut self) -> Result<u64> {
        let (_, state) = self.state()?;
        let stmt = self.db.generator().count(&state)?;
        self.db.fetch_count(&stmt)
    }

    fn fetch_nested(&self, root: &AccessorTable<T>, state: &SelectState) -> Result<Vec<T>> {
        let stmt = self.db.generator().select(state)?;
        let rows = self.db.fetch(&stmt, &state.column_keys())?;

        let bound = self
            .relates
            .iter()
            .map(|relate| {
                // a type joined twice relates through its latest join
                let alias = state
                    .joins
                    .iter()
                    .rfind(|j| j.shape.entity == relate.target())
                    .map(|j| j.alias.clone())
                    .ok_or_else(|| {
                        Error::configuration(relate.target(), "related type is not joined")
                    })?;
                Ok((relate, alias))
            })
            .collect::<Result<Vec<_>>>()?;

        fold(root, &state.root_alias, &rows, &bound)
    }

    fn state(&mut self) -> Result<(Arc<AccessorTable<T>>, SelectState)> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        let root = self.db.accessors::<T>()?;
        let mut state = SelectState::new(root.shape().clone());

        let mut occurrences: HashMap<&str, usize> = HashMap::from([(T::TYPE_NAME, 1)]);
        let mut latest: HashMap<&str, String> =
            HashMap::from([(T::TYPE_NAME, state.root_alias.clone())]);

        for join in &self.joins {
            let source_alias = latest.get(join.source_entity).cloned().ok_or_else(|| {
                Error::translation(format!(
                    "join source {} is not the root or an earlier join",
                    join.source_entity
                ))
            })?;
            let seen = occurrences.entry(join.target_entity).or_insert(0);
            let alias = table_alias(join.target_entity, *seen);
            *seen += 1;
            latest.insert(join.target_entity, alias.clone());

            state.joins.push(JoinedTable {
                kind: join.kind,
                shape: join.target.clone(),
                alias,
                source_alias,
                source_column: join.source_column.clone(),
                target_column: join.target_column.clone(),
            });
        }

        let mut translator = latest.iter().fold(
            PredicateTranslator::new(self.db.generator().dialect()),
            |translator, (entity, alias)| translator.with_alias(*entity, alias.clone()),
        );
        if !state.joins.is_empty() {
            translator = translator.qualified(state.root_alias.clone());
        }
        state.condition = translator.translate(&self.filters)?;
        state.params = translator.into_params();
        state.order_by = self
            .order_by
            .iter()
            .map(|order| order_by_alias(order, &latest))
            .collect::<Result<Vec<_>>>()?;
        state.page = self.page;

        Ok((root, state))
    }

    fn defer(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

/// Rewrite an explicit entity in `order` to the alias it was last joined under.
fn order_by_alias(order: &OrderSpec, latest: &HashMap<&str, String>) -> Result<OrderSpec> {
    let mut order = order.clone();
    if let Some(entity) = order.member.entity.take() {
        let alias = latest.get(entity.as_str()).ok_or_else(|| {
            Error::translation(format!(
                "cannot order by {entity}.{}: {entity} is not part of the query",
                order.member.name
            ))
        })?;
        order.member.entity = Some(alias.clone());
    }
    Ok(order)
}
