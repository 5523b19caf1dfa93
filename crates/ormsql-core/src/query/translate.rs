//! Predicate tree to SQL translation.
//!
//! One [`PredicateTranslator`] is walked per statement. It owns the
//! parameter namer, so every clause of the statement (`SET` and `WHERE`)
//! draws names from the same pool:
//!
//! - the first use of a member name keeps the bare name, later uses append
//!   `2`, `3`, ... in the order they are rendered
//! - `IN` list elements are named `InParam_1`, `InParam_2`, ...
//!
//! Captured operands are evaluated while translating; the parameter list
//! holds snapshots, not closures.

use std::collections::{HashMap, HashSet};

use ormsql_proto::{CompareOp, Member, MethodKind, Operand, Predicate, Value};

use super::dialect::Dialect;
use crate::error::{Error, Result};

/// A named parameter bound to a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParam {
    /// Name without the dialect prefix.
    pub name: String,
    /// Bound value.
    pub value: Value,
}

impl QueryParam {
    /// Create a parameter.
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A translated SQL fragment with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    /// SQL text.
    pub sql: String,
    /// Parameters in the order they appear in `sql`.
    pub params: Vec<QueryParam>,
}

/// Collision-free parameter names for one statement.
#[derive(Debug, Default)]
pub struct ParamNamer {
    used: HashSet<String>,
    in_counter: usize,
}

impl ParamNamer {
    /// Create an empty namer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name for a member parameter.
    pub fn name(&mut self, base: &str) -> String {
        if self.used.insert(base.to_string()) {
            return base.to_string();
        }
        let mut suffix = 2;
        loop {
            let candidate = format!("{base}{suffix}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            suffix += 1;
        }
    }

    /// Name for the next `IN` list element.
    pub fn in_param(&mut self) -> String {
        loop {
            self.in_counter += 1;
            let candidate = format!("InParam_{}", self.in_counter);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

/// Walks predicate trees and renders SQL.
pub struct PredicateTranslator<'d> {
    dialect: &'d dyn Dialect,
    qualifier: Option<String>,
    aliases: HashMap<String, String>,
    namer: ParamNamer,
    params: Vec<QueryParam>,
}

impl<'d> PredicateTranslator<'d> {
    /// Create a translator for one statement.
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Self {
            dialect,
            qualifier: None,
            aliases: HashMap::new(),
            namer: ParamNamer::new(),
            params: Vec::new(),
        }
    }

    /// Qualify columns with their table alias.
    ///
    /// Members without an explicit entity are qualified with `root_alias`.
    pub fn qualified(mut self, root_alias: impl Into<String>) -> Self {
        self.qualifier = Some(root_alias.into());
        self
    }

    /// Let members naming `entity` refer to the table aliased `alias`.
    ///
    /// A member whose entity was never registered fails translation.
    pub fn with_alias(mut self, entity: impl Into<String>, alias: impl Into<String>) -> Self {
        self.aliases.insert(entity.into(), alias.into());
        self
    }

    /// Render `predicates`, ANDed together, as a boolean condition.
    ///
    /// Returns `None` for an empty list. With more than one predicate each
    /// one is parenthesized.
    pub fn translate(&mut self, predicates: &[Predicate]) -> Result<Option<String>> {
        match predicates {
            [] => Ok(None),
            [single] => self.render(single).map(Some),
            many => {
                let parts = many
                    .iter()
                    .map(|p| self.render(p).map(|sql| format!("({sql})")))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Some(parts.join(" AND ")))
            }
        }
    }

    /// Render a `SET` list, `Col = @Col, ...`.
    pub fn translate_assignments(&mut self, assignments: &[(String, Value)]) -> Result<String> {
        if assignments.is_empty() {
            return Err(Error::translation("update without assignments"));
        }
        let parts: Vec<String> = assignments
            .iter()
            .map(|(column, value)| {
                let name = self.bind(column, value.clone());
                format!("{} = {}", self.dialect.quote_identifier(column), name)
            })
            .collect();
        Ok(parts.join(", "))
    }

    /// Parameters bound so far, in render order.
    pub fn params(&self) -> &[QueryParam] {
        &self.params
    }

    /// Consume the translator and return its parameters.
    pub fn into_params(self) -> Vec<QueryParam> {
        self.params
    }

    fn render(&mut self, predicate: &Predicate) -> Result<String> {
        match predicate {
            Predicate::True => Ok("1 = 1".to_string()),
            Predicate::Compare {
                op,
                member,
                operand,
            } => self.render_compare(*op, member, operand),
            Predicate::And(left, right) => self.render_logical(left, "AND", right),
            Predicate::Or(left, right) => self.render_logical(left, "OR", right),
            Predicate::Not(inner) => match inner.as_ref() {
                Predicate::Method {
                    kind,
                    member,
                    argument,
                } => self.render_method(*kind, member, argument, true),
                other => Ok(format!("NOT ({})", self.render(other)?)),
            },
            Predicate::Method {
                kind,
                member,
                argument,
            } => self.render_method(*kind, member, argument, false),
        }
    }

    fn render_logical(&mut self, left: &Predicate, keyword: &str, right: &Predicate) -> Result<String> {
        let left = self.render(left)?;
        let right = self.render(right)?;
        Ok(format!("({left}) {keyword} ({right})"))
    }

    fn render_compare(&mut self, op: CompareOp, member: &Member, operand: &Operand) -> Result<String> {
        let value = resolve(member, operand)?;
        let column = self.column(member)?;

        if value.is_null() {
            return match op {
                CompareOp::Eq => Ok(format!("{column} IS NULL")),
                CompareOp::Ne => Ok(format!("{column} IS NOT NULL")),
                _ => Err(Error::translation(format!(
                    "cannot compare {} with NULL using {}",
                    member.name,
                    op.as_sql()
                ))),
            };
        }
        if matches!(value, Value::List(_)) {
            return Err(Error::translation(format!(
                "list operand compared with {}; use an IN predicate",
                member.name
            )));
        }

        let param = self.bind(&member.name, value);
        Ok(format!("{column} {} {param}", op.as_sql()))
    }

    fn render_method(
        &mut self,
        kind: MethodKind,
        member: &Member,
        argument: &Operand,
        negated: bool,
    ) -> Result<String> {
        let value = resolve(member, argument)?;
        let column = self.column(member)?;
        let not = if negated { "NOT " } else { "" };

        match kind {
            MethodKind::Contains | MethodKind::StartsWith => {
                if !matches!(value, Value::String(_)) {
                    return Err(Error::translation(format!(
                        "pattern match on {} needs a string argument, got {}",
                        member.name,
                        value.type_name()
                    )));
                }
                let param = self.bind(&member.name, value);
                let pattern = match kind {
                    MethodKind::Contains => self.dialect.concat(&["'%'", param.as_str(), "'%'"]),
                    _ => self.dialect.concat(&[param.as_str(), "'%'"]),
                };
                Ok(format!("{column} {not}LIKE {pattern}"))
            }
            MethodKind::In => {
                let items = match value {
                    Value::List(items) => items,
                    other => {
                        return Err(Error::translation(format!(
                            "IN on {} needs a list argument, got {}",
                            member.name,
                            other.type_name()
                        )))
                    }
                };
                if items.is_empty() {
                    // IN () is not valid SQL
                    return Ok(if negated { "1 = 1" } else { "1 = 0" }.to_string());
                }
                let mut names = Vec::with_capacity(items.len());
                for item in items {
                    if matches!(item, Value::List(_)) {
                        return Err(Error::translation(format!(
                            "nested list in IN on {}",
                            member.name
                        )));
                    }
                    let name = self.namer.in_param();
                    names.push(format!("{}{name}", self.dialect.parameter_prefix()));
                    self.params.push(QueryParam::new(name, item));
                }
                Ok(format!("{column} {not}IN ({})", names.join(",")))
            }
        }
    }

    fn bind(&mut self, base: &str, value: Value) -> String {
        let name = self.namer.name(base);
        let placeholder = format!("{}{name}", self.dialect.parameter_prefix());
        self.params.push(QueryParam::new(name, value));
        placeholder
    }

    fn column(&self, member: &Member) -> Result<String> {
        let table = match &member.entity {
            Some(entity) => Some(self.aliases.get(entity).ok_or_else(|| {
                Error::translation(format!(
                    "{entity}.{} refers to a table that is not part of the statement",
                    member.name
                ))
            })?),
            None => None,
        };

        let column = self.dialect.quote_identifier(&member.name);
        Ok(match &self.qualifier {
            None => column,
            Some(root) => format!(
                "{}.{column}",
                self.dialect.quote_identifier(table.unwrap_or(root))
            ),
        })
    }
}

fn resolve(member: &Member, operand: &Operand) -> Result<Value> {
    operand.resolve().map_err(|e| {
        Error::translation(format!("cannot evaluate operand for {}: {e}", member.name))
    })
}

/// Translate `predicates` with a fresh namer.
pub fn translate(dialect: &dyn Dialect, predicates: &[Predicate]) -> Result<Option<SqlFragment>> {
    let mut translator = PredicateTranslator::new(dialect);
    let sql = translator.translate(predicates)?;
    Ok(sql.map(|sql| SqlFragment {
        sql,
        params: translator.into_params(),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    use ormsql_proto::{captured, col, col_of, Capture};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::query::StandardDialect;

    fn sql(predicate: Predicate) -> SqlFragment {
        translate(&StandardDialect, &[predicate]).unwrap().unwrap()
    }

    fn names(fragment: &SqlFragment) -> Vec<&str> {
        fragment.params.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_or_group_inside_and() {
        let fragment = sql(
            (col("Name").eq("Ice Candy") | col("Name").eq("Random")) & col("Id").gt(1),
        );

        assert_eq!(
            fragment.sql,
            "((Name = @Name) OR (Name = @Name2)) AND (Id > @Id)"
        );
        assert_eq!(names(&fragment), vec!["Name", "Name2", "Id"]);
        assert_eq!(fragment.params[0].value, Value::from("Ice Candy"));
        assert_eq!(fragment.params[2].value, Value::Int32(1));
    }

    #[test]
    fn test_lone_comparison_is_bare() {
        assert_eq!(sql(col("Id").le(5_i64)).sql, "Id <= @Id");
        assert_eq!(sql(col("Id").ne(5)).sql, "Id <> @Id");
    }

    #[test]
    fn test_collision_naming_is_ordered() {
        let fragment = sql(col("Name").eq("a") | col("Name").eq("b") | col("Name").eq("c"));

        assert_eq!(
            fragment.sql,
            "((Name = @Name) OR (Name = @Name2)) OR (Name = @Name3)"
        );
        assert_eq!(names(&fragment), vec!["Name", "Name2", "Name3"]);
    }

    #[test]
    fn test_nested_shape_is_not_reassociated() {
        let fragment = sql(col("A").eq(1) | (col("B").eq(2) & col("C").eq(3)));
        assert_eq!(fragment.sql, "(A = @A) OR ((B = @B) AND (C = @C))");
    }

    #[test]
    fn test_in_and_not_in() {
        let ints = sql(col("Id").is_in(vec![1, 2, 3, 4]));
        assert_eq!(
            ints.sql,
            "Id IN (@InParam_1,@InParam_2,@InParam_3,@InParam_4)"
        );
        assert_eq!(
            names(&ints),
            vec!["InParam_1", "InParam_2", "InParam_3", "InParam_4"]
        );

        let strings = sql(col("Name").not_in(vec!["a", "b", "c", "d"]));
        assert_eq!(
            strings.sql,
            "Name NOT IN (@InParam_1,@InParam_2,@InParam_3,@InParam_4)"
        );
        assert_eq!(strings.params[3].value, Value::from("d"));
    }

    #[test]
    fn test_second_in_list_continues_numbering() {
        let fragment = sql(col("Id").is_in(vec![1, 2]) & col("Kind").is_in(vec![3]));
        assert_eq!(
            fragment.sql,
            "(Id IN (@InParam_1,@InParam_2)) AND (Kind IN (@InParam_3))"
        );
    }

    #[test]
    fn test_empty_in_list() {
        assert_eq!(sql(col("Id").is_in(Vec::<i32>::new())).sql, "1 = 0");
        assert_eq!(sql(col("Id").not_in(Vec::<i32>::new())).sql, "1 = 1");
    }

    #[test]
    fn test_like_forms() {
        let term = String::from("ice");

        let literal = sql(col("Name").contains("ice"));
        let capture = sql(col("Name").contains(captured(move || term.clone())));
        let call = sql(col("Name").contains(captured(|| "ICE".to_lowercase())));
        for fragment in [&literal, &capture, &call] {
            assert_eq!(fragment.sql, "Name LIKE '%' + @Name + '%'");
            assert_eq!(fragment.params[0].value, Value::from("ice"));
        }

        assert_eq!(sql(col("Name").starts_with("ic")).sql, "Name LIKE @Name + '%'");
        assert_eq!(
            sql(!col("Name").contains("ice")).sql,
            "Name NOT LIKE '%' + @Name + '%'"
        );
        assert_eq!(
            sql(!col("Name").starts_with(captured(|| "ic"))).sql,
            "Name NOT LIKE @Name + '%'"
        );
    }

    #[test]
    fn test_like_requires_string() {
        let err = translate(&StandardDialect, &[col("Id").contains(5)]).unwrap_err();
        assert!(matches!(err, Error::Translation(_)));
    }

    #[test]
    fn test_true_and_not() {
        assert_eq!(sql(Predicate::True).sql, "1 = 1");
        assert_eq!(sql(!col("Id").gt(1)).sql, "NOT (Id > @Id)");
        assert_eq!(
            sql(!(col("A").eq(1) | col("B").eq(2))).sql,
            "NOT ((A = @A) OR (B = @B))"
        );
    }

    #[test]
    fn test_null_comparisons() {
        assert_eq!(sql(col("Price").eq(None::<f64>)).sql, "Price IS NULL");
        assert_eq!(sql(col("Price").ne(Value::Null)).sql, "Price IS NOT NULL");
        assert!(translate(&StandardDialect, &[col("Price").gt(Value::Null)]).is_err());
    }

    #[test]
    fn test_multiple_top_level_predicates() {
        let fragment = translate(
            &StandardDialect,
            &[col("Name").eq("a"), col("Id").gt(1), col("Name").ne("b")],
        )
        .unwrap()
        .unwrap();

        assert_eq!(
            fragment.sql,
            "(Name = @Name) AND (Id > @Id) AND (Name <> @Name2)"
        );
        assert!(translate(&StandardDialect, &[]).unwrap().is_none());
    }

    #[test]
    fn test_captures_snapshot_at_translation() {
        let counter = Arc::new(AtomicI64::new(1));
        let source = counter.clone();
        let predicate = col("Id").gt(captured(move || source.load(Ordering::SeqCst)));

        let first = sql(predicate.clone());
        counter.store(7, Ordering::SeqCst);
        let second = sql(predicate);

        assert_eq!(first.params[0].value, Value::Int64(1));
        assert_eq!(second.params[0].value, Value::Int64(7));
    }

    #[test]
    fn test_failing_capture() {
        let predicate = col("Id").eq(Capture::new(|| Err("gone".to_string())));
        let err = translate(&StandardDialect, &[predicate]).unwrap_err();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_idempotent() {
        let predicate = (col("Name").contains("x") | col("Id").is_in(vec![1, 2]))
            & !col("Name").starts_with("y");

        let a = sql(predicate.clone());
        let b = sql(predicate);
        assert_eq!(a, b);
    }

    #[test]
    fn test_qualified_columns() {
        let mut translator = PredicateTranslator::new(&StandardDialect)
            .qualified("Product")
            .with_alias("Product", "Product")
            .with_alias("Order", "Order_1");
        let condition = translator
            .translate(&[col("Id").eq(1) & col_of("Order", "Id").gt(2)])
            .unwrap()
            .unwrap();

        assert_eq!(condition, "(Product.Id = @Id) AND (Order_1.Id > @Id2)");
    }

    #[test]
    fn test_unknown_entity_rejected() {
        let mut joined = PredicateTranslator::new(&StandardDialect)
            .qualified("Product")
            .with_alias("Product", "Product");
        let err = joined
            .translate(&[col_of("Order", "Id").gt(2)])
            .unwrap_err();
        assert!(matches!(err, Error::Translation(_)));

        let mut single = PredicateTranslator::new(&StandardDialect).with_alias("Product", "Product");
        assert_eq!(
            single.translate(&[col_of("Product", "Id").eq(1)]).unwrap().unwrap(),
            "Id = @Id"
        );
        assert!(single.translate(&[col_of("Order", "Id").eq(1)]).is_err());
    }

    #[test]
    fn test_set_and_where_share_names() {
        let mut translator = PredicateTranslator::new(&StandardDialect);
        let set = translator
            .translate_assignments(&[("Name".to_string(), Value::from("new"))])
            .unwrap();
        let condition = translator
            .translate(&[col("Name").eq("old")])
            .unwrap()
            .unwrap();

        assert_eq!(set, "Name = @Name");
        assert_eq!(condition, "Name = @Name2");
        assert_eq!(translator.params().len(), 2);
        assert!(translator.translate_assignments(&[]).is_err());
    }

    #[test]
    fn test_namer_skips_taken_names() {
        let mut namer = ParamNamer::new();
        assert_eq!(namer.name("Id2"), "Id2");
        assert_eq!(namer.name("Id"), "Id");
        assert_eq!(namer.name("Id"), "Id3");
        assert_eq!(namer.name("InParam_1"), "InParam_1");
        assert_eq!(namer.in_param(), "InParam_2");
    }
}
