//! SQLite dialect and query generator.

use ormsql_core::{Dialect, QueryGenerator};
use ormsql_proto::Page;

/// Placeholder prefix bound by [`SqliteConnection`](crate::SqliteConnection).
pub(crate) const PARAMETER_PREFIX: &str = "@";

/// SQLite syntax: quoted identifiers, `||` concatenation, `LIMIT`/`OFFSET`.
///
/// SQLite's `LIKE` ignores ASCII case, so `contains` and `starts_with`
/// predicates are case-insensitive on this backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn parameter_prefix(&self) -> &str {
        PARAMETER_PREFIX
    }

    fn concat(&self, parts: &[&str]) -> String {
        parts.join(" || ")
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn paging_clause(&self, page: &Page) -> String {
        format!("LIMIT {} OFFSET {}", page.count, page.offset())
    }
}

/// Query generator for SQLite.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteGenerator {
    dialect: SqliteDialect,
}

impl SqliteGenerator {
    /// Create a generator.
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueryGenerator for SqliteGenerator {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }
}
