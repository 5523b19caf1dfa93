//! SQL dialect hooks.

use ormsql_proto::Page;

/// Syntax that differs between SQL backends.
///
/// Defaults produce the `@name` parameter style with `+` concatenation and
/// bare identifiers.
pub trait Dialect: Send + Sync {
    /// Prefix placed before parameter names.
    fn parameter_prefix(&self) -> &str {
        "@"
    }

    /// Join expressions with the string concatenation operator.
    fn concat(&self, parts: &[&str]) -> String {
        parts.join(" + ")
    }

    /// Enclose a table or column identifier.
    fn quote_identifier(&self, ident: &str) -> String {
        ident.to_string()
    }

    /// Enclose a column alias. Aliases contain dots and are always quoted.
    fn quote_alias(&self, alias: &str) -> String {
        format!("\"{}\"", alias.replace('"', "\"\""))
    }

    /// Paging clause appended after ORDER BY.
    fn paging_clause(&self, page: &Page) -> String {
        format!(
            "OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
            page.offset(),
            page.count
        )
    }

    /// Whether the backend reports column names in a different case than
    /// requested, so lookups must ignore case.
    fn folds_column_case(&self) -> bool {
        false
    }
}

/// The default dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDialect;

impl Dialect for StandardDialect {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_dialect() {
        let dialect = StandardDialect;
        assert_eq!(dialect.concat(&["'%'", "@Name", "'%'"]), "'%' + @Name + '%'");
        assert_eq!(dialect.quote_identifier("Name"), "Name");
        assert_eq!(dialect.quote_alias("Product.Id"), "\"Product.Id\"");
        assert_eq!(
            dialect.paging_clause(&Page::new(3, 10)),
            "OFFSET 20 ROWS FETCH NEXT 10 ROWS ONLY"
        );
    }
}
