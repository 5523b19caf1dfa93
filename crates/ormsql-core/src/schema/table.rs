//! DDL script generation.

use ormsql_proto::Relation;

use crate::entity::{Entity, TableShape};
use crate::error::Result;

/// Generates DDL scripts for one backend.
pub trait DatabaseTableGenerator: Send + Sync {
    /// `CREATE TABLE` for `shape`.
    fn create_table(&self, shape: &TableShape) -> Result<String>;

    /// `DROP TABLE` for `shape`.
    fn drop_table(&self, shape: &TableShape) -> Result<String>;

    /// Add a foreign-key constraint.
    fn create_foreign_key(&self, relation: &Relation) -> Result<String>;

    /// Remove a foreign-key constraint.
    fn drop_foreign_key(&self, relation: &Relation) -> Result<String>;

    /// `CREATE INDEX` over `columns`.
    fn create_index(&self, shape: &TableShape, columns: &[&str]) -> Result<String>;

    /// `DROP INDEX` over `columns`.
    fn drop_index(&self, shape: &TableShape, columns: &[&str]) -> Result<String>;
}

/// Relation from `S.source_column` to `D.target_column`, by table name.
pub fn relation<S: Entity, D: Entity>(source_column: &str, target_column: &str) -> Relation {
    Relation::new(S::table_name(), source_column, D::table_name(), target_column)
}

/// Conventional index name, `IX_Table_Col1_Col2`.
pub fn index_name(table: &str, columns: &[&str]) -> String {
    format!("IX_{}_{}", table, columns.join("_"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::FieldDef;

    #[derive(Default)]
    struct Author {
        id: i64,
    }

    impl Entity for Author {
        const TYPE_NAME: &'static str = "Author";

        fn table_name() -> &'static str {
            "Authors"
        }

        fn fields() -> Vec<FieldDef<Self>> {
            vec![FieldDef::key("Id", |a: &Author| &a.id, |a: &mut Author, v| a.id = v)]
        }
    }

    #[derive(Default)]
    struct Book {
        id: i64,
    }

    impl Entity for Book {
        const TYPE_NAME: &'static str = "Book";

        fn fields() -> Vec<FieldDef<Self>> {
            vec![FieldDef::key("Id", |b: &Book| &b.id, |b: &mut Book, v| b.id = v)]
        }
    }

    #[test]
    fn test_relation_uses_table_names() {
        let rel = relation::<Book, Author>("AuthorId", "Id");
        assert_eq!(rel.source_entity, "Book");
        assert_eq!(rel.target_entity, "Authors");
        assert_eq!(rel.constraint_name(), "FK_Book_AuthorId_Authors");
    }

    #[test]
    fn test_index_name() {
        assert_eq!(index_name("Book", &["Title", "Year"]), "IX_Book_Title_Year");
    }
}
