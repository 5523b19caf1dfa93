//! SQLite DDL scripts.

use ormsql_core::schema::index_name;
use ormsql_core::{ColumnShape, DatabaseTableGenerator, Dialect, Error, Result, ScalarType, TableShape};
use ormsql_proto::Relation;

use crate::error::Error as SqliteError;
use crate::generator::SqliteDialect;

/// DDL generator for SQLite.
///
/// SQLite cannot add a constraint to an existing table, so foreign keys are
/// registered up front with [`with_foreign_key`](Self::with_foreign_key) and
/// emitted inside `CREATE TABLE` of the referencing table.
#[derive(Debug, Clone, Default)]
pub struct SqliteTableGenerator {
    foreign_keys: Vec<Relation>,
}

impl SqliteTableGenerator {
    /// Create a generator with no foreign keys.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a foreign key for the table named `relation.source_entity`.
    pub fn with_foreign_key(mut self, relation: Relation) -> Self {
        self.foreign_keys.push(relation);
        self
    }

    fn quote(&self, ident: &str) -> String {
        SqliteDialect.quote_identifier(ident)
    }

    fn column_definition(&self, shape: &TableShape, column: &ColumnShape) -> Result<String> {
        let name = self.quote(&column.name);
        let sql_type = column_type(column.field_type.scalar());

        if column.key && column.generated {
            if sql_type != "INTEGER" {
                return Err(Error::configuration(
                    &shape.entity,
                    format!("generated key {} must be an integer", column.name),
                ));
            }
            return Ok(format!("{name} INTEGER PRIMARY KEY AUTOINCREMENT"));
        }

        let mut definition = format!("{name} {sql_type}");
        if column.key {
            definition.push_str(" NOT NULL PRIMARY KEY");
        } else if !column.field_type.is_nullable() {
            definition.push_str(" NOT NULL");
        }
        Ok(definition)
    }

    fn foreign_key_clause(&self, relation: &Relation) -> String {
        format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            self.quote(&relation.constraint_name()),
            self.quote(&relation.source_column),
            self.quote(&relation.target_entity),
            self.quote(&relation.target_column)
        )
    }
}

fn column_type(scalar: ScalarType) -> &'static str {
    match scalar {
        ScalarType::Bool | ScalarType::Int32 | ScalarType::Int64 | ScalarType::Enum => "INTEGER",
        ScalarType::Float32 | ScalarType::Float64 => "REAL",
        ScalarType::String => "TEXT",
        ScalarType::Bytes => "BLOB",
    }
}

impl DatabaseTableGenerator for SqliteTableGenerator {
    fn create_table(&self, shape: &TableShape) -> Result<String> {
        if shape.columns.is_empty() {
            return Err(Error::configuration(&shape.entity, "no persisted columns"));
        }

        let mut parts = shape
            .columns
            .iter()
            .map(|c| self.column_definition(shape, c))
            .collect::<Result<Vec<_>>>()?;
        parts.extend(
            self.foreign_keys
                .iter()
                .filter(|r| r.source_entity == shape.table)
                .map(|r| self.foreign_key_clause(r)),
        );

        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.quote(&shape.table),
            parts.join(", ")
        ))
    }

    fn drop_table(&self, shape: &TableShape) -> Result<String> {
        Ok(format!("DROP TABLE IF EXISTS {}", self.quote(&shape.table)))
    }

    fn create_foreign_key(&self, relation: &Relation) -> Result<String> {
        Err(SqliteError::Unsupported(format!(
            "cannot add {} to an existing table; declare it before CREATE TABLE",
            relation.constraint_name()
        ))
        .into())
    }

    fn drop_foreign_key(&self, relation: &Relation) -> Result<String> {
        Err(SqliteError::Unsupported(format!(
            "cannot drop {} from an existing table",
            relation.constraint_name()
        ))
        .into())
    }

    fn create_index(&self, shape: &TableShape, columns: &[&str]) -> Result<String> {
        if columns.is_empty() {
            return Err(Error::configuration(&shape.entity, "index needs at least one column"));
        }
        let quoted: Vec<String> = columns.iter().map(|c| self.quote(c)).collect();
        Ok(format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            self.quote(&index_name(&shape.table, columns)),
            self.quote(&shape.table),
            quoted.join(", ")
        ))
    }

    fn drop_index(&self, shape: &TableShape, columns: &[&str]) -> Result<String> {
        Ok(format!(
            "DROP INDEX IF EXISTS {}",
            self.quote(&index_name(&shape.table, columns))
        ))
    }
}
