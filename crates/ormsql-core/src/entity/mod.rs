//! Entity declarations.
//!
//! A persisted type implements [`Entity`] by listing its fields. The list is
//! read once per process (see [`crate::cache::AccessorCache`]) and compiled
//! into an accessor table.

mod field;
mod types;

pub use field::FieldDef;
pub use types::{coerce, enum_from_value, CoerceError, FieldType, ScalarType, SqlEnum, SqlType};

/// A type that maps to one table.
pub trait Entity: Default + 'static {
    /// Type name, used as the table alias and as the column-key prefix.
    const TYPE_NAME: &'static str;

    /// Physical table name.
    fn table_name() -> &'static str {
        Self::TYPE_NAME
    }

    /// Field declarations. Exactly one must be a key.
    fn fields() -> Vec<FieldDef<Self>>;
}

/// Column metadata handed to query and table generators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnShape {
    /// Column name.
    pub name: String,
    /// Declared type.
    pub field_type: FieldType,
    /// Whether this is the key column.
    pub key: bool,
    /// Whether the store assigns the value on insert.
    pub generated: bool,
}

/// Table metadata for one entity type: its persisted columns only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableShape {
    /// Entity type name.
    pub entity: String,
    /// Physical table name.
    pub table: String,
    /// Persisted columns in declaration order.
    pub columns: Vec<ColumnShape>,
}

impl TableShape {
    /// The key column.
    pub fn key(&self) -> Option<&ColumnShape> {
        self.columns.iter().find(|c| c.key)
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnShape> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Result-set column key, `Alias.Column`.
pub fn column_key(alias: &str, column: &str) -> String {
    format!("{alias}.{column}")
}

/// Table alias for the `occurrence`-th appearance of a type in a join chain.
///
/// The first appearance uses the bare type name.
pub fn table_alias(type_name: &str, occurrence: usize) -> String {
    if occurrence == 0 {
        type_name.to_string()
    } else {
        format!("{type_name}_{occurrence}")
    }
}
