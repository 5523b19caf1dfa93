//! ormsql Core - Predicate translation, accessor caching, and materialization.
//!
//! This crate turns typed predicates and entity objects into parameterized
//! SQL and folds result rows back into typed object graphs. Backends plug in
//! through [`Connection`] and [`QueryGenerator`].

pub mod cache;
pub mod config;
pub mod entity;
pub mod error;
pub mod query;
pub mod schema;
pub mod session;

pub use cache::{AccessorCache, AccessorTable, CacheStats, OrdinalCache, OrdinalTable, Registry};
pub use config::DatabaseConfig;
pub use entity::{
    ColumnShape, Entity, FieldDef, FieldType, ScalarType, SqlEnum, SqlType, TableShape,
};
pub use error::{Error, Result};
pub use query::{
    BufferedReader, DataRow, Dialect, QueryBuilder, QueryGenerator, QueryParam, RowReader,
    SelectState, SqlStatement, StandardDialect, StandardGenerator,
};
pub use schema::{
    apply_version, revert_version, DatabaseTableGenerator, DatabaseVersion, VersionOutcome,
};
pub use session::{Connection, Database, Transaction};

/// Re-export protocol types.
pub use ormsql_proto as proto;
