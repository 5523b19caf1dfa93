//! Query translation, assembly, and materialization.
//!
//! # Modules
//!
//! - [`translate`] - Predicate trees to SQL fragments and parameters
//! - [`dialect`] - Syntax hooks that differ between backends
//! - [`generator`] - Statement assembly
//! - [`reader`] - Forward-only row access
//! - [`materialize`] - Rows to entity instances
//! - [`relate`] - Folding joined rows into object graphs
//! - [`builder`] - The fluent query builder

pub mod builder;
pub mod dialect;
pub mod generator;
pub mod materialize;
pub mod reader;
pub mod relate;
pub mod translate;

pub use builder::QueryBuilder;
pub use dialect::{Dialect, StandardDialect};
pub use generator::{
    JoinedTable, ProjectedColumn, QueryGenerator, SelectState, SqlStatement, StandardGenerator,
};
pub use materialize::{is_absent, materialize};
pub use reader::{BufferedReader, DataRow, RowReader};
pub use relate::{fold, Relate};
pub use translate::{translate, ParamNamer, PredicateTranslator, QueryParam, SqlFragment};
