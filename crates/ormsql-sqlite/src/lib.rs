//! ormsql SQLite - A `rusqlite` backend for ormsql.
//!
//! Provides a [`Connection`](ormsql_core::Connection) over one SQLite
//! database, a [`QueryGenerator`](ormsql_core::QueryGenerator) for SQLite
//! syntax, and DDL generation for schema versions.
//!
//! # Example
//!
//! ```no_run
//! use ormsql_core::DatabaseConfig;
//! use ormsql_sqlite::SqliteConfig;
//!
//! let db = ormsql_sqlite::open(&SqliteConfig::file("app.db"), DatabaseConfig::default())?;
//! # Ok::<(), ormsql_sqlite::Error>(())
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod generator;
pub mod table;

pub use config::SqliteConfig;
pub use connection::SqliteConnection;
pub use error::{Error, Result};
pub use generator::{SqliteDialect, SqliteGenerator};
pub use table::SqliteTableGenerator;

use ormsql_core::{Database, DatabaseConfig};

/// Open a database handle backed by SQLite.
pub fn open(config: &SqliteConfig, database: DatabaseConfig) -> Result<Database> {
    let connection = SqliteConnection::open(config)?;
    Ok(Database::with_config(connection, SqliteGenerator::new(), database))
}
