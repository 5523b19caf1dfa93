//! Database sessions.
//!
//! # Modules
//!
//! - [`connection`] - Backend connection capability
//! - [`transaction`] - Write scope with an explicit success flag

pub mod connection;
pub mod transaction;

use std::sync::Arc;

use ormsql_proto::Value;
use tracing::debug;

pub use connection::Connection;
pub use transaction::Transaction;

use crate::cache::{AccessorTable, Registry};
use crate::config::DatabaseConfig;
use crate::entity::{Entity, TableShape};
use crate::error::{Error, Result};
use crate::query::{DataRow, QueryBuilder, QueryGenerator, SqlStatement};

/// A connection paired with a query generator and cache registry.
pub struct Database {
    connection: Box<dyn Connection>,
    generator: Arc<dyn QueryGenerator>,
    registry: Arc<Registry>,
    config: DatabaseConfig,
}

impl Database {
    /// Create a database handle with default configuration.
    pub fn new(
        connection: impl Connection + 'static,
        generator: impl QueryGenerator + 'static,
    ) -> Self {
        Self::with_config(connection, generator, DatabaseConfig::default())
    }

    /// Create a database handle.
    pub fn with_config(
        connection: impl Connection + 'static,
        generator: impl QueryGenerator + 'static,
        config: DatabaseConfig,
    ) -> Self {
        let registry = if config.shared_registry {
            Registry::shared()
        } else {
            Arc::new(Registry::new())
        };
        Self {
            connection: Box::new(connection),
            generator: Arc::new(generator),
            registry,
            config,
        }
    }

    /// Replace the cache registry.
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self
    }

    /// Configuration.
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Cache registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Query generator.
    pub fn generator(&self) -> &dyn QueryGenerator {
        self.generator.as_ref()
    }

    /// Underlying connection.
    pub fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }

    /// Accessor table for `T`.
    pub fn accessors<T: Entity>(&self) -> Result<Arc<AccessorTable<T>>> {
        self.registry.accessors().table::<T>()
    }

    /// Table metadata for `T`.
    pub fn shape<T: Entity>(&self) -> Result<TableShape> {
        Ok(self.accessors::<T>()?.shape().clone())
    }

    /// Start a query over `T`.
    pub fn query<T: Entity>(&self) -> QueryBuilder<'_, T> {
        QueryBuilder::new(self)
    }

    /// Start a transaction.
    pub fn begin(&self) -> Result<Transaction<'_>> {
        Transaction::begin(self)
    }

    /// Run `f` in a transaction and complete it.
    ///
    /// An error from `f` marks the transaction failed. Returns whether the
    /// transaction committed; only a failure to begin is returned as `Err`.
    pub fn transaction<F>(&self, f: F) -> Result<bool>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<()>,
    {
        let mut tx = self.begin()?;
        if let Err(e) = f(&mut tx) {
            debug!(error = %e, "transaction body failed");
            tx.mark_failed();
        }
        Ok(tx.complete())
    }

    /// Run raw SQL, such as a DDL script, outside the query builder.
    pub fn execute_script(&self, sql: &str) -> Result<u64> {
        self.run(&SqlStatement {
            sql: sql.to_string(),
            params: Vec::new(),
        })
    }

    pub(crate) fn run(&self, stmt: &SqlStatement) -> Result<u64> {
        self.log(stmt);
        self.connection.execute(&stmt.sql, &stmt.params)
    }

    pub(crate) fn fetch(&self, stmt: &SqlStatement, projection: &[String]) -> Result<Vec<DataRow>> {
        self.log(stmt);
        let mut reader = self.connection.query(&stmt.sql, &stmt.params)?;
        let ordinals = self.registry.ordinals().get_or_resolve(
            &stmt.sql,
            projection,
            reader.as_ref(),
            self.generator.dialect().folds_column_case(),
        );

        let mut rows = Vec::new();
        while let Some(values) = reader.next_row()? {
            rows.push(DataRow::new(ordinals.clone(), values));
        }
        debug!(rows = rows.len(), "fetched rows");
        Ok(rows)
    }

    pub(crate) fn fetch_count(&self, stmt: &SqlStatement) -> Result<u64> {
        self.log(stmt);
        let mut reader = self.connection.query(&stmt.sql, &stmt.params)?;
        let value = reader
            .next_row()?
            .and_then(|row| row.into_iter().next())
            .unwrap_or(Value::Null);

        value
            .as_i64()
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| Error::backend(format!("count query returned {value}")))
    }

    fn log(&self, stmt: &SqlStatement) {
        if self.config.log_statements {
            debug!(sql = %stmt.sql, params = ?stmt.params, "executing statement");
        }
    }
}
