//! Transactions.
//!
//! Every write runs inside a [`Transaction`]. A failed write does not unwind
//! the transaction; it clears the success flag, and [`Transaction::complete`]
//! then rolls back instead of committing.

use ormsql_proto::{Predicate, Value};
use tracing::{debug, warn};

use super::Database;
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::query::{QueryBuilder, SqlStatement};

/// A write scope with an explicit success flag.
pub struct Transaction<'db> {
    db: &'db Database,
    success: bool,
    completed: bool,
}

impl<'db> Transaction<'db> {
    pub(crate) fn begin(db: &'db Database) -> Result<Self> {
        db.connection().begin()?;
        debug!("transaction started");
        Ok(Self {
            db,
            success: true,
            completed: false,
        })
    }

    /// Whether every operation so far succeeded.
    pub fn is_successful(&self) -> bool {
        self.success
    }

    /// Force a rollback on completion.
    pub fn mark_failed(&mut self) {
        self.success = false;
    }

    /// The database this transaction runs on.
    pub fn database(&self) -> &'db Database {
        self.db
    }

    /// Start a query that reads inside this transaction.
    pub fn query<T: Entity>(&self) -> QueryBuilder<'db, T> {
        self.db.query::<T>()
    }

    /// Insert `entity`.
    ///
    /// A store-generated key that is still empty is left out of the
    /// statement, and the assigned key is written back into `entity`.
    pub fn insert<T: Entity>(&mut self, entity: &mut T) -> Result<()> {
        let result = self.insert_inner(entity);
        self.track(result)
    }

    /// Insert each entity in order.
    pub fn insert_all<T: Entity>(&mut self, entities: &mut [T]) -> Result<()> {
        for entity in entities {
            self.insert(entity)?;
        }
        Ok(())
    }

    /// Update every persisted column of the row with `entity`'s key.
    pub fn update<T: Entity>(&mut self, entity: &T) -> Result<u64> {
        let result = self.db.accessors::<T>().and_then(|table| {
            let stmt = self.db.generator().update(
                table.shape(),
                &table.values(entity),
                &table.key_value(entity),
            )?;
            self.db.run(&stmt)
        });
        self.track(result)
    }

    /// Delete the row with `entity`'s key.
    pub fn delete<T: Entity>(&mut self, entity: &T) -> Result<u64> {
        let result = self.db.accessors::<T>().and_then(|table| {
            let stmt = self
                .db
                .generator()
                .delete(table.shape(), &table.key_value(entity))?;
            self.db.run(&stmt)
        });
        self.track(result)
    }

    /// Set `values` on every row of `T` matching `filter`.
    pub fn update_where<T: Entity>(&mut self, values: &[(&str, Value)], filter: Predicate) -> Result<u64> {
        let result = self.db.shape::<T>().and_then(|shape| {
            let values: Vec<(String, Value)> = values
                .iter()
                .map(|(column, value)| (column.to_string(), value.clone()))
                .collect();
            let stmt = self.db.generator().update_where(&shape, &values, &[filter])?;
            self.db.run(&stmt)
        });
        self.track(result)
    }

    /// Delete every row of `T` matching `filter`.
    pub fn delete_where<T: Entity>(&mut self, filter: Predicate) -> Result<u64> {
        let result = self.db.shape::<T>().and_then(|shape| {
            let stmt = self.db.generator().delete_where(&shape, &[filter])?;
            self.db.run(&stmt)
        });
        self.track(result)
    }

    /// Run raw SQL inside the transaction.
    pub fn execute_script(&mut self, sql: &str) -> Result<u64> {
        let result = self.db.run(&SqlStatement {
            sql: sql.to_string(),
            params: Vec::new(),
        });
        self.track(result)
    }

    /// Commit if every operation succeeded, roll back otherwise.
    ///
    /// Returns whether the transaction committed.
    pub fn complete(mut self) -> bool {
        self.completed = true;

        if !self.success {
            if let Err(e) = self.db.connection().rollback() {
                warn!(error = %e, "rollback failed");
            }
            debug!("transaction rolled back");
            return false;
        }

        match self.db.connection().commit() {
            Ok(()) => {
                debug!("transaction committed");
                true
            }
            Err(e) => {
                warn!(error = %e, "commit failed, rolling back");
                self.success = false;
                if let Err(e) = self.db.connection().rollback() {
                    warn!(error = %e, "rollback failed");
                }
                false
            }
        }
    }

    fn insert_inner<T: Entity>(&self, entity: &mut T) -> Result<()> {
        let table = self.db.accessors::<T>()?;
        let key = table.key_field();
        let omit_key = key.generated && is_unassigned(&table.key_value(entity));

        let values: Vec<(String, Value)> = table
            .values(entity)
            .into_iter()
            .filter(|(name, _)| !(omit_key && name == &key.name))
            .collect();
        let stmt = self.db.generator().insert(table.shape(), &values)?;
        self.db.run(&stmt)?;

        if omit_key {
            if let Some(id) = self.db.connection().last_insert_id()? {
                if let Some(Err(e)) = table.set(entity, &key.name, Value::Int64(id)) {
                    return Err(Error::Materialization {
                        entity: T::TYPE_NAME.to_string(),
                        property: key.name.clone(),
                        source_type: e.from.to_string(),
                        target_type: key.field_type.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn track<R>(&mut self, result: Result<R>) -> Result<R> {
        if let Err(e) = &result {
            debug!(error = %e, "operation failed, transaction will roll back");
            self.success = false;
        }
        result
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.completed {
            warn!("transaction dropped without completion, rolling back");
            if let Err(e) = self.db.connection().rollback() {
                warn!(error = %e, "rollback failed");
            }
        }
    }
}

fn is_unassigned(key: &Value) -> bool {
    match key {
        Value::Null => true,
        Value::Int32(0) | Value::Int64(0) => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
