//! Backend connection capability.

use crate::error::Result;
use crate::query::{QueryParam, RowReader};

/// A live connection to a SQL backend.
///
/// Statement text arrives with `@name`-style (or dialect-prefixed)
/// placeholders and a matching parameter list; binding them is the
/// backend's job. Timeouts and cancellation are the backend's too.
pub trait Connection: Send {
    /// Run a query and return a forward-only reader over its rows.
    fn query(&self, sql: &str, params: &[QueryParam]) -> Result<Box<dyn RowReader + '_>>;

    /// Run a statement and return the number of affected rows.
    fn execute(&self, sql: &str, params: &[QueryParam]) -> Result<u64>;

    /// Key assigned by the store to the most recent insert, if any.
    fn last_insert_id(&self) -> Result<Option<i64>>;

    /// Start a transaction.
    fn begin(&self) -> Result<()>;

    /// Commit the current transaction.
    fn commit(&self) -> Result<()>;

    /// Roll back the current transaction.
    fn rollback(&self) -> Result<()>;
}
