//! SQLite connection.
//!
//! Statements arrive with `@name` placeholders and are bound by name through
//! the driver's prepared statement cache. Query results are read eagerly into
//! a [`BufferedReader`], so the connection lock is never held across rows.

use parking_lot::Mutex;
use rusqlite::config::DbConfig;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::Statement;
use tracing::debug;

use ormsql_core::query::{BufferedReader, QueryParam, RowReader};
use ormsql_core::Connection;
use ormsql_proto::Value;

use crate::config::SqliteConfig;
use crate::error::{Error, Result};
use crate::generator::PARAMETER_PREFIX;

/// A connection to one SQLite database.
pub struct SqliteConnection {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteConnection {
    /// Open a database as described by `config`.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let conn = match &config.path {
            Some(path) => {
                let conn = rusqlite::Connection::open(path)?;
                if config.wal {
                    let mode: String =
                        conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
                    debug!(mode = %mode, "journal mode set");
                }
                conn
            }
            None => rusqlite::Connection::open_in_memory()?,
        };

        // Quoted identifiers must never fall back to string literals.
        conn.set_db_config(DbConfig::SQLITE_DBCONFIG_DQS_DML, false)?;
        conn.set_db_config(DbConfig::SQLITE_DBCONFIG_DQS_DDL, false)?;

        let foreign_keys = if config.foreign_keys { "ON" } else { "OFF" };
        conn.execute_batch(&format!("PRAGMA foreign_keys={foreign_keys};"))?;
        conn.set_prepared_statement_cache_capacity(config.statement_cache_capacity);

        debug!(path = ?config.path, foreign_keys = config.foreign_keys, "opened sqlite database");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory database with default settings.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(&SqliteConfig::in_memory())
    }

    fn read_all(&self, sql: &str, params: &[QueryParam]) -> Result<BufferedReader> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(sql)?;
        bind(&mut stmt, params)?;

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut rows = stmt.raw_query();
        let mut values = Vec::new();
        while let Some(row) = rows.next()? {
            let row_values = (0..width)
                .map(|i| row.get_ref(i).map(from_sql))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            values.push(row_values);
        }

        Ok(BufferedReader::new(Some(columns), values))
    }

    fn run(&self, sql: &str, params: &[QueryParam]) -> Result<u64> {
        let conn = self.conn.lock();

        // Parameterless text may be a multi-statement script.
        if params.is_empty() {
            conn.execute_batch(sql)?;
            return Ok(conn.changes());
        }

        let mut stmt = conn.prepare_cached(sql)?;
        bind(&mut stmt, params)?;
        let changed = stmt.raw_execute()?;
        Ok(changed as u64)
    }

    fn batch(&self, sql: &str) -> Result<()> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }
}

impl Connection for SqliteConnection {
    fn query(&self, sql: &str, params: &[QueryParam]) -> ormsql_core::Result<Box<dyn RowReader + '_>> {
        let reader = self.read_all(sql, params)?;
        Ok(Box::new(reader))
    }

    fn execute(&self, sql: &str, params: &[QueryParam]) -> ormsql_core::Result<u64> {
        Ok(self.run(sql, params)?)
    }

    fn last_insert_id(&self) -> ormsql_core::Result<Option<i64>> {
        let id = self.conn.lock().last_insert_rowid();
        Ok((id != 0).then_some(id))
    }

    fn begin(&self) -> ormsql_core::Result<()> {
        Ok(self.batch("BEGIN")?)
    }

    fn commit(&self) -> ormsql_core::Result<()> {
        Ok(self.batch("COMMIT")?)
    }

    fn rollback(&self) -> ormsql_core::Result<()> {
        Ok(self.batch("ROLLBACK")?)
    }
}

fn bind(stmt: &mut Statement<'_>, params: &[QueryParam]) -> Result<()> {
    for param in params {
        let placeholder = format!("{PARAMETER_PREFIX}{}", param.name);
        let index = stmt
            .parameter_index(&placeholder)?
            .ok_or_else(|| Error::UnknownParameter(placeholder.clone()))?;
        stmt.raw_bind_parameter(index, to_sql(&param.value)?)?;
    }
    Ok(())
}

fn to_sql(value: &Value) -> Result<SqlValue> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int32(i) => SqlValue::Integer(i64::from(*i)),
        Value::Int64(i) => SqlValue::Integer(*i),
        Value::Float32(f) => SqlValue::Real(f64::from(*f)),
        Value::Float64(f) => SqlValue::Real(*f),
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Bytes(b) => SqlValue::Blob(b.clone()),
        Value::List(_) => {
            return Err(Error::UnsupportedValue(
                "list values must be expanded before binding".to_string(),
            ))
        }
    })
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Float64(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> SqliteConnection {
        let conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE T (Id INTEGER PRIMARY KEY AUTOINCREMENT, Name TEXT, Score REAL)",
            &[],
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_bind_by_name() {
        let conn = connection();
        let inserted = conn
            .execute(
                "INSERT INTO T (Score, Name) VALUES (@Score, @Name)",
                &[
                    QueryParam::new("Name", Value::from("ann")),
                    QueryParam::new("Score", Value::Float64(1.5)),
                ],
            )
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(conn.last_insert_id().unwrap(), Some(1));

        let mut reader = conn
            .query(
                "SELECT Name AS \"T.Name\", Score FROM T WHERE Id = @Id",
                &[QueryParam::new("Id", Value::Int32(1))],
            )
            .unwrap();
        assert_eq!(
            reader.column_names(),
            Some(vec!["T.Name".to_string(), "Score".to_string()])
        );
        assert_eq!(
            reader.next_row().unwrap(),
            Some(vec![Value::from("ann"), Value::Float64(1.5)])
        );
        assert_eq!(reader.next_row().unwrap(), None);
    }

    #[test]
    fn test_value_mapping() {
        assert_eq!(to_sql(&Value::Bool(true)).unwrap(), SqlValue::Integer(1));
        assert_eq!(to_sql(&Value::Null).unwrap(), SqlValue::Null);
        assert!(to_sql(&Value::List(vec![Value::Int64(1)])).is_err());
        assert_eq!(from_sql(ValueRef::Blob(&[1, 2])), Value::Bytes(vec![1, 2]));
        assert_eq!(from_sql(ValueRef::Text(b"x")), Value::from("x"));
    }

    #[test]
    fn test_unknown_parameter() {
        let conn = connection();
        let err = conn
            .execute(
                "DELETE FROM T WHERE Id = @Id",
                &[QueryParam::new("Other", Value::Int64(1))],
            )
            .unwrap_err();
        assert!(err.to_string().contains("@Other"));
    }

    #[test]
    fn test_quoted_identifiers_are_never_literals() {
        let conn = connection();
        assert!(conn.query("SELECT \"Missing\" FROM T", &[]).is_err());
        assert!(conn.execute("CREATE INDEX IX_T ON T (\"Missing\")", &[]).is_err());
    }

    #[test]
    fn test_rollback_discards_writes() {
        let conn = connection();
        conn.begin().unwrap();
        conn.execute("INSERT INTO T (Name) VALUES ('x')", &[]).unwrap();
        conn.rollback().unwrap();

        let mut reader = conn.query("SELECT COUNT(*) FROM T", &[]).unwrap();
        assert_eq!(reader.next_row().unwrap(), Some(vec![Value::Int64(0)]));
    }
}
