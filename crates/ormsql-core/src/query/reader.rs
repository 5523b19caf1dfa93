//! Forward-only row access.

use std::collections::VecDeque;
use std::sync::Arc;

use ormsql_proto::Value;

use crate::cache::OrdinalTable;
use crate::error::Result;

/// Forward-only cursor over a result set, supplied by a connection.
pub trait RowReader {
    /// Result-set column names, if the backend can report them.
    fn column_names(&self) -> Option<Vec<String>>;

    /// Number of columns per row.
    fn column_count(&self) -> usize;

    /// Advance to the next row.
    fn next_row(&mut self) -> Result<Option<Vec<Value>>>;
}

/// A reader over rows that were already fetched into memory.
#[derive(Debug, Clone, Default)]
pub struct BufferedReader {
    columns: Option<Vec<String>>,
    width: usize,
    rows: VecDeque<Vec<Value>>,
}

impl BufferedReader {
    /// Create a reader. `columns` may be `None` to simulate a backend that
    /// cannot describe its result set.
    pub fn new(columns: Option<Vec<String>>, rows: Vec<Vec<Value>>) -> Self {
        let width = columns
            .as_ref()
            .map(Vec::len)
            .or_else(|| rows.first().map(Vec::len))
            .unwrap_or(0);
        Self {
            columns,
            width,
            rows: rows.into(),
        }
    }

    /// Rows not yet read.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl RowReader for BufferedReader {
    fn column_names(&self) -> Option<Vec<String>> {
        self.columns.clone()
    }

    fn column_count(&self) -> usize {
        self.width
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        Ok(self.rows.pop_front())
    }
}

/// One physical result row, addressed by column key.
#[derive(Debug, Clone)]
pub struct DataRow {
    ordinals: Arc<OrdinalTable>,
    values: Vec<Value>,
}

impl DataRow {
    /// Wrap raw values with the ordinal table of their query.
    pub fn new(ordinals: Arc<OrdinalTable>, values: Vec<Value>) -> Self {
        Self { ordinals, values }
    }

    /// Value for a column key. `None` if the column is not in the result.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.ordinals.get(key).and_then(|i| self.values.get(i))
    }

    /// Value at a raw ordinal.
    pub fn at(&self, ordinal: usize) -> Option<&Value> {
        self.values.get(ordinal)
    }

    /// Raw values in result order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}
