//! Per-query column ordinal tables.
//!
//! Resolving result-set columns by name is the slow path. The first execution
//! of a query text asks the reader for its schema; every later execution of
//! the same text reuses the resolved ordinals.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace};

use super::CacheStats;
use crate::query::RowReader;

/// Column key (`Alias.Column`) to result-set ordinal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrdinalTable {
    ordinals: HashMap<String, usize>,
}

impl OrdinalTable {
    /// Resolve `projection` against the reader's reported column names.
    ///
    /// Keys missing from the result are left out. When the reader cannot
    /// report names, ordinals follow projection order.
    pub fn resolve(projection: &[String], reader: &dyn RowReader, fold_case: bool) -> Self {
        let ordinals = match reader.column_names() {
            Some(names) => {
                let fold = |s: &str| {
                    if fold_case {
                        s.to_lowercase()
                    } else {
                        s.to_string()
                    }
                };
                let by_name: HashMap<String, usize> = names
                    .iter()
                    .enumerate()
                    .map(|(i, name)| (fold(name), i))
                    .collect();

                projection
                    .iter()
                    .filter_map(|key| match by_name.get(&fold(key)) {
                        Some(&i) => Some((key.clone(), i)),
                        None => {
                            trace!(column = %key, "column absent from result set");
                            None
                        }
                    })
                    .collect()
            }
            None => projection
                .iter()
                .take(reader.column_count())
                .enumerate()
                .map(|(i, key)| (key.clone(), i))
                .collect(),
        };

        Self { ordinals }
    }

    /// Ordinal for a column key.
    pub fn get(&self, key: &str) -> Option<usize> {
        self.ordinals.get(key).copied()
    }

    /// Number of resolved columns.
    pub fn len(&self) -> usize {
        self.ordinals.len()
    }

    /// Check if no column was resolved.
    pub fn is_empty(&self) -> bool {
        self.ordinals.is_empty()
    }
}

/// Process-wide map from query text to its ordinal table.
#[derive(Default)]
pub struct OrdinalCache {
    tables: DashMap<String, Arc<OrdinalTable>>,
    stats: CacheStats,
}

impl OrdinalCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the ordinal table for `sql`, resolving it from `reader` on first use.
    pub fn get_or_resolve(
        &self,
        sql: &str,
        projection: &[String],
        reader: &dyn RowReader,
        fold_case: bool,
    ) -> Arc<OrdinalTable> {
        if let Some(entry) = self.tables.get(sql) {
            self.stats.record_hit();
            return entry.value().clone();
        }

        self.stats.record_miss();
        self.stats.record_build();
        let table = Arc::new(OrdinalTable::resolve(projection, reader, fold_case));
        debug!(columns = table.len(), "resolved column ordinals");

        self.tables
            .entry(sql.to_string())
            .or_insert(table)
            .value()
            .clone()
    }

    /// Number of cached query texts.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Check if nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Number of times a reader was asked for its schema.
    pub fn schema_lookups(&self) -> u64 {
        self.stats.builds()
    }

    /// Cache statistics.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}
