//! SQLite connection configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default number of prepared statements kept per connection.
pub const DEFAULT_STATEMENT_CACHE_CAPACITY: usize = 64;

/// SQLite connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file. `None` opens a private in-memory database.
    pub path: Option<PathBuf>,

    /// Enforce foreign-key constraints.
    pub foreign_keys: bool,

    /// Use write-ahead logging for file databases.
    pub wal: bool,

    /// Prepared statements kept per connection.
    pub statement_cache_capacity: usize,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: None,
            foreign_keys: true,
            wal: true,
            statement_cache_capacity: DEFAULT_STATEMENT_CACHE_CAPACITY,
        }
    }
}

impl SqliteConfig {
    /// Configuration for an in-memory database.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Configuration for a database file at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Enable or disable foreign-key enforcement.
    pub fn with_foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Enable or disable write-ahead logging.
    pub fn with_wal(mut self, enabled: bool) -> Self {
        self.wal = enabled;
        self
    }

    /// Set the prepared statement cache capacity.
    pub fn with_statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.statement_cache_capacity = capacity;
        self
    }

    /// Check if this configuration opens an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.path.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SqliteConfig::default();
        assert!(config.is_in_memory());
        assert!(config.foreign_keys);
        assert!(config.wal);
        assert_eq!(config.statement_cache_capacity, DEFAULT_STATEMENT_CACHE_CAPACITY);
    }

    #[test]
    fn test_builder() {
        let config = SqliteConfig::file("/tmp/app.db")
            .with_foreign_keys(false)
            .with_wal(false)
            .with_statement_cache_capacity(8);

        assert_eq!(config.path, Some(PathBuf::from("/tmp/app.db")));
        assert!(!config.foreign_keys);
        assert!(!config.wal);
        assert_eq!(config.statement_cache_capacity, 8);
    }

    #[test]
    fn test_load_from_json() {
        let config: SqliteConfig =
            serde_json::from_str(r#"{"path": "data/app.db", "foreign_keys": false}"#).unwrap();

        assert_eq!(config.path, Some(PathBuf::from("data/app.db")));
        assert!(!config.foreign_keys);
        assert!(config.wal);
    }
}
