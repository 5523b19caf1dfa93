//! Database configuration.

use serde::{Deserialize, Serialize};

/// Default rows per page for [`crate::QueryBuilder::page_number`].
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Whether statements are logged by default.
pub const DEFAULT_LOG_STATEMENTS: bool = true;

/// Database configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Emit a `debug` event with SQL text and parameters for every statement.
    pub log_statements: bool,

    /// Rows per page when paging by page number alone.
    pub default_page_size: u32,

    /// Use the process-wide cache registry instead of an isolated one.
    pub shared_registry: bool,
}

impl DatabaseConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self {
            log_statements: DEFAULT_LOG_STATEMENTS,
            default_page_size: DEFAULT_PAGE_SIZE,
            shared_registry: true,
        }
    }

    /// Set statement logging.
    pub fn with_log_statements(mut self, enabled: bool) -> Self {
        self.log_statements = enabled;
        self
    }

    /// Set the default page size. Zero is raised to one.
    pub fn with_default_page_size(mut self, size: u32) -> Self {
        self.default_page_size = size.max(1);
        self
    }

    /// Use an isolated cache registry.
    pub fn with_isolated_registry(mut self) -> Self {
        self.shared_registry = false;
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DatabaseConfig::default();
        assert!(config.log_statements);
        assert_eq!(config.default_page_size, DEFAULT_PAGE_SIZE);
        assert!(config.shared_registry);
    }

    #[test]
    fn test_config_builder() {
        let config = DatabaseConfig::new()
            .with_log_statements(false)
            .with_default_page_size(0)
            .with_isolated_registry();

        assert!(!config.log_statements);
        assert_eq!(config.default_page_size, 1);
        assert!(!config.shared_registry);
    }

    #[test]
    fn test_config_from_json() {
        let config: DatabaseConfig =
            serde_json::from_str(r#"{ "default_page_size": 20 }"#).unwrap();

        assert_eq!(config.default_page_size, 20);
        assert!(config.log_statements);
        assert!(config.shared_registry);
    }
}
