//! Core error types.

use thiserror::Error;

/// Core errors.
///
/// Translation and materialization errors indicate a mismatch between the
/// caller's code and the schema. They are never retried.
#[derive(Debug, Error)]
pub enum Error {
    /// A persisted type is misdeclared (missing or duplicate key).
    #[error("configuration error on {entity}: {message}")]
    Configuration {
        /// Entity type name.
        entity: String,
        /// What is wrong.
        message: String,
    },

    /// A predicate tree has an unsupported shape.
    #[error("translation error: {0}")]
    Translation(String),

    /// A raw column value could not be coerced into its property.
    #[error("cannot materialize {entity}.{property}: {source_type} is not convertible to {target_type}")]
    Materialization {
        /// Entity type name.
        entity: String,
        /// Property name.
        property: String,
        /// Type of the raw value.
        source_type: String,
        /// Declared property type.
        target_type: String,
    },

    /// A cache entry has the wrong shape for its key.
    #[error("cache consistency error: {0}")]
    CacheConsistency(String),

    /// Applying or reverting a database version failed.
    #[error("version {version} failed: {message}")]
    Versioning {
        /// Version number.
        version: u32,
        /// Underlying failure.
        message: String,
    },

    /// The connection collaborator reported a failure.
    #[error("backend error: {0}")]
    Backend(String),
}

impl Error {
    /// Create a configuration error.
    pub fn configuration(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Configuration {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Create a translation error.
    pub fn translation(message: impl Into<String>) -> Self {
        Error::Translation(message.into())
    }

    /// Create a backend error from any displayable failure.
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Error::Backend(err.to_string())
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
