//! Database versions.
//!
//! A version is one reversible schema step. Ordering versions and recording
//! which ones ran belongs to the embedding application.

use tracing::{info, warn};

use super::table::DatabaseTableGenerator;
use crate::error::{Error, Result};
use crate::session::{Database, Transaction};

/// One reversible schema step.
pub trait DatabaseVersion {
    /// Version number.
    fn version(&self) -> u32;

    /// Apply the step.
    fn apply(&self, tx: &mut Transaction<'_>, tables: &dyn DatabaseTableGenerator) -> Result<()>;

    /// Undo the step.
    fn revert(&self, tx: &mut Transaction<'_>, tables: &dyn DatabaseTableGenerator) -> Result<()>;
}

/// Result of applying or reverting a version.
#[derive(Debug)]
pub struct VersionOutcome {
    /// Version number.
    pub version: u32,
    /// Whether the transaction committed.
    pub success: bool,
    /// Why it did not, as [`Error::Versioning`].
    pub error: Option<Error>,
}

/// Apply `version` in its own transaction.
pub fn apply_version(
    db: &Database,
    tables: &dyn DatabaseTableGenerator,
    version: &dyn DatabaseVersion,
) -> VersionOutcome {
    run(db, version.version(), "apply", |tx| version.apply(tx, tables))
}

/// Revert `version` in its own transaction.
pub fn revert_version(
    db: &Database,
    tables: &dyn DatabaseTableGenerator,
    version: &dyn DatabaseVersion,
) -> VersionOutcome {
    run(db, version.version(), "revert", |tx| version.revert(tx, tables))
}

fn run<F>(db: &Database, version: u32, action: &str, step: F) -> VersionOutcome
where
    F: FnOnce(&mut Transaction<'_>) -> Result<()>,
{
    let failed = |message: String| {
        warn!(version, action, error = %message, "database version failed");
        VersionOutcome {
            version,
            success: false,
            error: Some(Error::Versioning { version, message }),
        }
    };

    let mut tx = match db.begin() {
        Ok(tx) => tx,
        Err(e) => return failed(e.to_string()),
    };

    let error = step(&mut tx).err();
    if error.is_some() {
        tx.mark_failed();
    }
    let committed = tx.complete();

    match (committed, error) {
        (true, _) => {
            info!(version, action, "database version done");
            VersionOutcome {
                version,
                success: true,
                error: None,
            }
        }
        (false, Some(e)) => failed(e.to_string()),
        (false, None) => failed("transaction did not commit".to_string()),
    }
}
