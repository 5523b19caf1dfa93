//! Schema scripts and database versions.
//!
//! # Modules
//!
//! - [`table`] - DDL script generation capability
//! - [`version`] - Applying and reverting one database version

pub mod table;
pub mod version;

pub use table::{index_name, relation, DatabaseTableGenerator};
pub use version::{apply_version, revert_version, DatabaseVersion, VersionOutcome};

use crate::entity::Entity;
use crate::error::Result;
use crate::session::Transaction;

impl Transaction<'_> {
    /// Create the table for `T`.
    pub fn create_table<T: Entity>(&mut self, tables: &dyn DatabaseTableGenerator) -> Result<()> {
        let script = self
            .database()
            .shape::<T>()
            .and_then(|shape| tables.create_table(&shape));
        self.run_script(script)
    }

    /// Drop the table for `T`.
    pub fn drop_table<T: Entity>(&mut self, tables: &dyn DatabaseTableGenerator) -> Result<()> {
        let script = self
            .database()
            .shape::<T>()
            .and_then(|shape| tables.drop_table(&shape));
        self.run_script(script)
    }

    /// Create an index on columns of `T`.
    pub fn create_index<T: Entity>(
        &mut self,
        tables: &dyn DatabaseTableGenerator,
        columns: &[&str],
    ) -> Result<()> {
        let script = self
            .database()
            .shape::<T>()
            .and_then(|shape| tables.create_index(&shape, columns));
        self.run_script(script)
    }

    /// Drop an index on columns of `T`.
    pub fn drop_index<T: Entity>(
        &mut self,
        tables: &dyn DatabaseTableGenerator,
        columns: &[&str],
    ) -> Result<()> {
        let script = self
            .database()
            .shape::<T>()
            .and_then(|shape| tables.drop_index(&shape, columns));
        self.run_script(script)
    }

    fn run_script(&mut self, script: Result<String>) -> Result<()> {
        match script {
            Ok(sql) => self.execute_script(&sql).map(|_| ()),
            Err(e) => {
                self.mark_failed();
                Err(e)
            }
        }
    }
}
