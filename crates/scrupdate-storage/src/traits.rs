//! The [`ProgramRepository`] trait defining the program store's CRUD contract.
//!
//! Result convention:
//! - `Err` is reserved for misuse of the store itself, such as calling a
//!   method while the store is closed.
//! - Everything the engine reports (duplicate names, constraint failures,
//!   undecodable rows) is logged and collapses to `Ok(false)` / `Ok(None)`.
//! - Mutations return `Ok(true)` iff at least one row was affected.

use std::collections::HashMap;

use scrupdate_core::{
    InstallationScope, Program, UpdateCheckConfigurationError, UpdateCheckConfigurationStatus,
};

use crate::error::StoreError;

/// CRUD over tracked programs, keyed by program name.
pub trait ProgramRepository {
    // -------------------------------------------------------------------
    // Whole-program operations
    // -------------------------------------------------------------------

    /// Inserts `program`. False if the name is already taken.
    fn add_program(&mut self, program: &Program) -> Result<bool, StoreError>;

    fn get_program(&self, name: &str) -> Result<Option<Program>, StoreError>;

    /// Every stored program keyed by name, or `None` if the scan failed.
    fn get_all_programs(&self) -> Result<Option<HashMap<String, Program>>, StoreError>;

    /// Replaces every field of the row named `old_name`, including the name.
    ///
    /// False if no row matches or the new name collides with another row.
    fn update_program(&mut self, old_name: &str, program: &Program) -> Result<bool, StoreError>;

    fn remove_program(&mut self, name: &str) -> Result<bool, StoreError>;

    // -------------------------------------------------------------------
    // Single-field updates
    // -------------------------------------------------------------------

    fn set_skipped_version(&mut self, name: &str, version: &str) -> Result<bool, StoreError>;

    fn set_hidden(&mut self, name: &str, hidden: bool) -> Result<bool, StoreError>;

    fn hide_program(&mut self, name: &str) -> Result<bool, StoreError> {
        self.set_hidden(name, true)
    }

    fn unhide_program(&mut self, name: &str) -> Result<bool, StoreError> {
        self.set_hidden(name, false)
    }

    /// False both for visible programs and for unknown names.
    fn is_program_hidden(&self, name: &str) -> Result<bool, StoreError>;

    fn mark_non_new(&mut self, name: &str) -> Result<bool, StoreError>;

    fn set_update_check_status(
        &mut self,
        name: &str,
        status: UpdateCheckConfigurationStatus,
        error: UpdateCheckConfigurationError,
    ) -> Result<bool, StoreError>;

    /// Applies only to automatically added programs; the scan owns those
    /// fields for them.
    fn set_installed_version_and_scope(
        &mut self,
        name: &str,
        version: &str,
        scope: InstallationScope,
    ) -> Result<bool, StoreError>;

    fn set_latest_version(&mut self, name: &str, version: &str) -> Result<bool, StoreError>;

    // -------------------------------------------------------------------
    // Bulk updates
    // -------------------------------------------------------------------

    fn mark_all_non_new(&mut self) -> Result<bool, StoreError>;

    /// Clears the latest version and resets the check status of every
    /// program whose update check is configured.
    fn reset_latest_version_and_status_for_all_configured_programs(
        &mut self,
    ) -> Result<bool, StoreError>;

    /// Clears the automatically-added flag on every program.
    fn convert_all_to_manually_added(&mut self) -> Result<bool, StoreError>;
}
