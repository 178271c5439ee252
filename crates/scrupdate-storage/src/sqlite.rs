//! SQLite implementation of [`ProgramRepository`].
//!
//! [`ProgramDatabase`] owns one database file and its checksum sidecar. The
//! sidecar is verified before the engine ever reads the file, and refreshed
//! after every committed change:
//! - outside an explicit transaction, right after each successful write;
//! - inside one, once at commit. A rollback leaves the sidecar untouched.
//!
//! The database runs in rollback-journal (`DELETE`) mode with `FULL`
//! synchronous writes, so after each commit the main file alone holds the
//! committed state and its hash is meaningful.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Params};
use tracing::{debug, info, warn};

use scrupdate_core::{
    InstallationScope, Program, UpdateCheckConfigurationError, UpdateCheckConfigurationStatus,
};

use crate::checksum::ChecksumSidecar;
use crate::codec::{self, FlatRecord};
use crate::error::StoreError;
use crate::files::remove_if_present;
use crate::metadata;
use crate::migrate;
use crate::paths::{companion_paths_for, DataPaths};
use crate::schema::{columns, TableSchema, PROGRAMS};
use crate::traits::ProgramRepository;

/// How [`ProgramDatabase::open`] treats a missing or older file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// Create the database (and sidecar) when the file does not exist.
    pub create_if_missing: bool,
    /// Migrate in place when only the minor version differs.
    pub migrate_if_compatible: bool,
}

impl OpenOptions {
    /// Create if missing and migrate if compatible.
    pub fn permissive() -> Self {
        OpenOptions {
            create_if_missing: true,
            migrate_if_compatible: true,
        }
    }
}

struct OpenState {
    conn: Connection,
    sidecar: ChecksumSidecar,
    in_transaction: bool,
}

impl OpenState {
    fn refresh_unless_in_transaction(&mut self) {
        if self.in_transaction {
            return;
        }
        if let Err(e) = self.sidecar.refresh_from_data_file() {
            warn!(error = %e, "failed to refresh program database checksum");
        }
    }
}

/// The persistent store of tracked programs.
///
/// Closed until [`open`](Self::open) succeeds. While open, the sidecar stays
/// exclusively locked, so a second `ProgramDatabase` on the same files fails
/// to open with [`StoreError::Access`]. Dropping an open store closes it.
pub struct ProgramDatabase {
    path: PathBuf,
    checksum_path: PathBuf,
    schema: &'static TableSchema,
    state: Option<OpenState>,
}

impl ProgramDatabase {
    /// A closed store over the program database in `paths`.
    pub fn new(paths: &DataPaths) -> Self {
        ProgramDatabase::at(paths.program_database(), paths.program_database_checksum())
    }

    /// A closed store over explicit file locations.
    pub fn at(path: impl Into<PathBuf>, checksum_path: impl Into<PathBuf>) -> Self {
        ProgramDatabase::with_schema(path, checksum_path, PROGRAMS)
    }

    /// A closed store that creates, expects and migrates to `schema` instead
    /// of the current one.
    pub fn with_schema(
        path: impl Into<PathBuf>,
        checksum_path: impl Into<PathBuf>,
        schema: &'static TableSchema,
    ) -> Self {
        ProgramDatabase {
            path: path.into(),
            checksum_path: checksum_path.into(),
            schema,
            state: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn checksum_path(&self) -> &Path {
        &self.checksum_path
    }

    pub fn schema(&self) -> &'static TableSchema {
        self.schema
    }

    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Creates an empty database stamped with the active schema's version,
    /// plus its sidecar.
    ///
    /// All or nothing: on failure, files this call created are removed. The
    /// store stays closed either way.
    pub fn create(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            return Err(StoreError::AlreadyExists {
                path: self.path.clone(),
            });
        }
        let sidecar_existed = self.checksum_path.exists();

        let result = self.create_files();
        if result.is_err() {
            remove_if_present(&self.path);
            for companion in companion_paths_for(&self.path) {
                remove_if_present(&companion);
            }
            if !sidecar_existed {
                remove_if_present(&self.checksum_path);
            }
        }
        result
    }

    fn create_files(&self) -> Result<(), StoreError> {
        let mut sidecar = ChecksumSidecar::open(&self.path, &self.checksum_path, true)?;
        let conn = open_connection(&self.path, true)?;
        conn.execute_batch(&self.schema.create_table_sql())?;
        metadata::write_version(&conn, self.schema.version)?;
        conn.close().map_err(|(_, e)| e)?;
        sidecar.refresh_from_data_file()?;

        info!(
            path = %self.path.display(),
            version = %self.schema.version,
            "created program database"
        );
        Ok(())
    }

    /// Opens the store: verify the checksum, check the version, migrate if
    /// allowed. Opening an already open store is a no-op.
    ///
    /// On any failure every handle acquired so far is released and the store
    /// stays closed.
    pub fn open(&mut self, options: OpenOptions) -> Result<(), StoreError> {
        if self.state.is_some() {
            return Ok(());
        }
        if !self.path.exists() {
            if !options.create_if_missing {
                return Err(StoreError::NotFound {
                    path: self.path.clone(),
                });
            }
            self.create()?;
        }

        let mut sidecar = ChecksumSidecar::open(&self.path, &self.checksum_path, false)?;
        sidecar.verify_data_file()?;

        let mut conn = open_connection(&self.path, false)?;
        let found = metadata::read_version(&conn)?;
        let expected = self.schema.version;
        if !found.is_compatible_with(expected) {
            return Err(StoreError::Incompatible { found, expected });
        }
        if !found.is_identical_to(expected) {
            if !options.migrate_if_compatible {
                return Err(StoreError::MigrationRequired { found, expected });
            }
            migrate::migrate(&mut conn, self.schema)?;
            sidecar.refresh_from_data_file()?;
        }

        info!(path = %self.path.display(), version = %expected, "opened program database");
        self.state = Some(OpenState {
            conn,
            sidecar,
            in_transaction: false,
        });
        Ok(())
    }

    /// Commits any open transaction, refreshes the checksum, then releases
    /// the sidecar and the connection. Closing a closed store is a no-op.
    ///
    /// If the commit or the refresh fails the store stays open, unchanged.
    pub fn close(&mut self) -> Result<(), StoreError> {
        let Some(state) = self.state.as_mut() else {
            return Ok(());
        };
        if state.in_transaction {
            state.conn.execute_batch("COMMIT")?;
            state.in_transaction = false;
        }
        state.sidecar.refresh_from_data_file()?;

        if let Some(OpenState { conn, sidecar, .. }) = self.state.take() {
            drop(sidecar);
            if let Err((_, e)) = conn.close() {
                warn!(error = %e, "program database connection did not close cleanly");
            }
        }
        info!(path = %self.path.display(), "closed program database");
        Ok(())
    }

    /// Deletes the database, its sidecar and any journal files, closing the
    /// store first without committing.
    pub fn destroy(&mut self) -> Result<(), StoreError> {
        // Dropping the connection rolls back an open transaction.
        self.state = None;

        let mut paths = vec![self.path.clone(), self.checksum_path.clone()];
        paths.extend(companion_paths_for(&self.path));
        for path in paths {
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::access(path, e)),
            }
        }
        info!(path = %self.path.display(), "destroyed program database");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    /// Starts an explicit transaction; writes until
    /// [`end_transaction`](Self::end_transaction) skip the checksum refresh.
    pub fn begin_transaction(&mut self) -> Result<(), StoreError> {
        let state = self.state_mut()?;
        if state.in_transaction {
            return Err(StoreError::TransactionInProgress);
        }
        state.conn.execute_batch("BEGIN")?;
        state.in_transaction = true;
        Ok(())
    }

    /// Commits (refreshing the checksum) or rolls back (leaving it alone).
    ///
    /// A failed commit leaves the transaction in progress.
    pub fn end_transaction(&mut self, rollback: bool) -> Result<(), StoreError> {
        let state = self.state_mut()?;
        if !state.in_transaction {
            return Err(StoreError::NoTransaction);
        }
        if rollback {
            state.conn.execute_batch("ROLLBACK")?;
            state.in_transaction = false;
            debug!("rolled back program database transaction");
        } else {
            state.conn.execute_batch("COMMIT")?;
            state.in_transaction = false;
            state.sidecar.refresh_from_data_file()?;
            debug!("committed program database transaction");
        }
        Ok(())
    }

    pub fn is_transaction_in_progress(&self) -> Result<bool, StoreError> {
        Ok(self.state()?.in_transaction)
    }

    // -----------------------------------------------------------------------
    // Typed writes
    // -----------------------------------------------------------------------

    /// Inserts `program`, reporting why it failed.
    ///
    /// [`ProgramRepository::add_program`] collapses these errors to `false`.
    pub fn insert_program(&mut self, program: &Program) -> Result<(), StoreError> {
        let schema = self.schema;
        let state = self.state_mut()?;
        let values = codec::encode(program)?.bind_values(schema);

        let result = state
            .conn
            .prepare_cached(&schema.insert_sql())
            .and_then(|mut stmt| stmt.execute(params_from_iter(values.iter())));
        match result {
            Ok(_) => {
                state.refresh_unless_in_transaction();
                Ok(())
            }
            Err(e) if is_constraint_violation(&e) => Err(StoreError::ConstraintViolation {
                name: program.name.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn state(&self) -> Result<&OpenState, StoreError> {
        self.state.as_ref().ok_or(StoreError::NotOpen)
    }

    fn state_mut(&mut self) -> Result<&mut OpenState, StoreError> {
        self.state.as_mut().ok_or(StoreError::NotOpen)
    }

    /// Runs one mutating statement; true iff it touched at least one row.
    fn write<P: Params>(
        &mut self,
        operation: &'static str,
        sql: &str,
        params: P,
    ) -> Result<bool, StoreError> {
        let state = self.state_mut()?;
        let result = state
            .conn
            .prepare_cached(sql)
            .and_then(|mut stmt| stmt.execute(params));
        match result {
            Ok(0) => Ok(false),
            Ok(_) => {
                state.refresh_unless_in_transaction();
                Ok(true)
            }
            Err(e) => {
                warn!(operation, error = %e, "program database write failed");
                Ok(false)
            }
        }
    }
}

impl Drop for ProgramDatabase {
    fn drop(&mut self) {
        if self.state.is_none() {
            return;
        }
        if let Err(e) = self.close() {
            warn!(error = %e, "closing program database on drop failed");
            self.state = None;
        }
    }
}

impl ProgramRepository for ProgramDatabase {
    // -------------------------------------------------------------------
    // Whole-program operations
    // -------------------------------------------------------------------

    fn add_program(&mut self, program: &Program) -> Result<bool, StoreError> {
        match self.insert_program(program) {
            Ok(()) => Ok(true),
            Err(StoreError::NotOpen) => Err(StoreError::NotOpen),
            Err(e) => {
                warn!(name = %program.name, error = %e, "failed to add program");
                Ok(false)
            }
        }
    }

    fn get_program(&self, name: &str) -> Result<Option<Program>, StoreError> {
        let state = self.state()?;
        let sql = format!("{} WHERE {} = ?1", self.schema.select_sql(), columns::NAME);
        let record = match select_records(&state.conn, self.schema, &sql, params![name]) {
            Ok(mut records) => records.pop(),
            Err(e) => {
                warn!(name, error = %e, "failed to read program");
                return Ok(None);
            }
        };
        Ok(record.and_then(|record| match codec::decode(&record) {
            Ok(program) => Some(program),
            Err(e) => {
                warn!(name, error = %e, "stored program does not decode");
                None
            }
        }))
    }

    fn get_all_programs(&self) -> Result<Option<HashMap<String, Program>>, StoreError> {
        let state = self.state()?;
        let records = match select_records(&state.conn, self.schema, &self.schema.select_sql(), [])
        {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "failed to read programs");
                return Ok(None);
            }
        };

        let mut programs = HashMap::with_capacity(records.len());
        for record in &records {
            match codec::decode(record) {
                Ok(program) => {
                    programs.insert(program.name.clone(), program);
                }
                Err(e) => {
                    warn!(error = %e, "stored program does not decode");
                    return Ok(None);
                }
            }
        }
        Ok(Some(programs))
    }

    fn update_program(&mut self, old_name: &str, program: &Program) -> Result<bool, StoreError> {
        self.state()?;
        let schema = self.schema;
        let mut values = match codec::encode(program) {
            Ok(record) => record.bind_values(schema),
            Err(e) => {
                warn!(name = %program.name, error = %e, "failed to encode program");
                return Ok(false);
            }
        };
        values.push(Value::Text(old_name.to_string()));
        self.write(
            "update_program",
            &schema.update_by_name_sql(),
            params_from_iter(values.iter()),
        )
    }

    fn remove_program(&mut self, name: &str) -> Result<bool, StoreError> {
        self.write(
            "remove_program",
            "DELETE FROM programs WHERE name = ?1",
            params![name],
        )
    }

    // -------------------------------------------------------------------
    // Single-field updates
    // -------------------------------------------------------------------

    fn set_skipped_version(&mut self, name: &str, version: &str) -> Result<bool, StoreError> {
        self.write(
            "set_skipped_version",
            "UPDATE programs SET skipped_version = ?1 WHERE name = ?2",
            params![version, name],
        )
    }

    fn set_hidden(&mut self, name: &str, hidden: bool) -> Result<bool, StoreError> {
        self.write(
            "set_hidden",
            "UPDATE programs SET is_hidden = ?1 WHERE name = ?2",
            params![hidden, name],
        )
    }

    fn is_program_hidden(&self, name: &str) -> Result<bool, StoreError> {
        let state = self.state()?;
        let result = state
            .conn
            .prepare_cached("SELECT is_hidden FROM programs WHERE name = ?1")
            .and_then(|mut stmt| {
                stmt.query_row(params![name], |row| row.get::<_, bool>(0))
                    .optional()
            });
        match result {
            Ok(hidden) => Ok(hidden.unwrap_or(false)),
            Err(e) => {
                warn!(name, error = %e, "failed to read hidden flag");
                Ok(false)
            }
        }
    }

    fn mark_non_new(&mut self, name: &str) -> Result<bool, StoreError> {
        self.write(
            "mark_non_new",
            "UPDATE programs SET is_new = 0 WHERE name = ?1",
            params![name],
        )
    }

    fn set_update_check_status(
        &mut self,
        name: &str,
        status: UpdateCheckConfigurationStatus,
        error: UpdateCheckConfigurationError,
    ) -> Result<bool, StoreError> {
        self.write(
            "set_update_check_status",
            "UPDATE programs SET update_check_configuration_status = ?1, \
             update_check_configuration_error = ?2 WHERE name = ?3",
            params![status.code(), error.code(), name],
        )
    }

    fn set_installed_version_and_scope(
        &mut self,
        name: &str,
        version: &str,
        scope: InstallationScope,
    ) -> Result<bool, StoreError> {
        self.write(
            "set_installed_version_and_scope",
            "UPDATE programs SET installed_version = ?1, installation_scope = ?2 \
             WHERE name = ?3 AND is_automatically_added = 1",
            params![version, scope.code(), name],
        )
    }

    fn set_latest_version(&mut self, name: &str, version: &str) -> Result<bool, StoreError> {
        self.write(
            "set_latest_version",
            "UPDATE programs SET latest_version = ?1 WHERE name = ?2",
            params![version, name],
        )
    }

    // -------------------------------------------------------------------
    // Bulk updates
    // -------------------------------------------------------------------

    fn mark_all_non_new(&mut self) -> Result<bool, StoreError> {
        self.write("mark_all_non_new", "UPDATE programs SET is_new = 0", [])
    }

    fn reset_latest_version_and_status_for_all_configured_programs(
        &mut self,
    ) -> Result<bool, StoreError> {
        self.write(
            "reset_latest_version_and_status_for_all_configured_programs",
            "UPDATE programs SET latest_version = '', \
             update_check_configuration_status = ?1, \
             update_check_configuration_error = ?2 \
             WHERE is_update_check_configured = 1",
            params![
                UpdateCheckConfigurationStatus::Unknown.code(),
                UpdateCheckConfigurationError::None.code()
            ],
        )
    }

    fn convert_all_to_manually_added(&mut self) -> Result<bool, StoreError> {
        self.write(
            "convert_all_to_manually_added",
            "UPDATE programs SET is_automatically_added = 0",
            [],
        )
    }
}

fn open_connection(path: &Path, create: bool) -> Result<Connection, StoreError> {
    let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    if create {
        flags |= OpenFlags::SQLITE_OPEN_CREATE;
    }
    let conn = Connection::open_with_flags(path, flags)?;
    // The sidecar hashes the main file only, so committed pages must land
    // there rather than in a write-ahead log.
    conn.pragma_update_and_check(None, "journal_mode", "DELETE", |row| {
        row.get::<_, String>(0)
    })?;
    conn.pragma_update(None, "synchronous", "FULL")?;
    Ok(conn)
}

fn select_records(
    conn: &Connection,
    schema: &TableSchema,
    sql: &str,
    params: impl Params,
) -> rusqlite::Result<Vec<FlatRecord>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let records = stmt
        .query_map(params, |row| FlatRecord::from_row(row, schema))?
        .collect::<rusqlite::Result<Vec<_>>>();
    records
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &Path) -> ProgramDatabase {
        ProgramDatabase::new(&DataPaths::new(dir))
    }

    #[test]
    fn closed_store_rejects_use() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut db = store_in(temp_dir.path());

        assert!(!db.is_open());
        assert!(matches!(db.get_program("x"), Err(StoreError::NotOpen)));
        assert!(matches!(
            db.add_program(&Program::named("x")),
            Err(StoreError::NotOpen)
        ));
        assert!(matches!(db.begin_transaction(), Err(StoreError::NotOpen)));
        assert!(matches!(
            db.is_transaction_in_progress(),
            Err(StoreError::NotOpen)
        ));
        db.close().unwrap();
    }

    #[test]
    fn open_without_create_reports_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut db = store_in(temp_dir.path());
        assert!(matches!(
            db.open(OpenOptions::default()),
            Err(StoreError::NotFound { .. })
        ));
        assert!(!db.is_open());
    }

    #[test]
    fn create_refuses_existing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db = store_in(temp_dir.path());
        db.create().unwrap();
        assert!(matches!(db.create(), Err(StoreError::AlreadyExists { .. })));
    }

    #[test]
    fn transaction_state_machine() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut db = store_in(temp_dir.path());
        db.open(OpenOptions::permissive()).unwrap();

        assert!(matches!(
            db.end_transaction(false),
            Err(StoreError::NoTransaction)
        ));
        db.begin_transaction().unwrap();
        assert!(db.is_transaction_in_progress().unwrap());
        assert!(matches!(
            db.begin_transaction(),
            Err(StoreError::TransactionInProgress)
        ));
        db.end_transaction(true).unwrap();
        assert!(!db.is_transaction_in_progress().unwrap());
    }

    #[test]
    fn duplicate_insert_is_a_constraint_violation() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut db = store_in(temp_dir.path());
        db.open(OpenOptions::permissive()).unwrap();

        db.insert_program(&Program::named("Firefox")).unwrap();
        let err = db.insert_program(&Program::named("Firefox")).unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation { name } if name == "Firefox"));
        assert!(!db.add_program(&Program::named("Firefox")).unwrap());
    }

    #[test]
    fn close_commits_pending_transaction() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut db = store_in(temp_dir.path());
        db.open(OpenOptions::permissive()).unwrap();

        db.begin_transaction().unwrap();
        assert!(db.add_program(&Program::named("VLC")).unwrap());
        db.close().unwrap();
        assert!(!db.is_open());

        db.open(OpenOptions::default()).unwrap();
        assert!(db.get_program("VLC").unwrap().is_some());
    }

    #[test]
    fn destroy_removes_every_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(temp_dir.path());
        let mut db = ProgramDatabase::new(&paths);
        db.open(OpenOptions::permissive()).unwrap();

        db.destroy().unwrap();
        assert!(!db.is_open());
        assert!(!paths.program_database().exists());
        assert!(!paths.program_database_checksum().exists());
    }
}
