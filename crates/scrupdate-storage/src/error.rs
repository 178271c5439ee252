//! Storage error types for scrupdate-storage.
//!
//! [`StoreError`] separates failures a caller can recover from by resetting
//! the store to defaults (corruption, incompatible version) from failures
//! that should be surfaced as-is (filesystem access), and from programmer
//! errors (using a closed store, unbalanced transactions).

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use scrupdate_core::{CoreError, VersionTag};

/// Errors produced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The data file does not exist and creation was not requested.
    #[error("data file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// `create` was called for a data file that already exists.
    #[error("data file already exists: {}", path.display())]
    AlreadyExists { path: PathBuf },

    /// The checksum sidecar is missing, empty, or does not match the data file.
    #[error("data file is corrupted: {reason}")]
    Corrupted { reason: String },

    /// The data file was written with a different major version.
    #[error("incompatible data version {found} (expected {expected})")]
    Incompatible {
        found: VersionTag,
        expected: VersionTag,
    },

    /// The minor version differs and migration was not permitted.
    #[error("data version {found} needs migration to {expected}")]
    MigrationRequired {
        found: VersionTag,
        expected: VersionTag,
    },

    /// The schema difference is not a pure add or a pure drop, or a
    /// migration statement failed.
    #[error("migration failed: {reason}")]
    MigrationFailed { reason: String },

    /// A directory or file could not be created, opened, locked or written.
    #[error("cannot access {}: {source}", path.display())]
    Access {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A row with the same unique name already exists.
    #[error("a program named '{name}' already exists")]
    ConstraintViolation { name: String },

    /// The store was used while closed.
    #[error("store is not open")]
    NotOpen,

    /// `begin_transaction` was called while a transaction is open.
    #[error("a transaction is already in progress")]
    TransactionInProgress,

    /// `end_transaction` was called without an open transaction.
    #[error("no transaction is in progress")]
    NoTransaction,

    /// SQLite reported an error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A persisted value does not decode into a domain type.
    #[error("invalid stored value: {0}")]
    InvalidValue(#[from] CoreError),
}

impl StoreError {
    /// Builds an [`StoreError::Access`] for `path`.
    pub fn access(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Access {
            path: path.into(),
            source,
        }
    }

    /// True when discarding the data file and starting from defaults is the
    /// expected recovery.
    pub fn is_resettable(&self) -> bool {
        matches!(
            self,
            StoreError::Corrupted { .. }
                | StoreError::Incompatible { .. }
                | StoreError::MigrationFailed { .. }
        )
    }
}
