//! Integrity-verified, schema-versioned persistence for Scrupdate.
//!
//! Both stores in this crate follow the same pattern: a single data file
//! guarded by a detached checksum sidecar, with an embedded
//! [`VersionTag`](scrupdate_core::VersionTag) that gates either rejection
//! (major mismatch) or in-place migration (minor mismatch).
//!
//! # Modules
//!
//! - [`error`]: StoreError enum with all failure modes
//! - [`paths`]: data directory and file layout
//! - `files`: single-instance locking and cleanup helpers
//! - [`checksum`]: ChecksumSidecar, the hidden hash file next to a data file
//! - [`schema`]: declared column lists and their version history
//! - [`codec`]: Program <-> flat column record conversion
//! - [`metadata`]: format version kept in SQLite's `user_version` slot
//! - [`migrate`]: add-only / drop-only column reconciliation
//! - [`sqlite`]: ProgramDatabase, the transactional program store
//! - [`traits`]: ProgramRepository trait defining the CRUD contract
//! - [`settings`]: SettingsStore, the JSON settings file

pub mod checksum;
pub mod codec;
pub mod error;
mod files;
pub mod metadata;
pub mod migrate;
pub mod paths;
pub mod schema;
pub mod settings;
pub mod sqlite;
pub mod traits;

// Re-export key types for ergonomic use.
pub use checksum::ChecksumSidecar;
pub use error::StoreError;
pub use paths::DataPaths;
pub use schema::TableSchema;
pub use settings::SettingsStore;
pub use sqlite::{OpenOptions, ProgramDatabase};
pub use traits::ProgramRepository;
