//! On-disk layout of the Scrupdate data directory.
//!
//! Reads configuration from environment variables:
//! - `SCRUPDATE_DATA_DIR`: data directory (default: "Data")

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "SCRUPDATE_DATA_DIR";

const DEFAULT_DATA_DIR: &str = "Data";
const PROGRAM_DATABASE_FILE_NAME: &str = "Programs.sqlite";
const SETTINGS_FILE_NAME: &str = "Settings.json";

/// Extension appended to a data file's name to form its sidecar's name.
pub const CHECKSUM_FILE_EXTENSION: &str = "blake3";

/// Companion files SQLite may leave next to a database.
const SQLITE_COMPANION_SUFFIXES: [&str; 3] = ["-journal", "-wal", "-shm"];

/// Paths of every file the stores own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    data_dir: PathBuf,
}

impl DataPaths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        DataPaths {
            data_dir: data_dir.into(),
        }
    }

    /// Resolves the data directory from `SCRUPDATE_DATA_DIR`.
    pub fn from_env() -> Self {
        let dir = std::env::var_os(DATA_DIR_ENV)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| OsString::from(DEFAULT_DATA_DIR));
        DataPaths::new(dir)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn program_database(&self) -> PathBuf {
        self.data_dir.join(PROGRAM_DATABASE_FILE_NAME)
    }

    pub fn program_database_checksum(&self) -> PathBuf {
        checksum_path_for(&self.program_database())
    }

    /// Journal files SQLite may create beside the program database.
    pub fn program_database_companions(&self) -> Vec<PathBuf> {
        companion_paths_for(&self.program_database())
    }

    pub fn settings(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE_NAME)
    }

    pub fn settings_checksum(&self) -> PathBuf {
        checksum_path_for(&self.settings())
    }
}

/// `Programs.sqlite` -> `Programs.sqlite.blake3`.
pub fn checksum_path_for(data_file: &Path) -> PathBuf {
    append_to_file_name(data_file, &format!(".{CHECKSUM_FILE_EXTENSION}"))
}

pub(crate) fn companion_paths_for(database: &Path) -> Vec<PathBuf> {
    SQLITE_COMPANION_SUFFIXES
        .iter()
        .map(|suffix| append_to_file_name(database, suffix))
        .collect()
}

fn append_to_file_name(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
