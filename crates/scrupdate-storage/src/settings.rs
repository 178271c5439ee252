//! JSON settings file guarded by a checksum sidecar.
//!
//! The file is a single JSON object: the [`Settings`] sections plus a packed
//! `version` field. Loading checks, in order, the checksum, the version's
//! major component, then decodes. Minor differences need no migration step
//! because every settings section fills missing fields with defaults and
//! ignores unknown ones.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use scrupdate_core::{Settings, VersionTag};

use crate::checksum::ChecksumSidecar;
use crate::error::StoreError;
use crate::files::{self, remove_if_present};
use crate::paths::DataPaths;

/// Format version written by this build.
pub const SETTINGS_VERSION: VersionTag = VersionTag::new(1, 0);

#[derive(Serialize)]
struct SettingsDocument<'a> {
    version: VersionTag,
    #[serde(flatten)]
    settings: &'a Settings,
}

/// Reads only the version, so an incompatible file is rejected before its
/// body is interpreted.
#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

/// An open, locked settings file.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    file: File,
    sidecar: ChecksumSidecar,
}

impl SettingsStore {
    /// Opens the settings file in `paths`.
    pub fn open_in(paths: &DataPaths) -> Result<Self, StoreError> {
        SettingsStore::open(&paths.settings(), &paths.settings_checksum())
    }

    /// Opens and locks the settings file and its sidecar.
    ///
    /// A missing settings file is created with default settings. A sidecar
    /// missing next to an existing settings file is created empty, so the
    /// next [`load`](Self::load) reports corruption.
    pub fn open(path: &Path, checksum_path: &Path) -> Result<Self, StoreError> {
        let created = !path.exists();
        let sidecar_existed = checksum_path.exists();

        let result = SettingsStore::open_files(path, checksum_path, created);
        if result.is_err() {
            if created {
                remove_if_present(path);
            }
            if !sidecar_existed {
                remove_if_present(checksum_path);
            }
        }
        result
    }

    fn open_files(path: &Path, checksum_path: &Path, created: bool) -> Result<Self, StoreError> {
        let sidecar = ChecksumSidecar::open(path, checksum_path, true)?;
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| StoreError::access(dir, e))?;
        }

        let file = files::share_read_only(
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false),
        )
        .open(path)
        .map_err(|e| StoreError::access(path, e))?;
        files::lock_exclusive(&file, path)?;

        let mut store = SettingsStore {
            path: path.to_path_buf(),
            file,
            sidecar,
        };
        if created {
            store.save(&Settings::default())?;
            info!(path = %path.display(), "created default settings");
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads, verifies and decodes the settings.
    pub fn load(&mut self) -> Result<Settings, StoreError> {
        let bytes = self.read_file()?;
        self.sidecar.verify(&bytes)?;

        let probe: VersionProbe = serde_json::from_slice(&bytes)?;
        let found = VersionTag::unpack(probe.version).map_err(|_| StoreError::Corrupted {
            reason: format!("settings version {} is out of range", probe.version),
        })?;
        if !found.is_compatible_with(SETTINGS_VERSION) {
            return Err(StoreError::Incompatible {
                found,
                expected: SETTINGS_VERSION,
            });
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Writes `settings` stamped with [`SETTINGS_VERSION`], then refreshes
    /// the checksum.
    pub fn save(&mut self, settings: &Settings) -> Result<(), StoreError> {
        let document = SettingsDocument {
            version: SETTINGS_VERSION,
            settings,
        };
        let bytes = serde_json::to_vec_pretty(&document)?;
        self.write_file(&bytes)
            .map_err(|e| StoreError::access(&self.path, e))?;
        self.sidecar.refresh(&bytes)
    }

    /// Overwrites the file with default settings and returns them.
    pub fn reset_to_defaults(&mut self) -> Result<Settings, StoreError> {
        let settings = Settings::default();
        self.save(&settings)?;
        info!(path = %self.path.display(), "reset settings to defaults");
        Ok(settings)
    }

    /// Loads the settings, falling back to defaults when the file is
    /// corrupted or incompatible.
    ///
    /// The error that forced the reset is returned alongside so the caller
    /// can tell the user.
    pub fn load_or_reset(&mut self) -> Result<(Settings, Option<StoreError>), StoreError> {
        match self.load() {
            Ok(settings) => Ok((settings, None)),
            Err(e) if e.is_resettable() => {
                warn!(path = %self.path.display(), error = %e, "settings unusable");
                Ok((self.reset_to_defaults()?, Some(e)))
            }
            Err(e) => Err(e),
        }
    }

    fn read_file(&mut self) -> Result<Vec<u8>, StoreError> {
        let mut buf = Vec::new();
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read_to_end(&mut buf))
            .map_err(|e| StoreError::access(&self.path, e))?;
        Ok(buf)
    }

    fn write_file(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(bytes)?;
        self.file.flush()?;
        self.file.sync_all()
    }
}
