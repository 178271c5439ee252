//! Detached checksum files guarding a data file against tampering.
//!
//! A [`ChecksumSidecar`] owns an exclusive handle on a small hidden file
//! holding the BLAKE3 hex digest of its data file. Other processes may read
//! the sidecar but a second [`ChecksumSidecar`] on it fails with
//! [`StoreError::Access`], which makes it the single-instance guard. Unix
//! gets this from an advisory lock, Windows from the share mode.
//!
//! Verification fails closed. A missing, empty, unreadable or mismatching
//! sidecar is reported as [`StoreError::Corrupted`], never as a plain `false`.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::StoreError;
use crate::files;

#[cfg(windows)]
const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;

/// Hex-encoded BLAKE3 digest of `content`.
pub fn content_hash(content: &[u8]) -> String {
    blake3::hash(content).to_hex().to_string()
}

/// An open, locked checksum sidecar for one data file.
#[derive(Debug)]
pub struct ChecksumSidecar {
    data_path: PathBuf,
    path: PathBuf,
    file: File,
}

impl ChecksumSidecar {
    /// Opens the sidecar at `path` for the data file at `data_path`.
    ///
    /// With `create_if_missing`, missing parent directories and the sidecar
    /// itself are created; a new sidecar starts empty and therefore fails
    /// verification until [`refresh`](Self::refresh) runs. Without it, a
    /// missing sidecar is [`StoreError::Corrupted`].
    pub fn open(data_path: &Path, path: &Path, create_if_missing: bool) -> Result<Self, StoreError> {
        if create_if_missing {
            if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                fs::create_dir_all(dir).map_err(|e| StoreError::access(dir, e))?;
            }
        }

        let mut options = OpenOptions::new();
        options.read(true).write(true).create(create_if_missing);
        files::share_read_only(&mut options);
        #[cfg(windows)]
        {
            use std::os::windows::fs::OpenOptionsExt;
            options.attributes(FILE_ATTRIBUTE_HIDDEN);
        }

        let file = match options.open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound && !create_if_missing => {
                return Err(StoreError::Corrupted {
                    reason: format!("checksum file {} is missing", path.display()),
                });
            }
            Err(e) => return Err(StoreError::access(path, e)),
        };

        files::lock_exclusive(&file, path)?;

        debug!(sidecar = %path.display(), "opened checksum sidecar");
        Ok(ChecksumSidecar {
            data_path: data_path.to_path_buf(),
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Checks `content` against the stored digest (ASCII case-insensitive).
    pub fn verify(&mut self, content: &[u8]) -> Result<(), StoreError> {
        let stored = self.read_stored()?;
        let stored = stored.trim();
        if stored.is_empty() {
            return Err(StoreError::Corrupted {
                reason: format!("checksum file {} is empty", self.path.display()),
            });
        }
        if !stored.eq_ignore_ascii_case(&content_hash(content)) {
            return Err(StoreError::Corrupted {
                reason: format!("checksum mismatch for {}", self.data_path.display()),
            });
        }
        Ok(())
    }

    /// Verifies the data file's current on-disk bytes.
    pub fn verify_data_file(&mut self) -> Result<(), StoreError> {
        let content = self.read_data_file()?;
        self.verify(&content)
    }

    /// Replaces the stored digest with the digest of `content`.
    ///
    /// The sidecar is truncated, rewritten and synced before returning. A
    /// crash in between leaves it empty or partial, which the next
    /// verification reports as corrupted.
    pub fn refresh(&mut self, content: &[u8]) -> Result<(), StoreError> {
        let digest = content_hash(content);
        self.write_stored(digest.as_bytes())
            .map_err(|e| StoreError::access(&self.path, e))
    }

    /// Recomputes the digest from the data file's current on-disk bytes.
    pub fn refresh_from_data_file(&mut self) -> Result<(), StoreError> {
        let content = self.read_data_file()?;
        self.refresh(&content)?;
        debug!(data = %self.data_path.display(), "refreshed checksum");
        Ok(())
    }

    fn read_data_file(&self) -> Result<Vec<u8>, StoreError> {
        fs::read(&self.data_path).map_err(|e| StoreError::access(&self.data_path, e))
    }

    fn read_stored(&mut self) -> Result<String, StoreError> {
        let mut buf = Vec::new();
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read_to_end(&mut buf))
            .map_err(|e| StoreError::access(&self.path, e))?;
        String::from_utf8(buf).map_err(|_| StoreError::Corrupted {
            reason: format!("checksum file {} is not text", self.path.display()),
        })
    }

    fn write_stored(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(bytes)?;
        self.file.flush()?;
        self.file.sync_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sidecar_in(dir: &Path) -> (PathBuf, PathBuf) {
        (dir.join("data.bin"), dir.join("data.bin.blake3"))
    }

    #[test]
    fn fresh_sidecar_fails_verification_until_refreshed() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (data, side) = sidecar_in(temp_dir.path());

        let mut sidecar = ChecksumSidecar::open(&data, &side, true).unwrap();
        assert!(matches!(
            sidecar.verify(b"hello"),
            Err(StoreError::Corrupted { .. })
        ));

        sidecar.refresh(b"hello").unwrap();
        sidecar.verify(b"hello").unwrap();
        assert!(matches!(
            sidecar.verify(b"hellO"),
            Err(StoreError::Corrupted { .. })
        ));
    }

    #[test]
    fn creates_missing_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        let (data, side) = sidecar_in(&nested);

        ChecksumSidecar::open(&data, &side, true).unwrap();
        assert!(side.exists());
    }

    #[test]
    fn missing_sidecar_without_create_is_corrupted() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (data, side) = sidecar_in(temp_dir.path());

        let err = ChecksumSidecar::open(&data, &side, false).unwrap_err();
        assert!(matches!(err, StoreError::Corrupted { .. }));
        assert!(!side.exists());
    }

    #[test]
    fn comparison_ignores_case_and_whitespace() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (data, side) = sidecar_in(temp_dir.path());
        fs::write(&side, format!("{}\r\n", content_hash(b"abc").to_uppercase())).unwrap();

        let mut sidecar = ChecksumSidecar::open(&data, &side, false).unwrap();
        sidecar.verify(b"abc").unwrap();
    }

    #[test]
    fn refresh_truncates_previous_digest() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (data, side) = sidecar_in(temp_dir.path());
        fs::write(&side, "x".repeat(200)).unwrap();

        let mut sidecar = ChecksumSidecar::open(&data, &side, false).unwrap();
        sidecar.refresh(b"abc").unwrap();
        drop(sidecar);

        assert_eq!(fs::read_to_string(&side).unwrap(), content_hash(b"abc"));
    }

    #[test]
    fn data_file_round_trip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (data, side) = sidecar_in(temp_dir.path());
        fs::write(&data, b"payload").unwrap();

        let mut sidecar = ChecksumSidecar::open(&data, &side, true).unwrap();
        sidecar.refresh_from_data_file().unwrap();
        sidecar.verify_data_file().unwrap();

        fs::write(&data, b"payloaD").unwrap();
        assert!(matches!(
            sidecar.verify_data_file(),
            Err(StoreError::Corrupted { .. })
        ));
    }

    #[test]
    fn second_handle_is_refused() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (data, side) = sidecar_in(temp_dir.path());

        let _first = ChecksumSidecar::open(&data, &side, true).unwrap();
        let err = ChecksumSidecar::open(&data, &side, false).unwrap_err();
        assert!(matches!(err, StoreError::Access { .. }));
    }

    #[test]
    fn open_sidecar_stays_readable() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (data, side) = sidecar_in(temp_dir.path());

        let mut sidecar = ChecksumSidecar::open(&data, &side, true).unwrap();
        sidecar.refresh(b"abc").unwrap();
        assert_eq!(fs::read_to_string(&side).unwrap(), content_hash(b"abc"));
    }
}
