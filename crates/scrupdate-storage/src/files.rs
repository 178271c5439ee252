//! File handling shared by the stores: single-instance locking and
//! best-effort cleanup.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::Path;

use tracing::warn;

use crate::error::StoreError;

#[cfg(windows)]
const FILE_SHARE_READ: u32 = 0x1;

/// Restricts other handles on the file to reading.
///
/// On Windows this is the share mode and is what refuses a second writer.
/// Elsewhere it is a no-op and [`lock_exclusive`] does that job.
pub(crate) fn share_read_only(options: &mut OpenOptions) -> &mut OpenOptions {
    #[cfg(windows)]
    {
        use std::os::windows::fs::OpenOptionsExt;
        options.share_mode(FILE_SHARE_READ);
    }
    options
}

/// Takes the single-instance lock on `file`.
///
/// Unix only. A Windows `LockFileEx` lock is mandatory and would also block
/// readers, so there the share mode from [`share_read_only`] stands in.
#[cfg(not(windows))]
pub(crate) fn lock_exclusive(file: &File, path: &Path) -> Result<(), StoreError> {
    use fs4::FileExt;
    file.try_lock_exclusive()
        .map_err(|e| StoreError::access(path, e))
}

#[cfg(windows)]
pub(crate) fn lock_exclusive(_file: &File, _path: &Path) -> Result<(), StoreError> {
    Ok(())
}

/// Removes `path`, logging anything other than "not found".
pub(crate) fn remove_if_present(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove file");
        }
    }
}
