//! Atomic file replacement.
//!
//! Every generated artifact is written to `<path>.debrepo.tmp` and renamed
//! over the final path, so readers only ever see the previous version or the
//! complete new one. A failed write or rename removes the temp file and
//! leaves the original untouched.

use std::path::Path;

use debrepo_core::layout::tmp_path_for;

use crate::error::{io_err, SyncError};

/// Atomically replace `path` with `content`, creating parent directories.
pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> Result<(), SyncError> {
    let tmp = tmp_path_for(path);
    write_atomic_with_tmp(path, content, &tmp)
}

fn write_atomic_with_tmp(path: &Path, content: &[u8], tmp: &Path) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    if let Err(e) = std::fs::write(tmp, content) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(tmp, e));
    }
    commit_tmp(tmp, path)
}

/// Rename a fully written temp file over `path`, cleaning up on failure.
pub(crate) fn commit_tmp(tmp: &Path, path: &Path) -> Result<(), SyncError> {
    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

/// Remove `path` if present; a missing file is not an error.
pub(crate) fn remove_if_exists(path: &Path) -> Result<bool, SyncError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(io_err(path, e)),
    }
}
