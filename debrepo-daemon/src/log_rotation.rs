//! Size-based rotation of the process log file.
//!
//! `debrepo.log` is shifted to `debrepo.log.1` once it passes 10 MiB; older
//! copies move up by one and anything beyond `.5` is dropped.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;
pub const MAX_ROTATED_FILES: usize = 5;

/// Rotate `log_path` when it is at least `max_bytes` long.
///
/// Returns whether a rotation happened. A missing log is not an error.
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, keep: usize) -> io::Result<bool> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if size < max_bytes || keep == 0 {
        return Ok(false);
    }

    match fs::remove_file(backup_path(log_path, keep)) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    for n in (1..keep).rev() {
        let from = backup_path(log_path, n);
        if from.exists() {
            fs::rename(&from, backup_path(log_path, n + 1))?;
        }
    }
    fs::rename(log_path, backup_path(log_path, 1))?;
    fs::File::create(log_path)?;
    Ok(true)
}

/// Rotate `<log_dir>/debrepo.log`; failures are logged, never propagated.
pub fn rotate_logs(log_dir: &Path) {
    let log_path = crate::paths::log_file_path(log_dir);
    match rotate_if_needed(&log_path, MAX_LOG_BYTES, MAX_ROTATED_FILES) {
        Ok(true) => tracing::info!(path = %log_path.display(), "log file rotated"),
        Ok(false) => {}
        Err(err) => tracing::warn!(path = %log_path.display(), error = %err, "log rotation failed"),
    }
}

fn backup_path(base: &Path, n: usize) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn small_log_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("debrepo.log");
        fs::write(&log, "short").unwrap();
        assert!(!rotate_if_needed(&log, 1024, 3).unwrap());
        assert!(!backup_path(&log, 1).exists());
    }

    #[test]
    fn missing_log_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(!rotate_if_needed(&dir.path().join("absent.log"), 1, 3).unwrap());
    }

    #[test]
    fn backups_shift_and_are_capped() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("debrepo.log");

        for round in 1..=4 {
            fs::write(&log, format!("round-{round}")).unwrap();
            assert!(rotate_if_needed(&log, 4, 3).unwrap());
        }

        assert_eq!(fs::metadata(&log).unwrap().len(), 0, "live log starts empty");
        assert_eq!(fs::read_to_string(backup_path(&log, 1)).unwrap(), "round-4");
        assert_eq!(fs::read_to_string(backup_path(&log, 3)).unwrap(), "round-2");
        assert!(!backup_path(&log, 4).exists(), "only three backups are kept");
    }
}
