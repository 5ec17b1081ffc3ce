use std::path::{Path, PathBuf};
use std::time::Duration;

pub const LOG_FILE: &str = "debrepo.log";
pub const ROTATION_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Process-local log sink inside `log_dir`.
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(LOG_FILE)
}
