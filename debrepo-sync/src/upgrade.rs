//! Self-upgrade detection from the dpkg log.
//!
//! dpkg appends one line per action:
//!
//! ```text
//! 2026-10-19 07:58:12 upgrade debrepo:all 0.1.0 0.2.0
//! ```
//!
//! If the tool's own package shows an `upgrade` dated today, the running
//! service is an old binary and gets restarted after a successful sync.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::{io_err, SyncError};

/// Most recent date on which `package` was upgraded according to `log_text`.
pub fn last_upgrade_date(log_text: &str, package: &str) -> Option<NaiveDate> {
    log_text
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let date = fields.next()?;
            let _time = fields.next()?;
            let action = fields.next()?;
            let name = fields.next()?;
            if action != "upgrade" {
                return None;
            }
            let name = name.split(':').next().unwrap_or(name);
            if name != package {
                return None;
            }
            NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
        })
        .max()
}

/// Read `dpkg_log` and its first rotation, if present.
fn read_logs(dpkg_log: &Path) -> Result<String, SyncError> {
    let mut rotated = dpkg_log.as_os_str().to_owned();
    rotated.push(".1");
    let mut text = String::new();
    for path in [PathBuf::from(rotated), dpkg_log.to_path_buf()] {
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                text.push_str(&contents);
                text.push('\n');
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(io_err(&path, err)),
        }
    }
    Ok(text)
}

/// True when `package` was upgraded on `today`.
pub fn upgraded_on(dpkg_log: &Path, package: &str, today: NaiveDate) -> Result<bool, SyncError> {
    let text = read_logs(dpkg_log)?;
    Ok(last_upgrade_date(&text, package) == Some(today))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const LOG: &str = "\
2026-10-17 09:00:00 upgrade debrepo:all 0.1.0 0.1.1
2026-10-19 07:58:12 status half-configured debrepo:all 0.2.0
2026-10-19 07:58:12 upgrade libc6:amd64 2.40 2.41
2026-10-18 11:00:00 install debrepo:all <none> 0.1.1
";

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn only_upgrade_actions_of_the_package_count() {
        assert_eq!(last_upgrade_date(LOG, "debrepo"), Some(day(2026, 10, 17)));
        assert_eq!(last_upgrade_date(LOG, "libc6"), Some(day(2026, 10, 19)));
        assert_eq!(last_upgrade_date(LOG, "debrepo-extra"), None);
    }

    #[test]
    fn rotated_log_is_consulted() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("dpkg.log");
        fs::write(&log, "2026-10-19 06:00:00 upgrade vim:amd64 1 2\n").unwrap();
        fs::write(
            dir.path().join("dpkg.log.1"),
            "2026-10-19 05:00:00 upgrade debrepo:all 0.1.0 0.2.0\n",
        )
        .unwrap();
        assert!(upgraded_on(&log, "debrepo", day(2026, 10, 19)).unwrap());
        assert!(!upgraded_on(&log, "debrepo", day(2026, 10, 20)).unwrap());
    }

    #[test]
    fn missing_log_means_no_upgrade() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("dpkg.log");
        assert!(!upgraded_on(&log, "debrepo", day(2026, 10, 19)).unwrap());
    }
}
