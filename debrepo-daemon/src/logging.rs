//! Subscriber setup shared by `debrepo sync` and `debrepo watch`.
//!
//! Records go to stderr (picked up by the journal under systemd) and are
//! appended to `<log_dir>/debrepo.log`. `log` records from the sync crate are
//! bridged into the same subscriber.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::{io_err, DaemonError};
use crate::paths::log_file_path;

/// Opens the log file in append mode for every record, so a rotation that
/// moved the file away is picked up on the next write.
#[derive(Debug, Clone)]
pub struct AppendFile {
    path: PathBuf,
}

impl AppendFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl<'a> MakeWriter<'a> for AppendFile {
    type Writer = Box<dyn Write + 'a>;

    fn make_writer(&'a self) -> Self::Writer {
        match OpenOptions::new().create(true).append(true).open(&self.path) {
            Ok(file) => Box::new(file),
            Err(_) => Box::new(io::sink()),
        }
    }
}

/// Install the global subscriber. Calling it twice is harmless.
///
/// `RUST_LOG` overrides the default `info` filter.
pub fn init(log_dir: &Path, json: bool) -> Result<(), DaemonError> {
    fs::create_dir_all(log_dir).map_err(|e| io_err(log_dir, e))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_text = (!json).then(|| fmt::layer().with_target(false).with_writer(io::stderr));
    let stderr_json = json.then(|| fmt::layer().json().with_writer(io::stderr));
    let file = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(AppendFile::new(log_file_path(log_dir)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_text)
        .with(stderr_json)
        .with(file)
        .try_init();
    Ok(())
}
