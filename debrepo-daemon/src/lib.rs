//! Watch mode: pool change monitor, tokio runtime, and process logging.

mod error;
pub mod log_rotation;
pub mod logging;
pub mod monitor;
pub mod paths;
mod runtime;

pub use error::DaemonError;
pub use monitor::{ChangeEvent, ChangeSubscription, MonitorState, MonitorStats};
pub use runtime::{run, start_blocking};
