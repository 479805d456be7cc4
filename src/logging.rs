//! Log output setup for the harvester binary

use crate::error::{HarvestError, Result};
use chrono::Local;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

/// Timestamp layout of every log line, e.g. `Tue, 01 Jan 2008 00:00:00 +0000`
pub const TIMESTAMP_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Local time in [`TIMESTAMP_FORMAT`]
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTimestamp;

impl FormatTime for LogTimestamp {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format(TIMESTAMP_FORMAT))
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over `default_level`. With `log_file`,
/// lines are appended to that file without colors; otherwise they go to
/// stderr.
pub fn init(default_level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let installed = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_timer(LogTimestamp)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_timer(LogTimestamp)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    installed.map_err(|e| HarvestError::Config(format!("Failed to install logger: {}", e)))
}
