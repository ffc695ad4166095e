//! Logging infrastructure.
//!
//! Library code only ever uses the `tracing` macros; the host calls
//! [`init_logging`] once at startup and keeps the returned guard alive
//! until exit. Log lines go to a per-session file and to stdout, with
//! verbosity controlled by the `RUST_LOG` environment variable.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping it flushes and closes the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Default location of the session log, relative to the working
/// directory.
pub fn default_log_path() -> PathBuf {
    PathBuf::from("logs").join("vectile.log")
}

/// Installs the global logging subscriber.
///
/// `log_file` holds one session's output: any previous contents are
/// truncated, and parent directories are created on demand. File writes
/// go through a non-blocking worker so tile jobs never stall on the
/// log. Filtering defaults to `info` when `RUST_LOG` is not set.
///
/// Can only be called once per process; a second call panics when it
/// tries to install its subscriber.
///
/// # Errors
///
/// Returns an error if the log file or its parent directory cannot be
/// created.
pub fn init_logging(log_file: impl AsRef<Path>) -> Result<LoggingGuard, io::Error> {
    let log_file = log_file.as_ref();
    if let Some(parent) = log_file.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(log_file)?;
    let (file_writer, file_guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stdout))
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}
