//! Logging setup built on `tracing-subscriber`.
//!
//! The library itself only emits `tracing` events. Binaries call
//! [`init_logging`] once and keep the returned [`LoggingGuard`] alive for the
//! life of the process so buffered file output is flushed on exit.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "segfetch=info";

/// Filter used for verbose output.
pub const VERBOSE_FILTER: &str = "segfetch=debug";

/// Errors from [`init_logging`].
#[derive(Debug, Error)]
pub enum LoggingError {
    /// A global subscriber is already installed.
    #[error("a global logging subscriber is already set: {0}")]
    AlreadyInitialized(#[source] TryInitError),

    /// The log file path has no file name.
    #[error("invalid log file path: {}", .path.display())]
    InvalidPath { path: PathBuf },

    /// The log directory could not be created.
    #[error("failed to create log directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Logging options.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Log at debug level instead of info.
    pub verbose: bool,
    /// Optional file that receives a copy of all log output.
    pub file: Option<PathBuf>,
}

impl LogConfig {
    /// Enable or disable verbose output.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Also write logs to the given file.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(if self.verbose {
                VERBOSE_FILTER
            } else {
                DEFAULT_FILTER
            })
        })
    }
}

/// Keeps the non-blocking file writer alive. Dropping it flushes pending output.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// Logs go to stderr and, when configured, to a file.
///
/// # Errors
///
/// Fails if the log file path is unusable or a global subscriber is already
/// installed.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuard, LoggingError> {
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, file_guard) = match config.file.as_deref() {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(config.filter())
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(LoggingError::AlreadyInitialized)?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn file_writer(
    path: &Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), LoggingError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path.file_name().ok_or_else(|| LoggingError::InvalidPath {
        path: path.to_path_buf(),
    })?;

    std::fs::create_dir_all(&dir).map_err(|source| LoggingError::CreateDir {
        path: dir.clone(),
        source,
    })?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}
