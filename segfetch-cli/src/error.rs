//! CLI error type.

use std::fmt;
use std::io;

use segfetch::logging::LoggingError;
use segfetch::DownloadError;

/// Errors surfaced to the user by the `segfetch` binary.
#[derive(Debug)]
pub enum CliError {
    /// Bad configuration or arguments.
    Config(String),
    /// The logging subscriber could not be installed.
    Logging(LoggingError),
    /// The HTTP client could not be built.
    Transport(String),
    /// The progress reporter thread could not be started.
    Progress(io::Error),
    /// The download could not be planned, or some segments failed.
    Download(DownloadError),
}

impl CliError {
    /// Process exit code for this error.
    ///
    /// Errors raised before any byte was requested exit with 2; failures of
    /// a running download exit with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::Logging(_) => 2,
            CliError::Download(e) if e.is_planning_error() => 2,
            CliError::Transport(_) | CliError::Progress(_) | CliError::Download(_) => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Transport(msg) => write!(f, "Failed to create HTTP client: {}", msg),
            CliError::Progress(e) => write!(f, "Failed to start progress reporter: {}", e),
            CliError::Download(e) => write!(f, "Download failed: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Logging(e) => Some(e),
            CliError::Progress(e) => Some(e),
            CliError::Download(e) => Some(e),
            CliError::Config(_) | CliError::Transport(_) => None,
        }
    }
}

impl From<DownloadError> for CliError {
    fn from(e: DownloadError) -> Self {
        CliError::Download(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::path::PathBuf;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Config("x".into()).exit_code(), 2);
        assert_eq!(CliError::Download(DownloadError::InvalidWorkerCount(0)).exit_code(), 2);
        assert_eq!(
            CliError::Download(DownloadError::PartialFailure {
                total: 2,
                failures: vec![],
            })
            .exit_code(),
            1
        );
        assert_eq!(
            CliError::Progress(io::Error::new(io::ErrorKind::Other, "no threads")).exit_code(),
            1
        );
    }

    #[test]
    fn test_download_error_display_includes_cause() {
        let err = CliError::from(DownloadError::UnknownLength {
            url: "http://example.com/a".to_string(),
        });
        let msg = err.to_string();
        assert!(msg.starts_with("Download failed: "));
        assert!(msg.contains("http://example.com/a"));
    }

    #[test]
    fn test_logging_error_keeps_source() {
        let err = CliError::Logging(LoggingError::InvalidPath {
            path: PathBuf::from("/"),
        });
        assert!(err.to_string().starts_with("Failed to initialize logging: "));
        assert!(err.source().is_some());
    }
}
