//! Error types for segmented downloads.
//!
//! Errors are split by where they occur:
//!
//! - [`TransportError`]: a request could not be issued or timed out.
//! - [`SegmentError`]: a single worker failed. These never cross to sibling
//!   workers; they are recorded on the worker's state and collected by the job.
//! - [`DownloadError`]: job-level failures, either at planning time (nothing
//!   was started) or the aggregated [`DownloadError::PartialFailure`].

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;

/// Errors raised by a [`Transport`](crate::download::Transport) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request could not be sent or the response could not be read.
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// The request exceeded the configured timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },
}

/// Terminal error of a single segment worker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentError {
    /// The range request returned a status outside the 2xx class.
    #[error("range request returned status {status}")]
    Fetch { status: u16 },

    /// The range request could not be issued.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The stream ended before the segment was filled.
    #[error("stream ended after {received} of {expected} bytes")]
    ShortRead { expected: u64, received: u64 },

    /// The stream kept producing bytes past the segment end.
    #[error("stream produced more than the expected {expected} bytes")]
    OverrunRead { expected: u64 },

    /// Reading from the response body failed.
    #[error("read failed at offset {offset}: {reason}")]
    Read { offset: u64, reason: String },

    /// Writing to the target file failed.
    #[error("write failed at offset {offset}: {reason}")]
    Write { offset: u64, reason: String },

    /// The job was cancelled while this segment was running.
    #[error("cancelled")]
    Cancelled,

    /// The worker thread panicked before reaching a terminal state.
    #[error("worker panicked")]
    Panicked,
}

impl SegmentError {
    pub(crate) fn read(offset: u64, e: io::Error) -> Self {
        Self::Read {
            offset,
            reason: e.to_string(),
        }
    }

    pub(crate) fn write(offset: u64, e: io::Error) -> Self {
        Self::Write {
            offset,
            reason: e.to_string(),
        }
    }
}

/// A failed segment and the error it ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFailure {
    /// Index of the failed segment.
    pub index: usize,
    /// Error recorded by the segment's worker.
    pub error: SegmentError,
}

impl fmt::Display for SegmentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "segment {}: {}", self.index, self.error)
    }
}

/// Job-level download errors.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Worker count must be at least one.
    #[error("invalid worker count {0}: at least one worker is required")]
    InvalidWorkerCount(usize),

    /// The resource did not report a usable length.
    #[error("length of {url} is unknown or unbounded")]
    UnknownLength { url: String },

    /// The length probe itself failed.
    #[error("failed to probe {url}: {source}")]
    Probe {
        url: String,
        #[source]
        source: TransportError,
    },

    /// The target file could not be created or sized.
    #[error("failed to preallocate {}: {source}", .path.display())]
    Preallocate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker for segment {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: io::Error,
    },

    /// One or more segments failed; the others completed.
    #[error("{} of {total} segments failed: {}", .failures.len(), format_failures(.failures))]
    PartialFailure {
        total: usize,
        failures: Vec<SegmentFailure>,
    },
}

impl DownloadError {
    /// Whether this error was raised before any worker started.
    pub fn is_planning_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidWorkerCount(_)
                | Self::UnknownLength { .. }
                | Self::Probe { .. }
                | Self::Preallocate { .. }
        )
    }

    /// Indices of failed segments, empty for non partial failures.
    pub fn failed_segments(&self) -> Vec<usize> {
        match self {
            Self::PartialFailure { failures, .. } => failures.iter().map(|f| f.index).collect(),
            _ => Vec::new(),
        }
    }
}

fn format_failures(failures: &[SegmentFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
