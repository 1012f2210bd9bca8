//! Segment workers and the state they publish.
//!
//! Each [`SegmentWorker`] runs on its own thread and is the only writer of its
//! [`WorkerState`]. The coordinator and progress tracker only read it, so the
//! counter and status are plain atomics with no lock.

use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

use super::file::{FileStore, SegmentWriter};
use super::latch::CompletionLatch;
use super::segment::{ResourceDescriptor, Segment};
use super::transport::Transport;
use crate::error::SegmentError;

/// Lifecycle of a segment worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerStatus {
    /// Created, thread not yet streaming.
    Pending = 0,
    /// Streaming bytes into the file.
    Running = 1,
    /// All bytes of the segment were written and the stream was exhausted.
    Succeeded = 2,
    /// Stopped on an error; see [`WorkerState::last_error`].
    Failed = 3,
}

impl WorkerStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Pending,
            1 => Self::Running,
            2 => Self::Succeeded,
            _ => Self::Failed,
        }
    }

    /// Whether no further transitions can happen.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Progress and outcome of one segment.
#[derive(Debug)]
pub struct WorkerState {
    segment: Segment,
    bytes_written: AtomicU64,
    status: AtomicU8,
    last_error: OnceLock<SegmentError>,
}

impl WorkerState {
    /// Create a pending state for `segment`.
    pub fn new(segment: Segment) -> Self {
        Self {
            segment,
            bytes_written: AtomicU64::new(0),
            status: AtomicU8::new(WorkerStatus::Pending as u8),
            last_error: OnceLock::new(),
        }
    }

    /// The segment this worker owns.
    pub fn segment(&self) -> Segment {
        self.segment
    }

    /// Bytes written to the file so far. Never decreases.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Acquire)
    }

    /// Current status.
    pub fn status(&self) -> WorkerStatus {
        WorkerStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Error the worker failed with, once it is [`WorkerStatus::Failed`].
    pub fn last_error(&self) -> Option<&SegmentError> {
        self.last_error.get()
    }

    /// Whether the worker reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    pub(crate) fn mark_running(&self) -> bool {
        self.transition(WorkerStatus::Running)
    }

    pub(crate) fn add_bytes(&self, bytes: u64) {
        debug_assert!(!self.is_terminal(), "write after terminal state");
        self.bytes_written.fetch_add(bytes, Ordering::AcqRel);
    }

    pub(crate) fn succeed(&self) -> bool {
        self.transition(WorkerStatus::Succeeded)
    }

    pub(crate) fn fail(&self, error: SegmentError) -> bool {
        if self.is_terminal() {
            return false;
        }
        // Published before the status so readers that see Failed see the error.
        let _ = self.last_error.set(error);
        self.transition(WorkerStatus::Failed)
    }

    fn transition(&self, to: WorkerStatus) -> bool {
        let mut current = self.status.load(Ordering::Acquire);
        loop {
            if WorkerStatus::from_u8(current).is_terminal() {
                return false;
            }
            match self.status.compare_exchange_weak(
                current,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Fails the worker if it never reached a terminal state, then counts down.
///
/// Held for the whole run so a panicking worker is still accounted for.
struct CompletionGuard<'a> {
    state: &'a WorkerState,
    latch: &'a CompletionLatch,
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        if self.state.fail(SegmentError::Panicked) {
            tracing::error!(segment = self.state.segment.index, "Segment worker panicked");
        }
        self.latch.count_down();
    }
}

/// Downloads one segment into its region of the target file.
pub struct SegmentWorker {
    descriptor: Arc<ResourceDescriptor>,
    transport: Arc<dyn Transport>,
    file_store: Arc<dyn FileStore>,
    state: Arc<WorkerState>,
    latch: Arc<CompletionLatch>,
    cancel: CancellationToken,
    buffer_size: usize,
}

impl SegmentWorker {
    /// Create a worker. `state` must be pending.
    pub fn new(
        descriptor: Arc<ResourceDescriptor>,
        transport: Arc<dyn Transport>,
        file_store: Arc<dyn FileStore>,
        state: Arc<WorkerState>,
        latch: Arc<CompletionLatch>,
        cancel: CancellationToken,
        buffer_size: usize,
    ) -> Self {
        Self {
            descriptor,
            transport,
            file_store,
            state,
            latch,
            cancel,
            buffer_size: buffer_size.max(1),
        }
    }

    /// Run the download to a terminal state.
    ///
    /// The outcome is only reported through the worker's [`WorkerState`];
    /// the latch is counted down exactly once on return or unwind.
    pub fn run(self) {
        let _guard = CompletionGuard {
            state: &self.state,
            latch: &self.latch,
        };

        let segment = self.state.segment();
        self.state.mark_running();
        tracing::debug!(
            segment = segment.index,
            start = segment.start,
            length = segment.length,
            "Segment started"
        );

        match self.download(segment) {
            Ok(()) => {
                self.state.succeed();
                tracing::debug!(segment = segment.index, "Segment completed");
            }
            Err(e) => {
                tracing::warn!(segment = segment.index, error = %e, "Segment failed");
                self.state.fail(e);
            }
        }
    }

    fn download(&self, segment: Segment) -> Result<(), SegmentError> {
        let Some(last_byte) = segment.last_byte() else {
            return Ok(());
        };
        if self.cancel.is_cancelled() {
            return Err(SegmentError::Cancelled);
        }

        let response = self
            .transport
            .open_range(self.descriptor.url(), segment.start, last_byte)?;
        if !response.is_success() {
            return Err(SegmentError::Fetch {
                status: response.status,
            });
        }

        let mut writer = self
            .file_store
            .open_writer(self.descriptor.path())
            .map_err(|e| SegmentError::write(segment.start, e))?;

        self.stream(segment, response.body, writer.as_mut())?;

        writer
            .flush()
            .map_err(|e| SegmentError::write(segment.end(), e))
    }

    fn stream(
        &self,
        segment: Segment,
        mut body: Box<dyn Read + Send>,
        writer: &mut dyn SegmentWriter,
    ) -> Result<(), SegmentError> {
        let mut buffer = vec![0u8; self.buffer_size];
        let mut written = 0u64;

        while written < segment.length {
            if self.cancel.is_cancelled() {
                return Err(SegmentError::Cancelled);
            }

            // Never read past the segment end, so nothing lands outside it.
            let want = (segment.length - written).min(buffer.len() as u64) as usize;
            let offset = segment.start + written;
            debug_assert!(segment.contains(offset), "write offset outside segment");

            let read = match body.read(&mut buffer[..want]) {
                Ok(0) => {
                    return Err(SegmentError::ShortRead {
                        expected: segment.length,
                        received: written,
                    })
                }
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(SegmentError::read(offset, e)),
            };

            writer
                .write_at(offset, &buffer[..read])
                .map_err(|e| SegmentError::write(offset, e))?;

            written += read as u64;
            self.state.add_bytes(read as u64);
        }

        // Segment is full; the stream must be exhausted too.
        let mut probe = [0u8; 1];
        loop {
            match body.read(&mut probe) {
                Ok(0) => return Ok(()),
                Ok(_) => {
                    return Err(SegmentError::OverrunRead {
                        expected: segment.length,
                    })
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(SegmentError::read(segment.end(), e)),
            }
        }
    }
}
