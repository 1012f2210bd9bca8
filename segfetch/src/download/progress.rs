//! Progress aggregation for segmented downloads.
//!
//! [`ProgressTracker`] sums the per-worker byte counters on demand. It never
//! takes a lock and never blocks a worker; a snapshot may be slightly behind
//! the workers, which is fine for reporting.
//!
//! [`ProgressReporter`] polls a tracker from a background thread and feeds a
//! callback, for callers that want push-style updates.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::worker::{WorkerState, WorkerStatus};

const REPORTER_THREAD_NAME: &str = "segfetch-progress";

/// Progress callback invoked by [`ProgressReporter`].
pub type ProgressCallback = Box<dyn Fn(ProgressSnapshot) + Send + Sync>;

/// Point-in-time view of a job's progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Bytes written to the file across all segments.
    pub completed_bytes: u64,
    /// Total length of the resource.
    pub total_bytes: u64,
    /// `completed_bytes / total_bytes`, or 1.0 for an empty resource.
    pub ratio: f64,
    /// Segments that reached a terminal state.
    pub segments_finished: usize,
    /// Segments that failed.
    pub segments_failed: usize,
    /// Total number of segments.
    pub segments_total: usize,
}

impl ProgressSnapshot {
    /// Progress as a percentage (0.0 to 100.0).
    pub fn percent(&self) -> f64 {
        self.ratio * 100.0
    }

    /// Whether every segment reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.segments_finished == self.segments_total
    }
}

/// Read-only view over the worker states of one job.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    workers: Arc<[Arc<WorkerState>]>,
    total_bytes: u64,
}

impl ProgressTracker {
    /// Create a tracker over `workers` for a resource of `total_bytes`.
    pub fn new(workers: Vec<Arc<WorkerState>>, total_bytes: u64) -> Self {
        Self {
            workers: workers.into(),
            total_bytes,
        }
    }

    /// Sum the worker counters into a snapshot.
    pub fn snapshot(&self) -> ProgressSnapshot {
        let mut completed_bytes = 0u64;
        let mut segments_finished = 0usize;
        let mut segments_failed = 0usize;

        for worker in self.workers.iter() {
            completed_bytes += worker.bytes_written();
            match worker.status() {
                WorkerStatus::Succeeded => segments_finished += 1,
                WorkerStatus::Failed => {
                    segments_finished += 1;
                    segments_failed += 1;
                }
                WorkerStatus::Pending | WorkerStatus::Running => {}
            }
        }

        let ratio = if self.total_bytes == 0 {
            1.0
        } else {
            completed_bytes as f64 / self.total_bytes as f64
        };

        ProgressSnapshot {
            completed_bytes,
            total_bytes: self.total_bytes,
            ratio,
            segments_finished,
            segments_failed,
            segments_total: self.workers.len(),
        }
    }

    /// Worker states in segment order.
    pub fn workers(&self) -> &[Arc<WorkerState>] {
        &self.workers
    }
}

/// Background thread that reports progress at a fixed interval.
///
/// Stops on its own once every segment is terminal, or when stopped or
/// dropped. A final report is always delivered.
pub struct ProgressReporter {
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl ProgressReporter {
    /// Start reporting `tracker` to `callback` every `interval`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the reporter thread cannot be spawned.
    pub fn start(
        tracker: ProgressTracker,
        interval: Duration,
        callback: ProgressCallback,
    ) -> io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name(REPORTER_THREAD_NAME.to_string())
            .spawn(move || {
                loop {
                    let snapshot = tracker.snapshot();
                    if snapshot.is_finished() || stop_clone.load(Ordering::SeqCst) {
                        break;
                    }
                    callback(snapshot);
                    thread::sleep(interval);
                }

                // Final report
                callback(tracker.snapshot());
            })?;

        Ok(Self {
            handle: Some(handle),
            stop,
        })
    }

    /// Stop the reporter and wait for its final report.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.shutdown();
    }
}
