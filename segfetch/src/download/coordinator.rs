//! Download orchestration.
//!
//! [`DownloadCoordinator::start`] probes the resource, pre-sizes the target
//! file, plans the segments and launches one worker thread per segment. The
//! returned [`DownloadJob`] is the caller's handle: poll it with
//! [`DownloadJob::progress`], block on it with [`DownloadJob::wait`].
//!
//! # Job State Machine
//!
//! ```text
//! Planning --[probe + preallocate + plan]--> Running
//! Running --[all segments succeeded]--> Completed
//! Running --[any segment failed]--> PartiallyFailed
//! ```
//!
//! Planning happens entirely inside `start`; a planning error means no worker
//! was launched and no job is returned.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use super::file::FileStore;
use super::latch::CompletionLatch;
use super::planner::plan;
use super::progress::{ProgressSnapshot, ProgressTracker};
use super::segment::{ResourceDescriptor, Segment};
use super::transport::Transport;
use super::worker::{SegmentWorker, WorkerState, WorkerStatus};
use crate::config::DownloadConfig;
use crate::error::{DownloadError, DownloadResult, SegmentError, SegmentFailure};

/// Lifecycle of a download job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Probing, preallocating and planning. Only observable inside `start`.
    Planning,
    /// At least one segment has not reached a terminal state.
    Running,
    /// Every segment succeeded.
    Completed,
    /// Every segment is terminal and at least one failed.
    PartiallyFailed,
}

/// Summary of a fully successful download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    /// Where the resource was written.
    pub path: PathBuf,
    /// Bytes written, equal to the resource length.
    pub total_bytes: u64,
    /// Number of segments the resource was split into.
    pub segments: usize,
    /// Time from `start` until `wait` observed completion.
    pub elapsed: Duration,
}

/// Starts segmented download jobs.
///
/// Holds the configuration and the two ports every job uses. Coordinators are
/// cheap to share; each `start` creates an independent job.
pub struct DownloadCoordinator {
    config: DownloadConfig,
    transport: Arc<dyn Transport>,
    file_store: Arc<dyn FileStore>,
}

impl std::fmt::Debug for DownloadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadCoordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DownloadCoordinator {
    /// Create a coordinator.
    pub fn new(
        config: DownloadConfig,
        transport: Arc<dyn Transport>,
        file_store: Arc<dyn FileStore>,
    ) -> Self {
        Self {
            config,
            transport,
            file_store,
        }
    }

    /// Configuration used for new jobs.
    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Start downloading `url` into `path` with the configured worker count.
    pub fn start(&self, url: &str, path: &Path) -> DownloadResult<DownloadJob> {
        self.start_with_workers(url, path, self.config.workers)
    }

    /// Start downloading `url` into `path` with `workers` segments.
    ///
    /// # Errors
    ///
    /// Fails without launching any worker if `workers` is zero, the length
    /// probe fails or reports no length, or the file cannot be preallocated.
    pub fn start_with_workers(
        &self,
        url: &str,
        path: &Path,
        workers: usize,
    ) -> DownloadResult<DownloadJob> {
        if workers == 0 {
            return Err(DownloadError::InvalidWorkerCount(workers));
        }
        let started_at = Instant::now();

        let total_length = self
            .transport
            .probe_length(url)
            .map_err(|source| DownloadError::Probe {
                url: url.to_string(),
                source,
            })?
            .ok_or_else(|| DownloadError::UnknownLength {
                url: url.to_string(),
            })?;

        let segments = plan(total_length, workers)?;

        // Must complete before any worker opens the file.
        self.file_store
            .preallocate(path, total_length)
            .map_err(|source| DownloadError::Preallocate {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::info!(
            url,
            path = %path.display(),
            total_bytes = total_length,
            segments = segments.len(),
            "Starting segmented download"
        );

        let descriptor = Arc::new(ResourceDescriptor::new(url, path, total_length));
        let states: Vec<Arc<WorkerState>> = segments
            .iter()
            .map(|segment| Arc::new(WorkerState::new(*segment)))
            .collect();
        let latch = Arc::new(CompletionLatch::new(segments.len()));
        let cancel = CancellationToken::new();

        let handles = self.spawn_workers(&descriptor, &states, &latch, &cancel)?;

        Ok(DownloadJob {
            descriptor,
            segments,
            tracker: ProgressTracker::new(states, total_length),
            handles,
            latch,
            cancel,
            started_at,
        })
    }

    fn spawn_workers(
        &self,
        descriptor: &Arc<ResourceDescriptor>,
        states: &[Arc<WorkerState>],
        latch: &Arc<CompletionLatch>,
        cancel: &CancellationToken,
    ) -> DownloadResult<Vec<JoinHandle<()>>> {
        let mut handles = Vec::with_capacity(states.len());

        for state in states {
            let index = state.segment().index;
            let worker = SegmentWorker::new(
                Arc::clone(descriptor),
                Arc::clone(&self.transport),
                Arc::clone(&self.file_store),
                Arc::clone(state),
                Arc::clone(latch),
                cancel.clone(),
                self.config.buffer_size,
            );

            let spawned = thread::Builder::new()
                .name(format!("segfetch-segment-{}", index))
                .spawn(move || worker.run());

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    tracing::error!(segment = index, error = %source, "Failed to spawn worker");
                    cancel.cancel();
                    for handle in handles {
                        handle.join().ok();
                    }
                    return Err(DownloadError::Spawn { index, source });
                }
            }
        }

        Ok(handles)
    }
}

/// Handle to a running download.
pub struct DownloadJob {
    descriptor: Arc<ResourceDescriptor>,
    segments: Vec<Segment>,
    tracker: ProgressTracker,
    handles: Vec<JoinHandle<()>>,
    latch: Arc<CompletionLatch>,
    cancel: CancellationToken,
    started_at: Instant,
}

impl std::fmt::Debug for DownloadJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadJob")
            .field("descriptor", &self.descriptor)
            .field("segments", &self.segments)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl DownloadJob {
    /// The resource being downloaded.
    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    /// Planned segments in index order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Per-segment worker states in index order.
    pub fn worker_states(&self) -> &[Arc<WorkerState>] {
        self.tracker.workers()
    }

    /// Current progress. Never blocks.
    pub fn progress(&self) -> ProgressSnapshot {
        self.tracker.snapshot()
    }

    /// A tracker over this job, for use from other threads.
    pub fn tracker(&self) -> ProgressTracker {
        self.tracker.clone()
    }

    /// Current job state.
    pub fn state(&self) -> JobState {
        if !self.latch.is_done() {
            return JobState::Running;
        }
        let any_failed = self
            .worker_states()
            .iter()
            .any(|state| state.status() == WorkerStatus::Failed);
        if any_failed {
            JobState::PartiallyFailed
        } else {
            JobState::Completed
        }
    }

    /// Whether every worker reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.latch.is_done()
    }

    /// Ask all workers to stop after their current chunk.
    ///
    /// Workers that already finished keep their status; the others fail with
    /// [`SegmentError::Cancelled`].
    pub fn cancel(&self) {
        tracing::info!(url = self.descriptor.url(), "Cancelling download");
        self.cancel.cancel();
    }

    /// Token that cancels this job, for signal handlers and the like.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Block until all workers are terminal or `timeout` elapses.
    ///
    /// Returns `true` if all workers are terminal.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.latch.wait_timeout(timeout)
    }

    /// Block until all workers are terminal and collect the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::PartialFailure`] listing every failed segment
    /// if any segment did not succeed. Successful regions of the file are
    /// intact; failed regions are left as they were.
    pub fn wait(self) -> DownloadResult<DownloadReport> {
        self.latch.wait();
        for handle in self.handles {
            // A panic was already recorded on the worker state.
            handle.join().ok();
        }
        let elapsed = self.started_at.elapsed();

        let failures: Vec<SegmentFailure> = self
            .tracker
            .workers()
            .iter()
            .filter(|state| state.status() == WorkerStatus::Failed)
            .map(|state| SegmentFailure {
                index: state.segment().index,
                error: state
                    .last_error()
                    .cloned()
                    .unwrap_or(SegmentError::Panicked),
            })
            .collect();

        if !failures.is_empty() {
            tracing::warn!(
                url = self.descriptor.url(),
                failed = failures.len(),
                total = self.segments.len(),
                "Download finished with failed segments"
            );
            return Err(DownloadError::PartialFailure {
                total: self.segments.len(),
                failures,
            });
        }

        tracing::info!(
            url = self.descriptor.url(),
            total_bytes = self.descriptor.total_length(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Download complete"
        );

        Ok(DownloadReport {
            path: self.descriptor.path().to_path_buf(),
            total_bytes: self.descriptor.total_length(),
            segments: self.segments.len(),
            elapsed,
        })
    }
}
