//! Parallel segmented downloads.
//!
//! This module splits one remote resource into disjoint byte ranges and
//! downloads every range on its own thread, writing each directly into its
//! region of a single pre-sized file:
//! - Range planning (`planner`)
//! - HTTP range requests behind a transport port (`transport`)
//! - Positioned writes behind a file port (`file`)
//! - Per-segment workers and their shared state (`worker`)
//! - Lock-free progress aggregation and reporting (`progress`)
//! - Completion barrier (`latch`)
//! - Job orchestration (`coordinator`)
//!
//! # Architecture
//!
//! ```text
//! DownloadCoordinator
//!         │
//!         ├── Transport (trait)          probe length, open range stream
//!         │       └── HttpTransport
//!         │
//!         ├── FileStore (trait)          preallocate, positioned writer
//!         │       └── LocalFileStore
//!         │
//!         ├── plan()                     Segment list
//!         │
//!         └── DownloadJob
//!                 ├── SegmentWorker × N  one thread per segment
//!                 ├── WorkerState × N    single writer, many readers
//!                 ├── CompletionLatch    counts terminal workers
//!                 └── ProgressTracker    sums bytes written
//! ```
//!
//! The file is never locked on the write path. Segments never overlap, so
//! each worker owns its byte range outright for the life of the job.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use segfetch::config::DownloadConfig;
//! use segfetch::download::{DownloadCoordinator, HttpTransport, LocalFileStore};
//!
//! let config = DownloadConfig::default().with_workers(4);
//! let transport = Arc::new(HttpTransport::new(&config)?);
//! let coordinator = DownloadCoordinator::new(config, transport, Arc::new(LocalFileStore));
//!
//! let job = coordinator.start("http://example.com/big.bin", "/tmp/big.bin".as_ref())?;
//! while !job.wait_timeout(std::time::Duration::from_millis(500)) {
//!     println!("{:.1}%", job.progress().ratio * 100.0);
//! }
//! let report = job.wait()?;
//! println!("{} bytes in {:?}", report.total_bytes, report.elapsed);
//! ```

mod coordinator;
mod file;
mod latch;
mod planner;
mod progress;
mod segment;
mod transport;
mod worker;

pub use coordinator::{DownloadCoordinator, DownloadJob, DownloadReport, JobState};
pub use file::{FileStore, LocalFileStore, SegmentWriter};
pub use latch::CompletionLatch;
pub use planner::plan;
pub use progress::{ProgressCallback, ProgressReporter, ProgressSnapshot, ProgressTracker};
pub use segment::{ResourceDescriptor, Segment};
pub use transport::{HttpTransport, RangeResponse, Transport};
pub use worker::{SegmentWorker, WorkerState, WorkerStatus};
