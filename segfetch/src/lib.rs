//! Segfetch - parallel segmented downloads
//!
//! This library fetches a single remote resource by splitting it into disjoint
//! byte ranges, downloading every range on its own thread and writing each one
//! directly at its offset in one pre-sized local file.
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
//! let job = coordinator.start("https://example.com/file.iso", "file.iso".as_ref())?;
//! println!("{:.1}%", job.progress().ratio * 100.0);
//! let report = job.wait()?;
//! ```

pub mod config;
pub mod download;
pub mod error;
pub mod logging;

pub use error::{DownloadError, DownloadResult, SegmentError, TransportError};
