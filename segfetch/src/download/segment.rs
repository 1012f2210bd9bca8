//! Immutable values describing what is downloaded and where it goes.

use std::fmt;
use std::path::{Path, PathBuf};

/// A contiguous byte range of the resource, assigned to one worker.
///
/// The range is half-open: `[start, start + length)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    /// Position in the plan, starting at 0.
    pub index: usize,
    /// First byte offset covered by this segment.
    pub start: u64,
    /// Number of bytes in this segment.
    pub length: u64,
}

impl Segment {
    /// Create a new segment.
    pub fn new(index: usize, start: u64, length: u64) -> Self {
        Self {
            index,
            start,
            length,
        }
    }

    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    /// Whether the segment covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Inclusive last offset, as used by HTTP `Range` headers.
    ///
    /// `None` for an empty segment, which has no last byte.
    pub fn last_byte(&self) -> Option<u64> {
        self.length.checked_sub(1).map(|n| self.start + n)
    }

    /// Whether `offset` falls inside this segment.
    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.start && offset < self.end()
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} [{}, {})", self.index, self.start, self.end())
    }
}

/// The resource being downloaded and its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    url: String,
    path: PathBuf,
    total_length: u64,
}

impl ResourceDescriptor {
    /// Create a descriptor once the resource length is known.
    pub fn new(url: impl Into<String>, path: impl Into<PathBuf>, total_length: u64) -> Self {
        Self {
            url: url.into(),
            path: path.into(),
            total_length,
        }
    }

    /// Source URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Target file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total length in bytes.
    pub fn total_length(&self) -> u64 {
        self.total_length
    }
}
