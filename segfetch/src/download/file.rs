//! Random-access file port and its local file system implementation.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

/// Storage for the downloaded resource.
pub trait FileStore: Send + Sync {
    /// Create `path` (and missing parent directories) and size it to `length` bytes.
    ///
    /// Existing content is discarded.
    fn preallocate(&self, path: &Path, length: u64) -> io::Result<()>;

    /// Open an independent writer on a preallocated file.
    ///
    /// Writers opened on the same path must not disturb each other as long as
    /// they write disjoint offsets.
    fn open_writer(&self, path: &Path) -> io::Result<Box<dyn SegmentWriter>>;
}

/// Positioned writer owned by a single worker.
pub trait SegmentWriter: Send {
    /// Write all of `bytes` starting at `offset`.
    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()>;

    /// Flush buffered data to the file.
    fn flush(&mut self) -> io::Result<()>;
}

/// [`FileStore`] backed by `std::fs`.
///
/// Every writer gets its own file handle, and therefore its own cursor, so no
/// seek position is shared between threads.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileStore;

impl FileStore for LocalFileStore {
    fn preallocate(&self, path: &Path, length: u64) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        file.set_len(length)?;
        Ok(())
    }

    fn open_writer(&self, path: &Path) -> io::Result<Box<dyn SegmentWriter>> {
        let file = OpenOptions::new().write(true).open(path)?;
        Ok(Box::new(LocalSegmentWriter {
            file,
            position: None,
        }))
    }
}

struct LocalSegmentWriter {
    file: File,
    /// Cursor after the last write, if known.
    position: Option<u64>,
}

impl SegmentWriter for LocalSegmentWriter {
    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        if self.position != Some(offset) {
            self.file.seek(SeekFrom::Start(offset))?;
        }
        // Invalidate first so a failed write forces a seek next time.
        self.position = None;
        self.file.write_all(bytes)?;
        self.position = Some(offset + bytes.len() as u64);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_preallocate_sizes_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a").join("b").join("out.bin");

        LocalFileStore.preallocate(&path, 4096).unwrap();

        assert_eq!(fs::metadata(&path).unwrap().len(), 4096);
        assert!(fs::read(&path).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_preallocate_truncates_existing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.bin");
        fs::write(&path, vec![7u8; 100]).unwrap();

        LocalFileStore.preallocate(&path, 10).unwrap();

        assert_eq!(fs::read(&path).unwrap(), vec![0u8; 10]);
    }

    #[test]
    fn test_write_at_offsets() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.bin");
        LocalFileStore.preallocate(&path, 8).unwrap();

        let mut writer = LocalFileStore.open_writer(&path).unwrap();
        writer.write_at(4, &[1, 2]).unwrap();
        writer.write_at(6, &[3, 4]).unwrap();
        writer.write_at(0, &[9]).unwrap();
        writer.flush().unwrap();

        assert_eq!(fs::read(&path).unwrap(), vec![9, 0, 0, 0, 1, 2, 3, 4]);
        assert_eq!(fs::metadata(&path).unwrap().len(), 8);
    }

    #[test]
    fn test_open_writer_requires_existing_file() {
        let temp = TempDir::new().unwrap();
        let result = LocalFileStore.open_writer(&temp.path().join("missing.bin"));
        assert!(result.is_err());
    }

    #[test]
    fn test_concurrent_writers_disjoint_regions() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.bin");
        let region = 1024u64;
        let regions = 8u64;
        LocalFileStore.preallocate(&path, region * regions).unwrap();

        let handles: Vec<_> = (0..regions)
            .map(|i| {
                let path = path.clone();
                thread::spawn(move || {
                    let mut writer = LocalFileStore.open_writer(&path).unwrap();
                    let data = vec![i as u8 + 1; 64];
                    for chunk in 0..(region / 64) {
                        writer.write_at(i * region + chunk * 64, &data).unwrap();
                    }
                    writer.flush().unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let content = fs::read(&path).unwrap();
        for i in 0..regions {
            let start = (i * region) as usize;
            let end = start + region as usize;
            assert!(
                content[start..end].iter().all(|&b| b == i as u8 + 1),
                "region {} was corrupted",
                i
            );
        }
    }
}
