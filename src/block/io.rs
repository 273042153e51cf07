//! Block device I/O collaborators (§4.8, §9).
//!
//! The snapshot engine never touches a file descriptor directly; it drives
//! two small traits instead, mirroring the `WalRead`/`StorageApply` split in
//! the recovery replay path: a swappable seam for tests, and a single real
//! implementation for production use.
//!
//! `BlockIo::free_tracked`/`free_untracked` preserve, at the type level, the
//! distinction the original engine makes with a boolean "checkpoint I/O"
//! flag: tracked frees count against the live allocation statistics, untracked
//! frees (backing a historical snapshot load) do not.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

use super::errors::{BlockError, BlockResult};

/// Raw block-addressed read/write/free operations against the backing file.
pub trait BlockIo: Send + Sync {
    /// Reads exactly `len` bytes starting at `offset`.
    fn read_off(&self, offset: u64, len: usize) -> BlockResult<Vec<u8>>;

    /// Writes `data` at `offset`, returning the offset written to.
    fn write_off(&self, offset: u64, data: &[u8]) -> BlockResult<u64>;

    /// Releases a tracked extent: one the live allocation list owns and whose
    /// release must be reflected in live accounting.
    fn free_tracked(&self, offset: u64, len: u64) -> BlockResult<()>;

    /// Releases an untracked extent: one discovered while loading historical
    /// snapshot state, whose release is bookkeeping only.
    fn free_untracked(&self, offset: u64, len: u64) -> BlockResult<()>;
}

/// File-level operations distinct from block addressing: truncation, size
/// queries, and durability.
pub trait FileIo: Send + Sync {
    /// Truncates the backing file to exactly `size` bytes.
    fn truncate(&self, size: u64) -> BlockResult<()>;

    /// Returns the current file size in bytes.
    fn size(&self) -> BlockResult<u64>;

    /// Flushes all outstanding writes to stable storage.
    fn fsync(&self) -> BlockResult<()>;
}

/// Combines [`BlockIo`] and [`FileIo`] into a single object-safe handle so
/// [`super::object::BlockObject`] can hold one trait object instead of two.
pub trait BlockBackend: BlockIo + FileIo {}
impl<T: BlockIo + FileIo> BlockBackend for T {}

/// A real, file-backed implementation of [`BlockIo`] and [`FileIo`], grounded
/// in the document storage writer's `OpenOptions`/`sync_all` usage.
///
/// Offsets are absolute byte positions within the file; callers serialize
/// concurrent access to the handle themselves (the live lock covers mutation
/// of the live extent lists, not raw I/O against the handle).
pub struct FileBlockIo {
    file: Mutex<File>,
}

impl FileBlockIo {
    /// Opens (creating if necessary) the backing file at `path` for
    /// read/write access.
    pub fn open(path: impl AsRef<Path>) -> BlockResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(|e| BlockError::io("failed to open backing file", e))?;
        Ok(Self { file: Mutex::new(file) })
    }
}

impl BlockIo for FileBlockIo {
    fn read_off(&self, offset: u64, len: usize) -> BlockResult<Vec<u8>> {
        let mut file = self.file.lock().expect("block io mutex poisoned");
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| BlockError::io("seek failed during read_off", e))?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)
            .map_err(|e| BlockError::io("short read in read_off", e))?;
        Ok(buf)
    }

    fn write_off(&self, offset: u64, data: &[u8]) -> BlockResult<u64> {
        let mut file = self.file.lock().expect("block io mutex poisoned");
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| BlockError::io("seek failed during write_off", e))?;
        file.write_all(data)
            .map_err(|e| BlockError::io("short write in write_off", e))?;
        Ok(offset)
    }

    fn free_tracked(&self, _offset: u64, _len: u64) -> BlockResult<()> {
        Ok(())
    }

    fn free_untracked(&self, _offset: u64, _len: u64) -> BlockResult<()> {
        Ok(())
    }
}

impl FileIo for FileBlockIo {
    fn truncate(&self, size: u64) -> BlockResult<()> {
        let file = self.file.lock().expect("block io mutex poisoned");
        file.set_len(size).map_err(|e| BlockError::io("truncate failed", e))
    }

    fn size(&self) -> BlockResult<u64> {
        let file = self.file.lock().expect("block io mutex poisoned");
        file.metadata()
            .map(|m| m.len())
            .map_err(|e| BlockError::io("stat failed", e))
    }

    fn fsync(&self) -> BlockResult<()> {
        let file = self.file.lock().expect("block io mutex poisoned");
        file.sync_all().map_err(|e| BlockError::io("fsync failed", e))
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockBlockIo;
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_file_block_io_write_then_read() {
        let tmp = NamedTempFile::new().unwrap();
        let io = FileBlockIo::open(tmp.path()).unwrap();
        io.truncate(4096).unwrap();
        io.write_off(128, b"hello").unwrap();
        let out = io.read_off(128, 5).unwrap();
        assert_eq!(&out, b"hello");
    }

    #[test]
    fn test_file_block_io_truncate_and_size() {
        let tmp = NamedTempFile::new().unwrap();
        let io = FileBlockIo::open(tmp.path()).unwrap();
        io.truncate(8192).unwrap();
        assert_eq!(io.size().unwrap(), 8192);
        io.truncate(4096).unwrap();
        assert_eq!(io.size().unwrap(), 4096);
    }

    #[test]
    fn test_file_block_io_fsync_does_not_error() {
        let tmp = NamedTempFile::new().unwrap();
        let io = FileBlockIo::open(tmp.path()).unwrap();
        io.write_off(0, b"x").unwrap();
        assert!(io.fsync().is_ok());
    }

    #[test]
    fn test_mock_tracks_tracked_vs_untracked_frees() {
        let io = MockBlockIo::new(1024);
        io.free_tracked(0, 16).unwrap();
        io.free_untracked(16, 32).unwrap();
        assert_eq!(*io.tracked_frees.lock().unwrap(), vec![(0, 16)]);
        assert_eq!(*io.untracked_frees.lock().unwrap(), vec![(16, 32)]);
    }

    #[test]
    fn test_mock_read_past_end_errors() {
        let io = MockBlockIo::new(8);
        assert!(io.read_off(4, 16).is_err());
    }
}
