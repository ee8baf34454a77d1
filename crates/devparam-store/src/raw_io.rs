//! Raw parameter-region I/O
//!
//! A transfer is one open/seek/read-or-write/close sequence against the
//! parameter partition:
//! - Reads open the region read-only
//! - Writes open it read-write with `O_SYNC`, so a completed write has been
//!   handed to the device rather than parked in the page cache
//!
//! The region is reopened for every transfer and closed when the handle
//! drops. Nothing here retries.

use devparam_common::{Direction, Error, Result};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

/// An open handle on the backing region, valid for one transfer
pub trait RegionHandle: Read + Write + Seek + Send {}

impl<T: Read + Write + Seek + Send> RegionHandle for T {}

/// Something that can be opened for a single transfer
pub trait BackingStore: Send + Sync + 'static {
    /// Open the region in the mode required by `direction`
    fn open(&self, direction: Direction) -> Result<Box<dyn RegionHandle>>;

    /// Human-readable location for log lines
    fn describe(&self) -> String;
}

/// Parameter partition addressed by path (block device or image file)
#[derive(Clone, Debug)]
pub struct RawRegion {
    path: PathBuf,
}

impl RawRegion {
    /// Create a region for the given path. Nothing is opened until a transfer runs.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Get the region path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BackingStore for RawRegion {
    fn open(&self, direction: Direction) -> Result<Box<dyn RegionHandle>> {
        let mut options = OpenOptions::new();
        options.read(true);

        if direction == Direction::Write {
            options.write(true);

            #[cfg(unix)]
            {
                options.custom_flags(libc::O_SYNC);
            }
        }

        let file = options.open(&self.path).map_err(|source| Error::Open {
            path: self.path.clone(),
            direction,
            source,
        })?;

        Ok(Box::new(file))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// One transfer: `buf.len()` bytes at `offset`, in `direction`
///
/// The request owns its buffer. For reads the buffer is the destination and
/// is only replaced once the whole read has succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub offset: u64,
    pub direction: Direction,
    pub buf: Vec<u8>,
}

impl TransferRequest {
    /// Read `size` bytes at `offset`
    #[must_use]
    pub fn read(offset: u64, size: usize) -> Self {
        Self {
            offset,
            direction: Direction::Read,
            buf: vec![0u8; size],
        }
    }

    /// Write `data` at `offset`
    #[must_use]
    pub const fn write(offset: u64, data: Vec<u8>) -> Self {
        Self {
            offset,
            direction: Direction::Write,
            buf: data,
        }
    }

    /// Transfer size in bytes
    #[must_use]
    pub fn size(&self) -> usize {
        self.buf.len()
    }
}

/// Run one transfer against `store`
///
/// Open and seek failures are logged and returned without touching the
/// request buffer.
pub fn execute(store: &dyn BackingStore, request: &mut TransferRequest) -> Result<()> {
    let TransferRequest {
        offset, direction, ..
    } = *request;
    let size = request.size();

    debug!(offset, size, %direction, "param transfer start");

    let mut handle = store.open(direction).inspect_err(|e| {
        error!("param region {} open failed: {}", store.describe(), e);
    })?;

    handle
        .seek(SeekFrom::Start(offset))
        .map_err(|source| Error::Seek { offset, source })
        .inspect_err(|e| error!("param region {}: {}", store.describe(), e))?;

    let transfer_err = |source| Error::Transfer {
        direction,
        offset,
        size,
        source,
    };

    match direction {
        Direction::Read => {
            let mut data = vec![0u8; size];
            handle.read_exact(&mut data).map_err(transfer_err)?;
            request.buf = data;
        }
        Direction::Write => {
            handle.write_all(&request.buf).map_err(transfer_err)?;
            handle.flush().map_err(transfer_err)?;
        }
    }

    debug!(offset, size, %direction, "param transfer done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn image(size: u64) -> NamedTempFile {
        let temp = NamedTempFile::new().unwrap();
        temp.as_file().set_len(size).unwrap();
        temp
    }

    #[test]
    fn test_write_then_read() {
        let temp = image(8192);
        let region = RawRegion::new(temp.path());

        let mut write = TransferRequest::write(4096, b"param data".to_vec());
        execute(&region, &mut write).unwrap();

        let mut read = TransferRequest::read(4096, 10);
        execute(&region, &mut read).unwrap();
        assert_eq!(read.buf, b"param data");

        // Bytes around the write are untouched
        let mut before = TransferRequest::read(4090, 6);
        execute(&region, &mut before).unwrap();
        assert_eq!(before.buf, vec![0u8; 6]);
    }

    #[test]
    fn test_open_failure_leaves_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let region = RawRegion::new(dir.path().join("missing.img"));

        let mut read = TransferRequest::read(0, 4);
        read.buf.copy_from_slice(b"keep");
        let err = execute(&region, &mut read).unwrap_err();

        assert!(matches!(err, Error::Open { direction: Direction::Read, .. }));
        assert_eq!(read.buf, b"keep");
    }

    #[test]
    fn test_write_does_not_create_region() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.img");
        let region = RawRegion::new(&path);

        let mut write = TransferRequest::write(0, vec![1, 2, 3]);
        assert!(execute(&region, &mut write).unwrap_err().is_io());
        assert!(!path.exists());
    }

    #[test]
    fn test_short_read_is_transfer_error() {
        let temp = image(16);
        let region = RawRegion::new(temp.path());

        let mut read = TransferRequest::read(8, 32);
        let err = execute(&region, &mut read).unwrap_err();

        assert!(matches!(err, Error::Transfer { size: 32, offset: 8, .. }));
        assert_eq!(read.buf, vec![0u8; 32]);
    }
}
