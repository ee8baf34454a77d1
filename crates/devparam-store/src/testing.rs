//! Instrumented in-memory backing store for tests
//!
//! Every open marks a transfer window that closes when the handle drops.
//! Windows that overlap are counted, so tests can assert that transfers
//! never run concurrently.

use crate::raw_io::{BackingStore, RegionHandle};
use devparam_common::config::{Config, NadConfig};
use devparam_common::{Direction, Error, Result};
use parking_lot::Mutex;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Region size used by [`test_config`]
pub const TEST_REGION_SIZE: usize = 0x4000;

/// Config laid out inside a [`TEST_REGION_SIZE`] region
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.store.block_offset = 0x1000;
    config.fields.nad = Some(NadConfig {
        record_offset: 0x2000,
        ddr_result_offset: 0x3000,
    });
    config
}

#[derive(Default)]
struct Inner {
    data: Mutex<Vec<u8>>,
    active: AtomicUsize,
    overlaps: AtomicUsize,
    opens: AtomicUsize,
    open_attempts: AtomicUsize,
    fail_open: AtomicBool,
    delay_ms: AtomicU64,
    log: Mutex<Vec<(Direction, u64, usize)>>,
}

/// Cloneable handle on a shared in-memory region
#[derive(Clone, Default)]
pub struct MemoryRegion {
    inner: Arc<Inner>,
}

impl MemoryRegion {
    /// Zero-filled region of `size` bytes
    pub fn new(size: usize) -> Self {
        let region = Self::default();
        *region.inner.data.lock() = vec![0u8; size];
        region
    }

    /// Sleep this long inside every read and write
    pub fn set_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.inner.delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Make every open fail until cleared
    pub fn set_fail_open(&self, fail: bool) {
        self.inner.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Successful opens so far
    pub fn opens(&self) -> usize {
        self.inner.opens.load(Ordering::SeqCst)
    }

    /// Opens attempted so far, including failed ones
    pub fn open_attempts(&self) -> usize {
        self.inner.open_attempts.load(Ordering::SeqCst)
    }

    /// Transfer windows that started while another was still open
    pub fn overlaps(&self) -> usize {
        self.inner.overlaps.load(Ordering::SeqCst)
    }

    /// (direction, offset, size) of every read or write body, in order
    pub fn transfers(&self) -> Vec<(Direction, u64, usize)> {
        self.inner.log.lock().clone()
    }

    /// Copy of `len` bytes at `offset`
    pub fn bytes(&self, offset: usize, len: usize) -> Vec<u8> {
        self.inner.data.lock()[offset..offset + len].to_vec()
    }

    /// Overwrite bytes behind the store's back
    pub fn poke(&self, offset: usize, bytes: &[u8]) {
        self.inner.data.lock()[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}

impl BackingStore for MemoryRegion {
    fn open(&self, direction: Direction) -> Result<Box<dyn RegionHandle>> {
        self.inner.open_attempts.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_open.load(Ordering::SeqCst) {
            return Err(Error::Open {
                path: PathBuf::from("memory"),
                direction,
                source: io::Error::from(io::ErrorKind::NotFound),
            });
        }

        self.inner.opens.fetch_add(1, Ordering::SeqCst);
        if self.inner.active.fetch_add(1, Ordering::SeqCst) != 0 {
            self.inner.overlaps.fetch_add(1, Ordering::SeqCst);
        }

        Ok(Box::new(MemoryHandle {
            inner: Arc::clone(&self.inner),
            pos: 0,
            direction,
        }))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

struct MemoryHandle {
    inner: Arc<Inner>,
    pos: u64,
    direction: Direction,
}

impl MemoryHandle {
    fn pause(&self) {
        let millis = self.inner.delay_ms.load(Ordering::SeqCst);
        if millis > 0 {
            std::thread::sleep(Duration::from_millis(millis));
        }
    }

    fn record(&self, len: usize) {
        self.inner.log.lock().push((self.direction, self.pos, len));
    }
}

impl Read for MemoryHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.pause();
        self.record(buf.len());
        let data = self.inner.data.lock();
        let start = usize::try_from(self.pos).unwrap_or(usize::MAX).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Write for MemoryHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.direction == Direction::Read {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        self.pause();
        self.record(buf.len());
        let mut data = self.inner.data.lock();
        let start = usize::try_from(self.pos).unwrap_or(usize::MAX).min(data.len());
        let n = buf.len().min(data.len() - start);
        data[start..start + n].copy_from_slice(&buf[..n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.inner.data.lock().len() as i64;
        let target = match pos {
            SeekFrom::Start(offset) => i64::try_from(offset).unwrap_or(i64::MAX),
            SeekFrom::End(delta) => len + delta,
            SeekFrom::Current(delta) => self.pos as i64 + delta,
        };
        if target < 0 {
            return Err(io::Error::from(io::ErrorKind::InvalidInput));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        self.inner.active.fetch_sub(1, Ordering::SeqCst);
    }
}
