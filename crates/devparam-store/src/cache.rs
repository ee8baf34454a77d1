//! Parameter cache
//!
//! The cache owns the in-memory mirror of the parameter block and the
//! dispatcher that moves it to and from the partition. Every access runs
//! inside [`ParameterCache::with_loaded`], which holds one mutex across the
//! whole sequence:
//!
//! ```text
//! Idle -> Loading (full read) -> FieldAccess -> [Flushing (full write)] -> Idle
//! ```
//!
//! The mirror is reloaded from disk on every call, so nothing another
//! writer put on the partition is ever shadowed by a stale copy.

use crate::dispatcher::{Dispatcher, DispatcherStats};
use crate::layout::{PARAM_BLOCK_SIZE, ParameterBlock};
use crate::raw_io::TransferRequest;
use crate::registry::{FieldDescriptor, Location};
use devparam_common::{Error, Result};
use parking_lot::Mutex;
use tracing::{info, warn};

/// What happened to a write
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The value was stored
    Applied,
    /// The field's validator refused the value; the stored value is unchanged
    Ignored,
}

/// Mirror of the parameter block plus its I/O path
pub struct ParameterCache {
    block: Mutex<Option<ParameterBlock>>,
    dispatcher: Dispatcher,
    block_offset: u64,
}

impl ParameterCache {
    /// Create a cache for the block at `block_offset`. Nothing is read yet.
    pub const fn new(dispatcher: Dispatcher, block_offset: u64) -> Self {
        Self {
            block: Mutex::new(None),
            dispatcher,
            block_offset,
        }
    }

    /// Get transfer statistics
    pub fn stats(&self) -> &DispatcherStats {
        self.dispatcher.stats()
    }

    /// Lock, reload the block, and run `f` against it
    ///
    /// If the reload fails `f` is not called and the error is returned.
    pub fn with_loaded<R>(
        &self,
        f: impl FnOnce(&mut CacheSession<'_>) -> Result<R>,
    ) -> Result<R> {
        let mut slot = self.block.lock();
        let block = self.ensure_loaded(&mut slot)?;

        let mut session = CacheSession {
            block,
            dispatcher: &self.dispatcher,
            block_offset: self.block_offset,
        };
        f(&mut session)
    }

    fn ensure_loaded<'a>(
        &self,
        slot: &'a mut Option<ParameterBlock>,
    ) -> Result<&'a mut ParameterBlock> {
        if slot.is_none() {
            *slot = Some(ParameterBlock::try_new()?);
        }
        let block = slot
            .as_mut()
            .ok_or_else(|| Error::internal("parameter block not allocated"))?;

        info!("param load start");
        let image = self
            .dispatcher
            .submit(TransferRequest::read(self.block_offset, PARAM_BLOCK_SIZE))?;
        block.load(&image.buf)?;
        info!("param load end");

        Ok(block)
    }

    /// Stop the I/O worker once in-flight work is done
    pub fn shutdown(&mut self) {
        self.dispatcher.shutdown();
    }
}

/// A loaded parameter block, valid while the cache lock is held
pub struct CacheSession<'a> {
    block: &'a mut ParameterBlock,
    dispatcher: &'a Dispatcher,
    block_offset: u64,
}

impl CacheSession<'_> {
    /// Read one field
    ///
    /// Block fields come from the freshly loaded mirror. Out-of-band records
    /// are read straight from the partition.
    pub fn read_field(&self, descriptor: &FieldDescriptor) -> Result<Vec<u8>> {
        match descriptor.location {
            Location::Block(span) => Ok(self.block.field(span).to_vec()),
            Location::OutOfBand { offset, size } => {
                let record = self.dispatcher.submit(TransferRequest::read(offset, size))?;
                Ok(record.buf)
            }
        }
    }

    /// Write one field
    ///
    /// `value` must already be padded to the field size. Block fields are
    /// copied into the mirror and the whole block is written back, even when
    /// the field's validator refused the value. Out-of-band records are
    /// written straight to the partition.
    pub fn write_field(
        &mut self,
        descriptor: &FieldDescriptor,
        value: Vec<u8>,
    ) -> Result<WriteOutcome> {
        match descriptor.location {
            Location::Block(span) => {
                let outcome = if descriptor.accepts(&value) {
                    self.block.field_mut(span).copy_from_slice(&value);
                    WriteOutcome::Applied
                } else {
                    warn!(field = %descriptor.field, "rejected value, keeping stored value");
                    WriteOutcome::Ignored
                };
                self.flush()?;
                Ok(outcome)
            }
            Location::OutOfBand { offset, .. } => {
                self.dispatcher.submit(TransferRequest::write(offset, value))?;
                Ok(WriteOutcome::Applied)
            }
        }
    }

    /// Write the whole mirror back to its base offset
    pub fn flush(&self) -> Result<()> {
        info!("param flush start");
        self.dispatcher.submit(TransferRequest::write(
            self.block_offset,
            self.block.as_bytes().to_vec(),
        ))?;
        info!("param flush end");
        Ok(())
    }
}
