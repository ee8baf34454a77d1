//! Parameter store
//!
//! [`ParamStore`] is the one handle other subsystems use: power management,
//! telemetry, lock enforcement and diagnostics all read and write their
//! fields through `get`/`set`. Each call is a full reload of the parameter
//! block plus, for writes, a full write-back, all under the cache lock.

use crate::cache::{ParameterCache, WriteOutcome};
use crate::dispatcher::{Dispatcher, DispatcherStats};
use crate::raw_io::{BackingStore, RawRegion};
use crate::layout::{NAD_DDR_RESULT_SIZE, NAD_RECORD_SIZE, PARAM_BLOCK_SIZE};
use crate::registry::{FieldDescriptor, FieldKind, FieldRegistry, ParamField};
use devparam_common::{Config, Error, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Number of sales-code bytes compared by [`ParamStore::sales_code_is`]
pub const SALES_CODE_LEN: usize = 3;

/// Device parameter store
pub struct ParamStore {
    registry: FieldRegistry,
    cache: ParameterCache,
    sales_code: Option<String>,
}

impl ParamStore {
    /// Open the store on the partition named in `config`
    pub fn open(config: &Config) -> Result<Self> {
        let region = RawRegion::new(&config.store.device_path);
        Self::with_backing(config, Arc::new(region))
    }

    /// Open the store on an arbitrary backing region
    pub fn with_backing(config: &Config, backing: Arc<dyn BackingStore>) -> Result<Self> {
        info!(
            "param store on {} at offset {:#x}",
            backing.describe(),
            config.store.block_offset
        );

        check_layout(config)?;
        let dispatcher = Dispatcher::new(backing)?;
        Ok(Self {
            registry: FieldRegistry::new(&config.fields),
            cache: ParameterCache::new(dispatcher, config.store.block_offset),
            sales_code: config.boot.sales_code.clone(),
        })
    }

    /// Fields this store recognizes
    pub const fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    /// Transfer statistics
    pub fn stats(&self) -> &DispatcherStats {
        self.cache.stats()
    }

    /// Read a field
    pub fn get(&self, field: ParamField) -> Result<Vec<u8>> {
        let descriptor = self.registry.lookup(field)?;
        self.read(descriptor)
    }

    /// Read a field by raw index
    pub fn get_index(&self, index: u32) -> Result<Vec<u8>> {
        let descriptor = self.registry.lookup_index(index)?;
        self.read(descriptor)
    }

    /// Write a field
    ///
    /// Shorter values are zero-padded to the field size. A value refused by
    /// the field's validator is not an error: the stored value stays as it
    /// was and [`WriteOutcome::Ignored`] is returned.
    pub fn set(&self, field: ParamField, value: &[u8]) -> Result<WriteOutcome> {
        let descriptor = self.registry.lookup(field)?;
        self.write(descriptor, value)
    }

    /// Write a field by raw index
    pub fn set_index(&self, index: u32, value: &[u8]) -> Result<WriteOutcome> {
        let descriptor = self.registry.lookup_index(index)?;
        self.write(descriptor, value)
    }

    /// Read a u32 field
    ///
    /// Fails with [`Error::InvalidValue`] before any I/O if `field` is not a
    /// single u32.
    pub fn get_u32(&self, field: ParamField) -> Result<u32> {
        let descriptor = self.numeric(field)?;
        let bytes = self.read(descriptor)?;
        let raw = bytes
            .get(..4)
            .and_then(|b| <[u8; 4]>::try_from(b).ok())
            .ok_or_else(|| Error::internal(format!("{field} returned {} bytes", bytes.len())))?;
        Ok(u32::from_le_bytes(raw))
    }

    /// Write a u32 field
    pub fn set_u32(&self, field: ParamField, value: u32) -> Result<WriteOutcome> {
        let descriptor = self.numeric(field)?;
        self.write(descriptor, &value.to_le_bytes())
    }

    /// Read a string field, stopping at the first NUL
    pub fn get_text(&self, field: ParamField) -> Result<String> {
        let bytes = self.get(field)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// Compare the boot-time sales code with `prefix`
    ///
    /// Compares at most [`SALES_CODE_LEN`] bytes, stopping early at a NUL on
    /// both sides. Returns false when no sales code was supplied at boot.
    pub fn sales_code_is(&self, prefix: &str) -> bool {
        let Some(code) = self.sales_code.as_deref() else {
            return false;
        };
        info!("sales code: {}", code);
        prefix_matches(code.as_bytes(), prefix.as_bytes(), SALES_CODE_LEN)
    }

    /// Stop the I/O worker after in-flight transfers finish
    pub fn shutdown(mut self) {
        self.cache.shutdown();
    }

    fn numeric(&self, field: ParamField) -> Result<&FieldDescriptor> {
        let descriptor = self.registry.lookup(field)?;
        if descriptor.kind != FieldKind::U32 {
            return Err(Error::invalid_value(format!("{field} is not a u32 field")));
        }
        Ok(descriptor)
    }

    fn read(&self, descriptor: &FieldDescriptor) -> Result<Vec<u8>> {
        debug!(field = %descriptor.field, "param get");
        self.cache.with_loaded(|session| session.read_field(descriptor))
    }

    fn write(&self, descriptor: &FieldDescriptor, value: &[u8]) -> Result<WriteOutcome> {
        debug!(field = %descriptor.field, len = value.len(), "param set");
        // Size is checked before the lock so a bad value costs no I/O
        let padded = descriptor.pad(value)?;
        self.cache
            .with_loaded(|session| session.write_field(descriptor, padded))
    }
}

/// Reject configurations where the out-of-band records overlap the block or
/// each other
fn check_layout(config: &Config) -> Result<()> {
    let Some(nad) = config.fields.nad else {
        return Ok(());
    };

    let regions = [
        ("parameter block", config.store.block_offset, PARAM_BLOCK_SIZE),
        ("nad record", nad.record_offset, NAD_RECORD_SIZE),
        ("nad ddr result", nad.ddr_result_offset, NAD_DDR_RESULT_SIZE),
    ];
    for (i, &(a, a_start, a_len)) in regions.iter().enumerate() {
        for &(b, b_start, b_len) in &regions[i + 1..] {
            let a_end = a_start.saturating_add(a_len as u64);
            let b_end = b_start.saturating_add(b_len as u64);
            if a_start < b_end && b_start < a_end {
                return Err(Error::Configuration(format!(
                    "{a} at {a_start:#x} overlaps {b} at {b_start:#x}"
                )));
            }
        }
    }
    Ok(())
}

fn prefix_matches(a: &[u8], b: &[u8], n: usize) -> bool {
    for i in 0..n {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        if x != y {
            return false;
        }
        if x == 0 {
            break;
        }
    }
    true
}
