//! devparam Store - Block-backed device parameter store
//!
//! This crate implements the parameter store including:
//! - Raw partition transfers (read-only / `O_SYNC` opens, one per transfer)
//! - A single I/O worker that turns transfers into blocking calls
//! - The fixed parameter block layout and field registry
//! - A lock-protected cache that reloads and writes back the whole block
//! - The `get`/`set` accessor API and the remote-lock attribute

pub mod attr;
pub mod cache;
pub mod dispatcher;
pub mod layout;
pub mod raw_io;
pub mod registry;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use attr::{show_remote_lock, store_remote_lock};
pub use cache::{ParameterCache, WriteOutcome};
pub use dispatcher::{Dispatcher, DispatcherStats};
pub use layout::{PARAM_BLOCK_SIZE, ParameterBlock};
pub use raw_io::{BackingStore, RawRegion, RegionHandle, TransferRequest};
pub use registry::{
    FieldDescriptor, FieldKind, FieldRegistry, Location, ParamField, REMOTE_LOCK_MAGIC,
};
pub use store::{ParamStore, SALES_CODE_LEN};
