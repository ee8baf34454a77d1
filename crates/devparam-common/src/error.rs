//! Error types for devparam
//!
//! Every failure the parameter store can report is one variant here. I/O
//! failures carry the offending path or offset so a log line is enough to
//! locate the problem on the device.

use crate::types::Direction;
use std::path::PathBuf;
use thiserror::Error;

/// Common result type for devparam operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for devparam
#[derive(Debug, Error)]
pub enum Error {
    // Accessor errors
    #[error("unknown parameter field index: {0}")]
    UnknownField(u32),

    #[error("unknown parameter field name: {0}")]
    UnknownFieldName(String),

    #[error("value for {field} is {len} bytes, field holds {size}")]
    ValueTooLarge {
        field: &'static str,
        size: usize,
        len: usize,
    },

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("failed to allocate {size} bytes for the parameter block")]
    AllocationFailed { size: usize },

    // Backing store errors
    #[error("failed to open {} for {direction}: {source}", path.display())]
    Open {
        path: PathBuf,
        direction: Direction,
        #[source]
        source: std::io::Error,
    },

    #[error("seek to offset {offset:#x} failed: {source}")]
    Seek {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("{direction} of {size} bytes at offset {offset:#x} failed: {source}")]
    Transfer {
        direction: Direction,
        offset: u64,
        size: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("transfer worker is not running")]
    DispatcherClosed,

    // Internal errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an invalid value error
    pub fn invalid_value(msg: impl Into<String>) -> Self {
        Self::InvalidValue(msg.into())
    }

    /// Check if this error came from the backing store
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(
            self,
            Self::Open { .. } | Self::Seek { .. } | Self::Transfer { .. }
        )
    }

    /// Check if the caller asked for a field that is not recognized
    #[must_use]
    pub const fn is_unknown_field(&self) -> bool {
        matches!(self, Self::UnknownField(_) | Self::UnknownFieldName(_))
    }
}
