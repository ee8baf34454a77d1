//! devparam Common - Shared types and utilities
//!
//! This crate provides the error type, configuration structures and the
//! small set of types shared between the parameter store and its tools.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
