//! Remote-lock control attribute
//!
//! Text form of the remote-lock field for admin tools: reads render as
//! `remote lock : [ON]` / `[OFF]`, writes take a number where anything
//! non-zero engages the lock.

use crate::cache::WriteOutcome;
use crate::registry::{ParamField, REMOTE_LOCK_MAGIC};
use crate::store::ParamStore;
use devparam_common::{Error, Result};
use tracing::info;

/// Render the remote-lock state
pub fn show_remote_lock(store: &ParamStore) -> Result<String> {
    let lock = store.get_u32(ParamField::RemoteLock)?;
    Ok(format!("remote lock : [{}]\n", on_off(lock != 0)))
}

/// Apply a numeric toggle to the remote lock
///
/// Leading whitespace and a sign are accepted, trailing text after the
/// number is ignored.
pub fn store_remote_lock(store: &ParamStore, input: &str) -> Result<WriteOutcome> {
    let toggle = parse_leading_int(input)
        .ok_or_else(|| Error::invalid_value(format!("not a number: {:?}", input.trim())))?;
    let value = if toggle != 0 { REMOTE_LOCK_MAGIC } else { 0 };

    info!("remote lock [{}]", on_off(value != 0));
    store.set_u32(ParamField::RemoteLock, value)
}

const fn on_off(on: bool) -> &'static str {
    if on { "ON" } else { "OFF" }
}

fn parse_leading_int(input: &str) -> Option<i64> {
    let s = input.trim_start();
    let digits_start = usize::from(s.starts_with(['+', '-']));
    let digits_len = s[digits_start..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits_len == 0 {
        return None;
    }
    s[..digits_start + digits_len].parse().ok()
}
