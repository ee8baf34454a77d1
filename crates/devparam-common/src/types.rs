//! Core types shared across devparam crates

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a single transfer against the backing store
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Copy bytes from the store into the request buffer
    Read,
    /// Copy the request buffer into the store
    Write,
}

impl Direction {
    /// Short lowercase name used in log lines and error messages
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::Read.to_string(), "read");
        assert_eq!(Direction::Write.to_string(), "write");
    }
}
