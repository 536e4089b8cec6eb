//! Handles for interned value identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Interned handle for a value identifier inside one registry
///
/// Handles are never reused: removing a value leaves its handle pointing at
/// an empty slot, and re-registering the same name yields the same handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId(pub u32);

impl ValueId {
    /// Create a new value handle
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw handle value
    pub fn raw(&self) -> u32 {
        self.0
    }

    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "value:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_id() {
        let id = ValueId::new(42);
        assert_eq!(id.raw(), 42);
        assert_eq!(id.index(), 42);
        assert_eq!(format!("{}", id), "value:42");
    }
}
