//! Monitor addressing.

use std::fmt;

/// Identifies one monitor as `(adapter_index, display_index)`.
///
/// Both numbers come straight from display enumeration and are only passed
/// through to the block-write primitive.  `Target` is `Copy` and is taken by
/// value everywhere, so no caller ever holds a reference into enumeration
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Target {
    /// Vendor adapter index.
    pub adapter_index: i32,
    /// Display index on that adapter.
    pub display_index: i32,
}

impl Target {
    pub const fn new(adapter_index: i32, display_index: i32) -> Self {
        Self {
            adapter_index,
            display_index,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.adapter_index, self.display_index)
    }
}
