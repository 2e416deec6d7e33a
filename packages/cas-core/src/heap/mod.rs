//! Feature-structure storage.
//!
//! Each CAS owns:
//! - A main heap of `i32` cells holding fixed-size records `[type, slots...]`
//! - A string heap referenced by index from string slots
//! - Byte, short and long heaps for arrays and 64-bit values
//!
//! Address 0 is never allocated and stands for the null reference.

mod aux_heap;
mod cells;

pub use aux_heap::{AuxHeap, StringHeap};
pub use cells::Heap;

use std::fmt;

/// Address of a feature structure on the main heap.
///
/// Valid until the owning CAS is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Addr(pub(crate) u32);

impl Addr {
    /// Returns the raw cell index.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub(crate) fn cell(self) -> usize {
        self.0 as usize
    }

    /// Decodes a reference slot; 0 is null.
    pub(crate) fn from_slot(raw: i32) -> Option<Addr> {
        if raw > 0 {
            Some(Addr(raw as u32))
        } else {
            None
        }
    }

    /// Encodes an optional reference for a slot.
    pub(crate) fn to_slot(addr: Option<Addr>) -> i32 {
        addr.map(|a| a.0 as i32).unwrap_or(0)
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
