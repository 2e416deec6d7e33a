//! Index repository, comparators and iterators.
//!
//! Indexes hold heap addresses only. A sorted or set index orders its members
//! with an [`IndexComparator`]; a bag index keeps insertion order.

mod comparator;
mod iterator;
mod repository;

pub use comparator::{IndexComparator, SortKey, SortOrder};
pub(crate) use comparator::KeySource;
pub use iterator::FsIterator;
pub use repository::{FsIndex, IndexDefinition, IndexRepository};

/// Index kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    /// Total order by comparator, ties broken by address
    Sorted,
    /// One member per comparator-equivalence class; first inserted wins
    Set,
    /// Insertion order, duplicates allowed
    Bag,
}

#[cfg(test)]
mod tests {
    include!("tests.rs");
}
