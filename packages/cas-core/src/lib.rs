//! Common Analysis Structure: a typed feature-structure store for annotation pipelines.
//!
//! Provides the type system, heap-backed feature structures, sorted/set/bag
//! indexes with iterators, XMI serialization with shared ID tables, and the
//! reset lifecycle used to reuse a CAS across documents.

pub mod cas;
pub mod config;
pub mod error;
pub mod heap;
pub mod index;
pub mod serialization;
pub mod types;

pub use cas::{Cas, FeatureValue};
pub use config::CasConfig;
pub use error::CasError;
pub use heap::Addr;
pub use index::{FsIndex, FsIterator, IndexComparator, IndexDefinition, IndexKind, SortOrder};
pub use types::{FeatureCode, TypeCode, TypeSystem};
