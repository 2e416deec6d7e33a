//! Type system: type and feature declarations, commit-time layout, subtype queries.
//!
//! A [`TypeSystem`] is built in a declare phase and then committed. After
//! commit it is immutable and is shared by every CAS created from it.

mod builtin_types;
mod error;
mod schema;
#[allow(clippy::module_inception)]
mod type_system;

pub use builtin_types::{names, Builtins};
pub use error::TypeSystemError;
pub use schema::{load_schema, save_schema, FeatureSchema, TypeSchema, TypeSystemSchema};
pub use type_system::{FeatureInfo, TypeInfo, TypeSystem};

use serde::{Deserialize, Serialize};

/// Handle to a type of a committed (or committing) type system.
///
/// Codes are only meaningful for the type system that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeCode(pub(crate) u32);

impl TypeCode {
    /// Returns the raw code as stored in heap records.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        (self.0 - 1) as usize
    }
}

/// Handle to a feature of a type system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureCode(pub(crate) u32);

impl FeatureCode {
    /// Returns the raw feature code.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        (self.0 - 1) as usize
    }
}

/// Primitive value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Short,
    Integer,
    Long,
    Float,
    Double,
    String,
}

impl PrimitiveKind {
    /// Human readable name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Integer => "integer",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::String => "string",
        }
    }
}

/// Element kind of an array type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Primitive(PrimitiveKind),
    Fs,
}

/// Storage class of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    /// Record with one slot per feature
    Fs,
    /// Primitive value type; appears only as a feature range
    Primitive(PrimitiveKind),
    /// Fixed-length array
    Array(ElementKind),
}

/// How a feature's slot is interpreted, derived from its range type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Primitive(PrimitiveKind),
    /// Reference to another feature structure (including arrays)
    Ref,
}

impl SlotKind {
    /// Human readable name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            SlotKind::Primitive(kind) => kind.name(),
            SlotKind::Ref => "reference",
        }
    }
}

pub(crate) fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

pub(crate) fn is_valid_type_name(name: &str) -> bool {
    !name.is_empty() && name.split('.').all(is_valid_identifier)
}

#[cfg(test)]
mod tests {
    include!("tests.rs");
}
