//! CAS error types.

use thiserror::Error;

use crate::types::TypeSystemError;

/// CAS operation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CasError {
    /// Invalid declaration or phase violation in the type system
    #[error(transparent)]
    TypeSystem(#[from] TypeSystemError),

    /// Feature not defined on the runtime type of the feature structure
    #[error("Feature '{feature}' is not defined on type '{type_name}'")]
    FeatureMissing { type_name: String, feature: String },

    /// Accessor does not match the range of the feature
    #[error("Wrong access to feature '{feature}': range is {range}, accessed as {accessed}")]
    WrongTypeAccess {
        feature: String,
        range: String,
        accessed: &'static str,
    },

    /// Address does not denote a live feature structure
    #[error("Invalid feature structure address {addr}")]
    InvalidAddress { addr: u32 },

    /// Type cannot be instantiated through this operation
    #[error("Type '{type_name}' cannot be created here: {reason}")]
    TypeNotCreatable {
        type_name: String,
        reason: &'static str,
    },

    /// Array index out of the declared array length
    #[error("Array index {index} out of bounds for array of length {length}")]
    Capacity { index: usize, length: usize },

    /// Heap cannot grow to the requested size
    #[error("Heap exhausted: {requested} cells requested")]
    HeapExhausted { requested: usize },

    /// Iterator accessed at an invalid position
    #[error("Iterator is not positioned on a valid element")]
    IteratorInvalidState,

    /// Corrupted external ID mapping or index state
    #[error("Index consistency error: {0}")]
    IndexConsistency(String),

    /// Index definitions can no longer change
    #[error("Index repository is committed")]
    IndexRepositoryCommitted,

    /// Index contents cannot change before definitions are committed
    #[error("Index repository is not committed")]
    IndexRepositoryNotCommitted,

    /// Index label not defined
    #[error("Index '{0}' not found")]
    IndexNotFound(String),

    /// Index definition rejected
    #[error("Invalid index definition '{label}': {message}")]
    InvalidIndexDefinition { label: String, message: String },

    /// Value outside the allowed values of a string subtype
    #[error("Value '{value}' is not allowed for string subtype '{type_name}'")]
    IllegalStringValue { type_name: String, value: String },

    /// Type name not known to the type system
    #[error("Unknown type '{0}'")]
    UnknownType(String),

    /// External ID not resolvable during deserialization
    #[error("Unknown xmi:id '{0}'")]
    UnknownId(String),

    /// Malformed or unsupported serialized data
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Checksum or structural mismatch in persisted data
    #[error("Data corruption detected: {0}")]
    DataCorruption(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for CasError {
    fn from(err: std::io::Error) -> Self {
        CasError::Io(err.to_string())
    }
}

/// Result alias for CAS operations.
pub type Result<T> = std::result::Result<T, CasError>;
