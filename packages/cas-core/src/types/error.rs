/// Error type for type system declaration and lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeSystemError {
    #[error("Type system is committed; no further declarations allowed")]
    Committed,

    #[error("Type system is not committed")]
    NotCommitted,

    #[error("Invalid name '{name}'")]
    InvalidName { name: String },

    #[error("Type '{name}' already declared")]
    TypeAlreadyDeclared { name: String },

    #[error("Type '{name}' not found")]
    UnknownType { name: String },

    #[error("Supertype '{supertype}' of type '{type_name}' not found")]
    UnknownSupertype { type_name: String, supertype: String },

    #[error("Supertype chain of '{type_name}' is cyclic")]
    CyclicSupertype { type_name: String },

    #[error("Type '{supertype}' cannot be inherited from")]
    InheritanceFinal { supertype: String },

    #[error("Features cannot be declared on type '{type_name}'")]
    FeatureFinal { type_name: String },

    #[error("Feature '{feature}' already visible on type '{type_name}'")]
    FeatureAlreadyDeclared { type_name: String, feature: String },

    #[error("Feature '{feature}' not found on type '{type_name}'")]
    UnknownFeature { type_name: String, feature: String },
}
