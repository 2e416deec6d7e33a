//! JSON schema for user-declared types, with checksummed persistence.

use std::fs;
use std::path::Path;

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

use super::error::TypeSystemError;
use super::type_system::TypeSystem;
use crate::error::CasError;

/// Current schema file version.
const SCHEMA_VERSION: u32 = 1;

/// Schema file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSystemSchema {
    /// Schema version
    pub version: u32,
    /// User types; built-in types are implied
    pub types: Vec<TypeSchema>,
    /// CRC32 of the canonical JSON of `types`
    #[serde(default)]
    pub checksum: Option<u32>,
}

/// One user type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSchema {
    /// Fully qualified type name
    pub name: String,
    /// Supertype name
    pub supertype: String,
    /// Declared features
    #[serde(default)]
    pub features: Vec<FeatureSchema>,
    /// Allowed values, present only for string subtypes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
}

/// One declared feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    /// Feature name
    pub name: String,
    /// Range type name
    pub range: String,
}

impl TypeSystem {
    /// Exports all non-built-in types in declaration order.
    pub fn to_schema(&self) -> TypeSystemSchema {
        let types = self
            .types()
            .map(|t| self.type_info(t))
            .filter(|info| !info.builtin)
            .map(|info| TypeSchema {
                name: info.name.clone(),
                supertype: info
                    .supertype
                    .map(|s| self.type_name(s).to_string())
                    .unwrap_or_default(),
                features: self
                    .declared_features(info.code)
                    .iter()
                    .map(|f| FeatureSchema {
                        name: self.feature_name(*f).to_string(),
                        range: self.type_name(self.feature_range(*f)).to_string(),
                    })
                    .collect(),
                allowed_values: info.allowed_values.clone(),
            })
            .collect();
        TypeSystemSchema {
            version: SCHEMA_VERSION,
            types,
            checksum: None,
        }
    }

    /// Builds an uncommitted type system from a schema.
    ///
    /// Types may be listed in any order. All types are declared before any
    /// feature so that features can range over types declared later.
    pub fn from_schema(schema: &TypeSystemSchema) -> Result<Self, TypeSystemError> {
        let mut ts = TypeSystem::new();
        let mut pending: Vec<&TypeSchema> = schema.types.iter().collect();

        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();
            for ty in pending {
                if ty.allowed_values.is_some() {
                    let values: Vec<&str> = ty
                        .allowed_values
                        .iter()
                        .flatten()
                        .map(String::as_str)
                        .collect();
                    ts.declare_string_subtype(&ty.name, &values)?;
                } else if ts.type_by_name(&ty.supertype).is_some() {
                    ts.declare_type(&ty.name, &ty.supertype)?;
                } else {
                    deferred.push(ty);
                }
            }
            if deferred.len() == before {
                let first = deferred[0];
                let waits_on_pending = deferred.iter().any(|t| t.name == first.supertype);
                return Err(if waits_on_pending {
                    TypeSystemError::CyclicSupertype {
                        type_name: first.name.clone(),
                    }
                } else {
                    TypeSystemError::UnknownSupertype {
                        type_name: first.name.clone(),
                        supertype: first.supertype.clone(),
                    }
                });
            }
            pending = deferred;
        }

        for ty in &schema.types {
            for feature in &ty.features {
                ts.declare_feature_by_name(&ty.name, &feature.name, &feature.range)?;
            }
        }
        Ok(ts)
    }
}

fn checksum_of(types: &[TypeSchema]) -> Result<u32, CasError> {
    let payload =
        serde_json::to_vec(types).map_err(|e| CasError::Serialization(e.to_string()))?;
    let mut hasher = Hasher::new();
    hasher.update(&payload);
    Ok(hasher.finalize())
}

/// Writes the schema of `ts` as pretty JSON with a checksum.
pub fn save_schema(ts: &TypeSystem, path: &Path) -> Result<(), CasError> {
    let mut schema = ts.to_schema();
    schema.checksum = Some(checksum_of(&schema.types)?);
    let json = serde_json::to_string_pretty(&schema)
        .map_err(|e| CasError::Serialization(e.to_string()))?;
    fs::write(path, json)?;
    tracing::debug!(
        "Saved schema with {} types to {}",
        schema.types.len(),
        path.display()
    );
    Ok(())
}

/// Reads a schema file and builds a committed type system.
///
/// # Returns
/// `Err(CasError::DataCorruption)` if the stored checksum does not match.
pub fn load_schema(path: &Path) -> Result<TypeSystem, CasError> {
    let json = fs::read_to_string(path)?;
    let schema: TypeSystemSchema =
        serde_json::from_str(&json).map_err(|e| CasError::Serialization(e.to_string()))?;
    if schema.version != SCHEMA_VERSION {
        return Err(CasError::Serialization(format!(
            "unsupported schema version {}",
            schema.version
        )));
    }
    if let Some(expected) = schema.checksum {
        let actual = checksum_of(&schema.types)?;
        if actual != expected {
            return Err(CasError::DataCorruption(format!(
                "schema checksum mismatch for {}: expected {:08x}, got {:08x}",
                path.display(),
                expected,
                actual
            )));
        }
    }
    let mut ts = TypeSystem::from_schema(&schema)?;
    ts.commit()?;
    Ok(ts)
}
