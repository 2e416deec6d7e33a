//! Type registry with a declare phase and an immutable committed phase.

use std::collections::HashMap;

use super::builtin_types::{self, Builtins};
use super::error::TypeSystemError;
use super::{
    is_valid_identifier, is_valid_type_name, ElementKind, FeatureCode, PrimitiveKind, SlotKind,
    TypeClass, TypeCode,
};

/// Metadata for one type.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// Fully qualified, dotted type name
    pub name: String,
    /// Code of this type
    pub code: TypeCode,
    /// Supertype; `None` only for the top type
    pub supertype: Option<TypeCode>,
    /// Storage class
    pub class: TypeClass,
    /// Declared by the type system itself
    pub builtin: bool,
    /// No subtypes may be declared
    pub inheritance_final: bool,
    /// No features may be declared
    pub feature_final: bool,
    /// Allowed values of a string subtype
    pub allowed_values: Option<Vec<String>>,
    declared: Vec<FeatureCode>,
    subtypes: Vec<TypeCode>,
    all_features: Vec<FeatureCode>,
    feature_index: HashMap<String, FeatureCode>,
    pre_order: u32,
    last_descendant: u32,
}

/// Metadata for one feature.
#[derive(Debug, Clone)]
pub struct FeatureInfo {
    /// Short feature name
    pub name: String,
    /// Code of this feature
    pub code: FeatureCode,
    /// Declaring type
    pub domain: TypeCode,
    /// Range type
    pub range: TypeCode,
    /// Slot interpretation derived from the range
    pub slot: SlotKind,
    offset: usize,
}

/// Registry of types and features.
///
/// Declarations are only accepted before [`TypeSystem::commit`]. Commit
/// computes feature offsets and the pre-order numbering used for constant
/// time subtype checks; afterwards the type system is read-only and can be
/// shared across threads behind an `Arc`.
#[derive(Debug, Clone)]
pub struct TypeSystem {
    types: Vec<TypeInfo>,
    features: Vec<FeatureInfo>,
    type_names: HashMap<String, TypeCode>,
    preorder: Vec<TypeCode>,
    committed: bool,
    builtins: Builtins,
}

impl Default for TypeSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeSystem {
    /// Creates an uncommitted type system containing only the built-in types.
    pub fn new() -> Self {
        let mut ts = Self {
            types: Vec::new(),
            features: Vec::new(),
            type_names: HashMap::new(),
            preorder: Vec::new(),
            committed: false,
            builtins: Builtins::unresolved(),
        };
        ts.builtins = builtin_types::register_builtin_types(&mut ts);
        ts
    }

    /// Returns `true` once [`TypeSystem::commit`] has run.
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Codes of the built-in types and features.
    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    pub(crate) fn declare_builtin(
        &mut self,
        name: &str,
        supertype: Option<TypeCode>,
        class: TypeClass,
        inheritance_final: bool,
        feature_final: bool,
    ) -> TypeCode {
        self.push_type(name, supertype, class, true, inheritance_final, feature_final, None)
    }

    pub(crate) fn declare_builtin_feature(
        &mut self,
        domain: TypeCode,
        name: &str,
        range: TypeCode,
    ) -> FeatureCode {
        self.push_feature(domain, name, range)
    }

    #[allow(clippy::too_many_arguments)]
    fn push_type(
        &mut self,
        name: &str,
        supertype: Option<TypeCode>,
        class: TypeClass,
        builtin: bool,
        inheritance_final: bool,
        feature_final: bool,
        allowed_values: Option<Vec<String>>,
    ) -> TypeCode {
        let code = TypeCode(self.types.len() as u32 + 1);
        self.types.push(TypeInfo {
            name: name.to_string(),
            code,
            supertype,
            class,
            builtin,
            inheritance_final,
            feature_final,
            allowed_values,
            declared: Vec::new(),
            subtypes: Vec::new(),
            all_features: Vec::new(),
            feature_index: HashMap::new(),
            pre_order: 0,
            last_descendant: 0,
        });
        if let Some(parent) = supertype {
            self.types[parent.index()].subtypes.push(code);
        }
        self.type_names.insert(name.to_string(), code);
        code
    }

    fn push_feature(&mut self, domain: TypeCode, name: &str, range: TypeCode) -> FeatureCode {
        let code = FeatureCode(self.features.len() as u32 + 1);
        let slot = match self.types[range.index()].class {
            TypeClass::Primitive(kind) => SlotKind::Primitive(kind),
            TypeClass::Fs | TypeClass::Array(_) => SlotKind::Ref,
        };
        self.features.push(FeatureInfo {
            name: name.to_string(),
            code,
            domain,
            range,
            slot,
            offset: 0,
        });
        self.types[domain.index()].declared.push(code);
        code
    }

    /// Declares a new type.
    ///
    /// # Arguments
    /// * `name` - Fully qualified type name, e.g. `org.example.Token`
    /// * `supertype` - Name of an already declared supertype
    ///
    /// # Returns
    /// The code of the new type, or a `TypeSystemError` if the type system is
    /// committed, the name is invalid or taken, or the supertype is unknown or final.
    pub fn declare_type(&mut self, name: &str, supertype: &str) -> Result<TypeCode, TypeSystemError> {
        self.check_declarable(name)?;
        let parent = self
            .type_by_name(supertype)
            .ok_or_else(|| TypeSystemError::UnknownSupertype {
                type_name: name.to_string(),
                supertype: supertype.to_string(),
            })?;
        let parent_info = self.info(parent);
        if parent_info.inheritance_final || parent_info.class != TypeClass::Fs {
            return Err(TypeSystemError::InheritanceFinal {
                supertype: supertype.to_string(),
            });
        }
        Ok(self.push_type(name, Some(parent), TypeClass::Fs, false, false, false, None))
    }

    /// Declares a subtype of `uima.cas.String` restricted to `allowed_values`.
    pub fn declare_string_subtype(
        &mut self,
        name: &str,
        allowed_values: &[&str],
    ) -> Result<TypeCode, TypeSystemError> {
        self.check_declarable(name)?;
        let values = allowed_values.iter().map(|v| v.to_string()).collect();
        Ok(self.push_type(
            name,
            Some(self.builtins.string),
            TypeClass::Primitive(PrimitiveKind::String),
            false,
            true,
            true,
            Some(values),
        ))
    }

    fn check_declarable(&self, name: &str) -> Result<(), TypeSystemError> {
        if self.committed {
            return Err(TypeSystemError::Committed);
        }
        if !is_valid_type_name(name) {
            return Err(TypeSystemError::InvalidName {
                name: name.to_string(),
            });
        }
        if self.type_names.contains_key(name) {
            return Err(TypeSystemError::TypeAlreadyDeclared {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Declares a feature on `domain` with range type `range`.
    ///
    /// Fails if the name is already visible on `domain` (own or inherited) or
    /// is declared on any subtype of `domain`, since both would end up in the
    /// same record.
    pub fn declare_feature(
        &mut self,
        domain: TypeCode,
        name: &str,
        range: TypeCode,
    ) -> Result<FeatureCode, TypeSystemError> {
        if self.committed {
            return Err(TypeSystemError::Committed);
        }
        if !is_valid_identifier(name) {
            return Err(TypeSystemError::InvalidName {
                name: name.to_string(),
            });
        }
        let domain_info = self.info(domain);
        if domain_info.feature_final || domain_info.class != TypeClass::Fs {
            return Err(TypeSystemError::FeatureFinal {
                type_name: domain_info.name.clone(),
            });
        }
        if self.feature_by_name(domain, name).is_some() || self.subtree_declares(domain, name) {
            return Err(TypeSystemError::FeatureAlreadyDeclared {
                type_name: domain_info.name.clone(),
                feature: name.to_string(),
            });
        }
        Ok(self.push_feature(domain, name, range))
    }

    /// Declares a feature using type names for domain and range.
    pub fn declare_feature_by_name(
        &mut self,
        domain: &str,
        name: &str,
        range: &str,
    ) -> Result<FeatureCode, TypeSystemError> {
        let domain = self.require_type(domain)?;
        let range = self.require_type(range)?;
        self.declare_feature(domain, name, range)
    }

    fn subtree_declares(&self, root: TypeCode, name: &str) -> bool {
        let mut stack: Vec<TypeCode> = self.info(root).subtypes.clone();
        while let Some(t) = stack.pop() {
            let info = self.info(t);
            if info
                .declared
                .iter()
                .any(|f| self.features[f.index()].name == name)
            {
                return true;
            }
            stack.extend_from_slice(&info.subtypes);
        }
        false
    }

    /// Seals the type system and computes feature offsets.
    ///
    /// # Returns
    /// `Err(TypeSystemError::Committed)` if already committed.
    pub fn commit(&mut self) -> Result<(), TypeSystemError> {
        if self.committed {
            return Err(TypeSystemError::Committed);
        }
        let top = self.builtins.top;

        // Pre-order walk; children are pushed in reverse so that declaration
        // order is kept among siblings.
        let mut order = Vec::with_capacity(self.types.len());
        let mut stack = vec![top];
        while let Some(t) = stack.pop() {
            order.push(t);
            for sub in self.info(t).subtypes.iter().rev() {
                stack.push(*sub);
            }
        }
        if order.len() != self.types.len() {
            let orphan = self
                .types
                .iter()
                .find(|info| !order.contains(&info.code))
                .map(|info| info.name.clone())
                .unwrap_or_default();
            return Err(TypeSystemError::CyclicSupertype { type_name: orphan });
        }

        for (position, t) in order.iter().enumerate() {
            let info = &mut self.types[t.index()];
            info.pre_order = position as u32;
            info.last_descendant = position as u32;
        }
        for t in order.iter().rev() {
            let last = self
                .info(*t)
                .subtypes
                .iter()
                .map(|sub| self.info(*sub).last_descendant)
                .max()
                .unwrap_or(0)
                .max(self.info(*t).pre_order);
            self.types[t.index()].last_descendant = last;
        }

        // Parents precede children in pre-order, so inherited features are ready.
        for t in &order {
            let mut all = match self.info(*t).supertype {
                Some(parent) => self.info(parent).all_features.clone(),
                None => Vec::new(),
            };
            let inherited = all.len();
            let declared = self.info(*t).declared.clone();
            for (i, f) in declared.iter().enumerate() {
                self.features[f.index()].offset = inherited + i + 1;
            }
            all.extend(declared);
            let index = all
                .iter()
                .map(|f| (self.features[f.index()].name.clone(), *f))
                .collect();
            let info = &mut self.types[t.index()];
            info.all_features = all;
            info.feature_index = index;
        }

        self.preorder = order;
        self.committed = true;
        tracing::debug!(
            "Committed type system with {} types and {} features",
            self.types.len(),
            self.features.len()
        );
        Ok(())
    }

    pub(crate) fn info(&self, t: TypeCode) -> &TypeInfo {
        &self.types[t.index()]
    }

    /// Returns the type metadata.
    ///
    /// # Panics
    /// Panics if `t` was issued by a different, larger type system.
    pub fn type_info(&self, t: TypeCode) -> &TypeInfo {
        self.info(t)
    }

    /// Returns the feature metadata.
    ///
    /// # Panics
    /// Panics if `f` was issued by a different, larger type system.
    pub fn feature_info(&self, f: FeatureCode) -> &FeatureInfo {
        &self.features[f.index()]
    }

    /// Looks up a type by its fully qualified name.
    pub fn type_by_name(&self, name: &str) -> Option<TypeCode> {
        self.type_names.get(name).copied()
    }

    /// Looks up a type by name, failing with `UnknownType`.
    pub fn require_type(&self, name: &str) -> Result<TypeCode, TypeSystemError> {
        self.type_by_name(name)
            .ok_or_else(|| TypeSystemError::UnknownType {
                name: name.to_string(),
            })
    }

    /// Converts a raw heap cell back to a type code.
    pub fn type_from_raw(&self, raw: i32) -> Option<TypeCode> {
        if raw >= 1 && (raw as usize) <= self.types.len() {
            Some(TypeCode(raw as u32))
        } else {
            None
        }
    }

    /// Number of declared types, built-ins included.
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// All type codes in declaration order.
    pub fn types(&self) -> impl Iterator<Item = TypeCode> + '_ {
        self.types.iter().map(|info| info.code)
    }

    pub fn type_name(&self, t: TypeCode) -> &str {
        &self.info(t).name
    }

    pub fn supertype(&self, t: TypeCode) -> Option<TypeCode> {
        self.info(t).supertype
    }

    pub fn type_class(&self, t: TypeCode) -> TypeClass {
        self.info(t).class
    }

    /// Direct subtypes in declaration order.
    pub fn direct_subtypes(&self, t: TypeCode) -> &[TypeCode] {
        &self.info(t).subtypes
    }

    /// Returns `true` if `sub` equals `sup` or inherits from it.
    ///
    /// Constant time after commit, proportional to the depth of `sub` before.
    pub fn is_subtype(&self, sub: TypeCode, sup: TypeCode) -> bool {
        if sub == sup {
            return true;
        }
        if self.committed {
            let sub_info = self.info(sub);
            let sup_info = self.info(sup);
            return sup_info.pre_order <= sub_info.pre_order
                && sub_info.pre_order <= sup_info.last_descendant;
        }
        let mut current = self.info(sub).supertype;
        while let Some(t) = current {
            if t == sup {
                return true;
            }
            current = self.info(t).supertype;
        }
        false
    }

    /// Pre-order interval `[first, last]` covering `t` and all its subtypes.
    pub(crate) fn subtype_range(&self, t: TypeCode) -> (u32, u32) {
        let info = self.info(t);
        (info.pre_order, info.last_descendant)
    }

    pub(crate) fn pre_order(&self, t: TypeCode) -> u32 {
        self.info(t).pre_order
    }

    /// Types in pre-order; empty before commit.
    pub(crate) fn preorder(&self) -> &[TypeCode] {
        &self.preorder
    }

    /// Finds a feature visible on `t`, own or inherited.
    pub fn feature_by_name(&self, t: TypeCode, name: &str) -> Option<FeatureCode> {
        if self.committed {
            return self.info(t).feature_index.get(name).copied();
        }
        let mut current = Some(t);
        while let Some(c) = current {
            let info = self.info(c);
            if let Some(f) = info
                .declared
                .iter()
                .find(|f| self.features[f.index()].name == name)
            {
                return Some(*f);
            }
            current = info.supertype;
        }
        None
    }

    /// Finds a feature visible on `t`, failing with `UnknownFeature`.
    pub fn require_feature(&self, t: TypeCode, name: &str) -> Result<FeatureCode, TypeSystemError> {
        self.feature_by_name(t, name)
            .ok_or_else(|| TypeSystemError::UnknownFeature {
                type_name: self.type_name(t).to_string(),
                feature: name.to_string(),
            })
    }

    pub fn feature_name(&self, f: FeatureCode) -> &str {
        &self.feature_info(f).name
    }

    /// Returns `domain:name`, the qualified feature name.
    pub fn feature_full_name(&self, f: FeatureCode) -> String {
        let info = self.feature_info(f);
        format!("{}:{}", self.type_name(info.domain), info.name)
    }

    pub fn feature_domain(&self, f: FeatureCode) -> TypeCode {
        self.feature_info(f).domain
    }

    pub fn feature_range(&self, f: FeatureCode) -> TypeCode {
        self.feature_info(f).range
    }

    pub fn slot_kind(&self, f: FeatureCode) -> SlotKind {
        self.feature_info(f).slot
    }

    /// Slot offset of `f` within a record; the type code occupies offset 0.
    pub fn feature_offset(&self, f: FeatureCode) -> Result<usize, TypeSystemError> {
        if !self.committed {
            return Err(TypeSystemError::NotCommitted);
        }
        Ok(self.feature_info(f).offset)
    }

    /// Offset of `f`; only meaningful after commit.
    #[inline]
    pub(crate) fn offset_unchecked(&self, f: FeatureCode) -> usize {
        self.features[f.index()].offset
    }

    /// All features of `t` in offset order, inherited ones first.
    pub fn features_of(&self, t: TypeCode) -> Result<&[FeatureCode], TypeSystemError> {
        if !self.committed {
            return Err(TypeSystemError::NotCommitted);
        }
        Ok(&self.info(t).all_features)
    }

    /// Features declared directly on `t`.
    pub fn declared_features(&self, t: TypeCode) -> &[FeatureCode] {
        &self.info(t).declared
    }

    /// Record size in cells for a non-array type (header included).
    pub(crate) fn record_size(&self, t: TypeCode) -> usize {
        1 + self.info(t).all_features.len()
    }

    /// Element kind if `t` is an array type.
    pub fn array_element_kind(&self, t: TypeCode) -> Option<ElementKind> {
        match self.info(t).class {
            TypeClass::Array(element) => Some(element),
            _ => None,
        }
    }

    /// Returns `true` if `value` may be stored in a feature ranging over `t`.
    pub fn is_allowed_string(&self, t: TypeCode, value: &str) -> bool {
        match &self.info(t).allowed_values {
            Some(values) => values.iter().any(|v| v == value),
            None => true,
        }
    }
}
