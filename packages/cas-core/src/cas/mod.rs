//! The Common Analysis Structure: heaps, typed feature access and indexes of one document.
//!
//! A [`Cas`] owns its heaps and index repository exclusively and shares an
//! immutable, committed [`TypeSystem`] with other CAS instances. It is not
//! internally synchronized; move it between threads or wrap it in a lock.

mod annotations;
mod arrays;
mod indexing;
mod lifecycle;
mod value;

pub use value::FeatureValue;

use std::sync::Arc;

use crate::config::CasConfig;
use crate::error::CasError;
use crate::heap::{Addr, AuxHeap, Heap, StringHeap};
use crate::index::{IndexComparator, IndexDefinition, IndexKind, IndexRepository, KeySource};
use crate::types::{
    FeatureCode, PrimitiveKind, SlotKind, TypeClass, TypeCode, TypeSystem, TypeSystemError,
};

/// Feature-structure store for one document.
#[derive(Debug, Clone)]
pub struct Cas {
    ts: Arc<TypeSystem>,
    config: CasConfig,
    heap: Heap,
    strings: StringHeap,
    /// Boolean and byte array storage
    bytes: AuxHeap<i8>,
    shorts: AuxHeap<i16>,
    /// Long and double features and arrays
    longs: AuxHeap<i64>,
    indexes: IndexRepository,
    sofa: Option<Addr>,
}

impl Cas {
    /// Creates a CAS with the default configuration and the built-in indexes.
    ///
    /// # Returns
    /// `Err(CasError::TypeSystem)` if the type system is not committed.
    pub fn new(ts: Arc<TypeSystem>) -> Result<Self, CasError> {
        Self::with_config(ts, CasConfig::default())
    }

    /// Creates a CAS with the given configuration and the built-in indexes.
    pub fn with_config(ts: Arc<TypeSystem>, config: CasConfig) -> Result<Self, CasError> {
        Self::with_indexes(ts, config, &[])
    }

    /// Creates a CAS whose index repository holds `definitions` in addition
    /// to the built-in indexes, and commits the repository.
    ///
    /// # Arguments
    /// * `ts` - Committed type system
    /// * `config` - Heap sizing
    /// * `definitions` - Additional index definitions
    ///
    /// # Returns
    /// `Err` if the type system is not committed, the configuration is
    /// invalid, or a definition is rejected.
    pub fn with_indexes(
        ts: Arc<TypeSystem>,
        config: CasConfig,
        definitions: &[IndexDefinition],
    ) -> Result<Self, CasError> {
        let mut cas = Self::uncommitted(ts, config)?;
        for def in definitions {
            if !cas.indexes.add_definition(def)? {
                tracing::warn!("Index '{}' defined twice, keeping the first definition", def.label);
            }
        }
        cas.indexes.commit()?;
        Ok(cas)
    }

    /// Creates a CAS whose index repository still accepts definitions.
    ///
    /// Call [`Cas::create_index`] as needed, then [`Cas::commit_indexes`]
    /// before adding feature structures to indexes.
    pub fn uncommitted(ts: Arc<TypeSystem>, config: CasConfig) -> Result<Self, CasError> {
        if !ts.is_committed() {
            return Err(TypeSystemError::NotCommitted.into());
        }
        config.validate()?;
        let aux = config.initial_aux_heap_size;
        Ok(Self {
            heap: Heap::new(config.initial_heap_size),
            strings: StringHeap::new(aux),
            bytes: AuxHeap::new(aux),
            shorts: AuxHeap::new(aux),
            longs: AuxHeap::new(aux),
            indexes: IndexRepository::new(ts.clone()),
            sofa: None,
            ts,
            config,
        })
    }

    /// Defines an index; only valid before [`Cas::commit_indexes`].
    ///
    /// # Returns
    /// `Ok(false)` if `label` is already in use.
    pub fn create_index(
        &mut self,
        comparator: IndexComparator,
        label: &str,
        kind: IndexKind,
    ) -> Result<bool, CasError> {
        self.indexes.create_index(comparator, label, kind)
    }

    /// Freezes index definitions.
    pub fn commit_indexes(&mut self) -> Result<(), CasError> {
        self.indexes.commit()
    }

    pub fn type_system(&self) -> &Arc<TypeSystem> {
        &self.ts
    }

    pub fn config(&self) -> &CasConfig {
        &self.config
    }

    pub fn index_repository(&self) -> &IndexRepository {
        &self.indexes
    }

    pub(crate) fn key_source(&self) -> KeySource<'_> {
        KeySource {
            ts: self.ts.as_ref(),
            heap: &self.heap,
            strings: &self.strings,
            longs: &self.longs,
        }
    }

    /// Runtime type of the feature structure at `addr`.
    ///
    /// # Returns
    /// `Err(CasError::InvalidAddress)` if `addr` is not an allocated record.
    pub fn type_of(&self, addr: Addr) -> Result<TypeCode, CasError> {
        if !self.heap.contains(addr.cell()) {
            return Err(CasError::InvalidAddress { addr: addr.as_u32() });
        }
        self.ts
            .type_from_raw(self.heap.get(addr.cell()))
            .ok_or(CasError::InvalidAddress { addr: addr.as_u32() })
    }

    /// Creates a feature structure of type `t` with all slots at their defaults.
    ///
    /// Arrays are created with [`Cas::create_array`]; primitive types and
    /// the Sofa cannot be created directly.
    pub fn create(&mut self, t: TypeCode) -> Result<Addr, CasError> {
        let reason = match self.ts.type_class(t) {
            TypeClass::Primitive(_) => Some("primitive type"),
            TypeClass::Array(_) => Some("use create_array"),
            TypeClass::Fs if t == self.ts.builtins().array_base => Some("abstract array type"),
            TypeClass::Fs if t == self.ts.builtins().sofa => Some("sofas are managed by the CAS"),
            TypeClass::Fs => None,
        };
        if let Some(reason) = reason {
            return Err(CasError::TypeNotCreatable {
                type_name: self.ts.type_name(t).to_string(),
                reason,
            });
        }
        self.alloc_record(t)
    }

    /// Creates a feature structure by type name.
    pub fn create_by_name(&mut self, type_name: &str) -> Result<Addr, CasError> {
        let t = self.ts.require_type(type_name)?;
        self.create(t)
    }

    fn alloc_record(&mut self, t: TypeCode) -> Result<Addr, CasError> {
        let cell = self.heap.alloc(self.ts.record_size(t))?;
        self.heap.set(cell, t.as_u32() as i32);
        tracing::trace!("Created {} at {}", self.ts.type_name(t), cell);
        Ok(Addr(cell as u32))
    }

    /// Resolves a feature by name on the runtime type of `addr`.
    pub fn feature(&self, addr: Addr, name: &str) -> Result<FeatureCode, CasError> {
        let t = self.type_of(addr)?;
        self.ts
            .feature_by_name(t, name)
            .ok_or_else(|| CasError::FeatureMissing {
                type_name: self.ts.type_name(t).to_string(),
                feature: name.to_string(),
            })
    }

    /// Cell of feature `f` in the record at `addr`, after checking that the
    /// runtime type of the record has the feature.
    fn feature_cell(&self, addr: Addr, f: FeatureCode) -> Result<usize, CasError> {
        let t = self.type_of(addr)?;
        let domain = self.ts.feature_domain(f);
        if self.ts.type_class(t) != TypeClass::Fs || !self.ts.is_subtype(t, domain) {
            return Err(CasError::FeatureMissing {
                type_name: self.ts.type_name(t).to_string(),
                feature: self.ts.feature_full_name(f),
            });
        }
        Ok(addr.cell() + self.ts.offset_unchecked(f))
    }

    /// Like `feature_cell`, additionally checking the slot kind.
    fn typed_cell(&self, addr: Addr, f: FeatureCode, kind: SlotKind) -> Result<usize, CasError> {
        let cell = self.feature_cell(addr, f)?;
        if self.ts.slot_kind(f) != kind {
            return Err(self.wrong_access(f, kind.name()));
        }
        Ok(cell)
    }

    fn wrong_access(&self, f: FeatureCode, accessed: &'static str) -> CasError {
        CasError::WrongTypeAccess {
            feature: self.ts.feature_full_name(f),
            range: self.ts.type_name(self.ts.feature_range(f)).to_string(),
            accessed,
        }
    }

    pub fn get_int(&self, addr: Addr, f: FeatureCode) -> Result<i32, CasError> {
        let cell = self.typed_cell(addr, f, SlotKind::Primitive(PrimitiveKind::Integer))?;
        Ok(self.heap.get(cell))
    }

    pub fn set_int(&mut self, addr: Addr, f: FeatureCode, value: i32) -> Result<(), CasError> {
        let cell = self.typed_cell(addr, f, SlotKind::Primitive(PrimitiveKind::Integer))?;
        self.heap.set(cell, value);
        Ok(())
    }

    pub fn get_float(&self, addr: Addr, f: FeatureCode) -> Result<f32, CasError> {
        let cell = self.typed_cell(addr, f, SlotKind::Primitive(PrimitiveKind::Float))?;
        Ok(f32::from_bits(self.heap.get(cell) as u32))
    }

    pub fn set_float(&mut self, addr: Addr, f: FeatureCode, value: f32) -> Result<(), CasError> {
        let cell = self.typed_cell(addr, f, SlotKind::Primitive(PrimitiveKind::Float))?;
        self.heap.set(cell, value.to_bits() as i32);
        Ok(())
    }

    pub fn get_bool(&self, addr: Addr, f: FeatureCode) -> Result<bool, CasError> {
        let cell = self.typed_cell(addr, f, SlotKind::Primitive(PrimitiveKind::Boolean))?;
        Ok(self.heap.get(cell) != 0)
    }

    pub fn set_bool(&mut self, addr: Addr, f: FeatureCode, value: bool) -> Result<(), CasError> {
        let cell = self.typed_cell(addr, f, SlotKind::Primitive(PrimitiveKind::Boolean))?;
        self.heap.set(cell, value as i32);
        Ok(())
    }

    pub fn get_byte(&self, addr: Addr, f: FeatureCode) -> Result<i8, CasError> {
        let cell = self.typed_cell(addr, f, SlotKind::Primitive(PrimitiveKind::Byte))?;
        Ok(self.heap.get(cell) as i8)
    }

    pub fn set_byte(&mut self, addr: Addr, f: FeatureCode, value: i8) -> Result<(), CasError> {
        let cell = self.typed_cell(addr, f, SlotKind::Primitive(PrimitiveKind::Byte))?;
        self.heap.set(cell, value as i32);
        Ok(())
    }

    pub fn get_short(&self, addr: Addr, f: FeatureCode) -> Result<i16, CasError> {
        let cell = self.typed_cell(addr, f, SlotKind::Primitive(PrimitiveKind::Short))?;
        Ok(self.heap.get(cell) as i16)
    }

    pub fn set_short(&mut self, addr: Addr, f: FeatureCode, value: i16) -> Result<(), CasError> {
        let cell = self.typed_cell(addr, f, SlotKind::Primitive(PrimitiveKind::Short))?;
        self.heap.set(cell, value as i32);
        Ok(())
    }

    pub fn get_long(&self, addr: Addr, f: FeatureCode) -> Result<i64, CasError> {
        let cell = self.typed_cell(addr, f, SlotKind::Primitive(PrimitiveKind::Long))?;
        Ok(self.longs.get(self.heap.get(cell) as usize))
    }

    pub fn set_long(&mut self, addr: Addr, f: FeatureCode, value: i64) -> Result<(), CasError> {
        let cell = self.typed_cell(addr, f, SlotKind::Primitive(PrimitiveKind::Long))?;
        self.store_long(cell, value)
    }

    pub fn get_double(&self, addr: Addr, f: FeatureCode) -> Result<f64, CasError> {
        let cell = self.typed_cell(addr, f, SlotKind::Primitive(PrimitiveKind::Double))?;
        Ok(f64::from_bits(self.longs.get(self.heap.get(cell) as usize) as u64))
    }

    pub fn set_double(&mut self, addr: Addr, f: FeatureCode, value: f64) -> Result<(), CasError> {
        let cell = self.typed_cell(addr, f, SlotKind::Primitive(PrimitiveKind::Double))?;
        self.store_long(cell, value.to_bits() as i64)
    }

    /// Writes a 64-bit value behind a slot, reusing the long-heap entry if
    /// the slot already has one.
    fn store_long(&mut self, cell: usize, value: i64) -> Result<(), CasError> {
        match self.heap.get(cell) {
            0 => {
                let index = self.longs.push(value);
                self.heap.set(cell, aux_ref(index)?);
            }
            index => self.longs.set(index as usize, value),
        }
        Ok(())
    }

    pub fn get_string(&self, addr: Addr, f: FeatureCode) -> Result<Option<&str>, CasError> {
        let cell = self.typed_cell(addr, f, SlotKind::Primitive(PrimitiveKind::String))?;
        Ok(self.strings.get(self.heap.get(cell) as usize))
    }

    /// Sets a string feature.
    ///
    /// # Returns
    /// `Err(CasError::IllegalStringValue)` if the range is a string subtype
    /// that does not allow `value`.
    pub fn set_string(
        &mut self,
        addr: Addr,
        f: FeatureCode,
        value: Option<&str>,
    ) -> Result<(), CasError> {
        let cell = self.typed_cell(addr, f, SlotKind::Primitive(PrimitiveKind::String))?;
        if let Some(v) = value {
            let range = self.ts.feature_range(f);
            if !self.ts.is_allowed_string(range, v) {
                return Err(CasError::IllegalStringValue {
                    type_name: self.ts.type_name(range).to_string(),
                    value: v.to_string(),
                });
            }
        }
        let index = self.strings.add(value);
        self.heap.set(cell, aux_ref(index)?);
        Ok(())
    }

    pub fn get_ref(&self, addr: Addr, f: FeatureCode) -> Result<Option<Addr>, CasError> {
        let cell = self.typed_cell(addr, f, SlotKind::Ref)?;
        Ok(Addr::from_slot(self.heap.get(cell)))
    }

    /// Sets a reference feature.
    ///
    /// The target must be a live feature structure whose type is the
    /// feature's range or a subtype of it.
    pub fn set_ref(
        &mut self,
        addr: Addr,
        f: FeatureCode,
        target: Option<Addr>,
    ) -> Result<(), CasError> {
        let cell = self.typed_cell(addr, f, SlotKind::Ref)?;
        if let Some(target) = target {
            let target_type = self.type_of(target)?;
            if !self.ts.is_subtype(target_type, self.ts.feature_range(f)) {
                return Err(self.wrong_access(f, "incompatible reference"));
            }
        }
        self.heap.set(cell, Addr::to_slot(target));
        Ok(())
    }

    /// Reads any feature as a [`FeatureValue`].
    pub fn get_value(&self, addr: Addr, f: FeatureCode) -> Result<FeatureValue, CasError> {
        Ok(match self.ts.slot_kind(f) {
            SlotKind::Primitive(PrimitiveKind::Boolean) => FeatureValue::Boolean(self.get_bool(addr, f)?),
            SlotKind::Primitive(PrimitiveKind::Byte) => FeatureValue::Byte(self.get_byte(addr, f)?),
            SlotKind::Primitive(PrimitiveKind::Short) => FeatureValue::Short(self.get_short(addr, f)?),
            SlotKind::Primitive(PrimitiveKind::Integer) => FeatureValue::Integer(self.get_int(addr, f)?),
            SlotKind::Primitive(PrimitiveKind::Long) => FeatureValue::Long(self.get_long(addr, f)?),
            SlotKind::Primitive(PrimitiveKind::Float) => FeatureValue::Float(self.get_float(addr, f)?),
            SlotKind::Primitive(PrimitiveKind::Double) => FeatureValue::Double(self.get_double(addr, f)?),
            SlotKind::Primitive(PrimitiveKind::String) => {
                FeatureValue::String(self.get_string(addr, f)?.map(str::to_string))
            }
            SlotKind::Ref => FeatureValue::Ref(self.get_ref(addr, f)?),
        })
    }

    /// Writes any feature from a [`FeatureValue`] of the matching kind.
    pub fn set_value(
        &mut self,
        addr: Addr,
        f: FeatureCode,
        value: &FeatureValue,
    ) -> Result<(), CasError> {
        if !value.fits_slot(self.ts.slot_kind(f)) {
            // Report a missing feature before a kind mismatch.
            self.feature_cell(addr, f)?;
            return Err(self.wrong_access(f, value.kind_name()));
        }
        match value {
            FeatureValue::Boolean(v) => self.set_bool(addr, f, *v),
            FeatureValue::Byte(v) => self.set_byte(addr, f, *v),
            FeatureValue::Short(v) => self.set_short(addr, f, *v),
            FeatureValue::Integer(v) => self.set_int(addr, f, *v),
            FeatureValue::Long(v) => self.set_long(addr, f, *v),
            FeatureValue::Float(v) => self.set_float(addr, f, *v),
            FeatureValue::Double(v) => self.set_double(addr, f, *v),
            FeatureValue::String(v) => self.set_string(addr, f, v.as_deref()),
            FeatureValue::Ref(v) => self.set_ref(addr, f, *v),
        }
    }

    /// Current main heap size in cells.
    pub fn heap_size(&self) -> usize {
        self.heap.size()
    }

    /// Cells in use on the main heap, including the reserved null cell.
    pub fn heap_used(&self) -> usize {
        self.heap.used()
    }

    /// Every live record in allocation order.
    ///
    /// Walks the heap from the first cell using record sizes; the walk is
    /// only meaningful because records are never freed individually.
    pub fn all_fs(&self) -> impl Iterator<Item = Addr> + '_ {
        let mut cell = 1;
        std::iter::from_fn(move || {
            if !self.heap.contains(cell) {
                return None;
            }
            let addr = Addr(cell as u32);
            let t = self.ts.type_from_raw(self.heap.get(cell))?;
            cell += self.record_len(addr, t);
            Some(addr)
        })
    }

    fn record_len(&self, addr: Addr, t: TypeCode) -> usize {
        match self.ts.type_class(t) {
            TypeClass::Array(element) => arrays::record_len(element, self.heap.get(addr.cell() + 1)),
            _ => self.ts.record_size(t),
        }
    }
}

/// Converts an auxiliary heap index into a slot value.
fn aux_ref(index: usize) -> Result<i32, CasError> {
    i32::try_from(index).map_err(|_| CasError::HeapExhausted { requested: index })
}

#[cfg(test)]
mod tests {
    include!("tests.rs");
}
