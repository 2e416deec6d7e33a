//! Fixed-length arrays.
//!
//! Integer, float, string and FS arrays store their elements inline after
//! the length cell. Boolean, byte, short, long and double arrays keep a
//! single cell pointing at their first element on the matching auxiliary heap.

use super::{aux_ref, Cas, FeatureValue};
use crate::error::CasError;
use crate::heap::Addr;
use crate::types::{ElementKind, PrimitiveKind, TypeCode};

/// Returns `true` if elements of `element` live on the main heap.
pub(crate) fn is_inline(element: ElementKind) -> bool {
    matches!(
        element,
        ElementKind::Fs
            | ElementKind::Primitive(PrimitiveKind::Integer)
            | ElementKind::Primitive(PrimitiveKind::Float)
            | ElementKind::Primitive(PrimitiveKind::String)
    )
}

/// Record length in cells of an array with `length` elements.
pub(crate) fn record_len(element: ElementKind, length: i32) -> usize {
    if is_inline(element) {
        2 + length.max(0) as usize
    } else {
        3
    }
}

impl Cas {
    /// Creates an array of type `t` with `length` default elements.
    ///
    /// # Returns
    /// `Err(CasError::TypeNotCreatable)` if `t` is not an array type.
    pub fn create_array(&mut self, t: TypeCode, length: usize) -> Result<Addr, CasError> {
        let element = self
            .ts
            .array_element_kind(t)
            .ok_or_else(|| CasError::TypeNotCreatable {
                type_name: self.ts.type_name(t).to_string(),
                reason: "not an array type",
            })?;
        let len_cell = i32::try_from(length)
            .map_err(|_| CasError::HeapExhausted { requested: length })?;
        let cell = self.heap.alloc(record_len(element, len_cell))?;
        self.heap.set(cell, t.as_u32() as i32);
        self.heap.set(cell + 1, len_cell);
        if !is_inline(element) {
            let start = match element {
                ElementKind::Primitive(PrimitiveKind::Boolean | PrimitiveKind::Byte) => {
                    self.bytes.alloc(length)
                }
                ElementKind::Primitive(PrimitiveKind::Short) => self.shorts.alloc(length),
                _ => self.longs.alloc(length),
            };
            self.heap.set(cell + 2, aux_ref(start)?);
        }
        Ok(Addr(cell as u32))
    }

    /// Creates an array holding the given element kind.
    pub fn create_array_of(&mut self, element: ElementKind, length: usize) -> Result<Addr, CasError> {
        let t = self.ts.builtins().array_type(element);
        self.create_array(t, length)
    }

    /// Creates an integer array initialised from `values`.
    pub fn create_int_array(&mut self, values: &[i32]) -> Result<Addr, CasError> {
        let addr =
            self.create_array_of(ElementKind::Primitive(PrimitiveKind::Integer), values.len())?;
        self.heap
            .slice_mut(addr.cell() + 2, values.len())
            .copy_from_slice(values);
        Ok(addr)
    }

    /// Creates an FS array initialised from `values`.
    pub fn create_fs_array(&mut self, values: &[Option<Addr>]) -> Result<Addr, CasError> {
        let addr = self.create_array_of(ElementKind::Fs, values.len())?;
        for (i, value) in values.iter().enumerate() {
            self.array_set_ref(addr, i, *value)?;
        }
        Ok(addr)
    }

    /// Creates a string array initialised from `values`.
    pub fn create_string_array(&mut self, values: &[Option<&str>]) -> Result<Addr, CasError> {
        let addr =
            self.create_array_of(ElementKind::Primitive(PrimitiveKind::String), values.len())?;
        for (i, value) in values.iter().enumerate() {
            self.array_set_string(addr, i, *value)?;
        }
        Ok(addr)
    }

    /// Element kind and length of the array at `addr`.
    fn array_header(&self, addr: Addr) -> Result<(ElementKind, usize), CasError> {
        let t = self.type_of(addr)?;
        let element = self
            .ts
            .array_element_kind(t)
            .ok_or_else(|| CasError::WrongTypeAccess {
                feature: "array element".to_string(),
                range: self.ts.type_name(t).to_string(),
                accessed: "array",
            })?;
        Ok((element, self.heap.get(addr.cell() + 1) as usize))
    }

    /// Element kind of the array at `addr`.
    pub fn array_element_kind(&self, addr: Addr) -> Result<ElementKind, CasError> {
        self.array_header(addr).map(|(element, _)| element)
    }

    /// Number of elements of the array at `addr`.
    pub fn array_len(&self, addr: Addr) -> Result<usize, CasError> {
        self.array_header(addr).map(|(_, length)| length)
    }

    /// Heap or aux-heap position of element `index`, bounds-checked.
    fn element_pos(
        &self,
        addr: Addr,
        index: usize,
        accessed: ElementKind,
    ) -> Result<usize, CasError> {
        let (element, length) = self.array_header(addr)?;
        if element != accessed {
            return Err(CasError::WrongTypeAccess {
                feature: "array element".to_string(),
                range: self.ts.type_name(self.type_of(addr)?).to_string(),
                accessed: match accessed {
                    ElementKind::Fs => "reference",
                    ElementKind::Primitive(kind) => kind.name(),
                },
            });
        }
        if index >= length {
            return Err(CasError::Capacity { index, length });
        }
        Ok(if is_inline(element) {
            addr.cell() + 2 + index
        } else {
            self.heap.get(addr.cell() + 2) as usize + index
        })
    }

    pub fn array_get_int(&self, addr: Addr, index: usize) -> Result<i32, CasError> {
        let pos = self.element_pos(addr, index, ElementKind::Primitive(PrimitiveKind::Integer))?;
        Ok(self.heap.get(pos))
    }

    pub fn array_set_int(&mut self, addr: Addr, index: usize, value: i32) -> Result<(), CasError> {
        let pos = self.element_pos(addr, index, ElementKind::Primitive(PrimitiveKind::Integer))?;
        self.heap.set(pos, value);
        Ok(())
    }

    pub fn array_get_float(&self, addr: Addr, index: usize) -> Result<f32, CasError> {
        let pos = self.element_pos(addr, index, ElementKind::Primitive(PrimitiveKind::Float))?;
        Ok(f32::from_bits(self.heap.get(pos) as u32))
    }

    pub fn array_set_float(&mut self, addr: Addr, index: usize, value: f32) -> Result<(), CasError> {
        let pos = self.element_pos(addr, index, ElementKind::Primitive(PrimitiveKind::Float))?;
        self.heap.set(pos, value.to_bits() as i32);
        Ok(())
    }

    pub fn array_get_string(&self, addr: Addr, index: usize) -> Result<Option<&str>, CasError> {
        let pos = self.element_pos(addr, index, ElementKind::Primitive(PrimitiveKind::String))?;
        Ok(self.strings.get(self.heap.get(pos) as usize))
    }

    pub fn array_set_string(
        &mut self,
        addr: Addr,
        index: usize,
        value: Option<&str>,
    ) -> Result<(), CasError> {
        let pos = self.element_pos(addr, index, ElementKind::Primitive(PrimitiveKind::String))?;
        let string = self.strings.add(value);
        self.heap.set(pos, aux_ref(string)?);
        Ok(())
    }

    pub fn array_get_ref(&self, addr: Addr, index: usize) -> Result<Option<Addr>, CasError> {
        let pos = self.element_pos(addr, index, ElementKind::Fs)?;
        Ok(Addr::from_slot(self.heap.get(pos)))
    }

    /// Sets an FS array element; the target must be a live feature structure.
    pub fn array_set_ref(
        &mut self,
        addr: Addr,
        index: usize,
        value: Option<Addr>,
    ) -> Result<(), CasError> {
        let pos = self.element_pos(addr, index, ElementKind::Fs)?;
        if let Some(target) = value {
            self.type_of(target)?;
        }
        self.heap.set(pos, Addr::to_slot(value));
        Ok(())
    }

    /// Reads any array element as a [`FeatureValue`].
    pub fn array_get(&self, addr: Addr, index: usize) -> Result<FeatureValue, CasError> {
        let element = self.array_element_kind(addr)?;
        let pos = self.element_pos(addr, index, element)?;
        Ok(match element {
            ElementKind::Fs => FeatureValue::Ref(Addr::from_slot(self.heap.get(pos))),
            ElementKind::Primitive(kind) => match kind {
                PrimitiveKind::Boolean => FeatureValue::Boolean(self.bytes.get(pos) != 0),
                PrimitiveKind::Byte => FeatureValue::Byte(self.bytes.get(pos)),
                PrimitiveKind::Short => FeatureValue::Short(self.shorts.get(pos)),
                PrimitiveKind::Integer => FeatureValue::Integer(self.heap.get(pos)),
                PrimitiveKind::Long => FeatureValue::Long(self.longs.get(pos)),
                PrimitiveKind::Float => {
                    FeatureValue::Float(f32::from_bits(self.heap.get(pos) as u32))
                }
                PrimitiveKind::Double => {
                    FeatureValue::Double(f64::from_bits(self.longs.get(pos) as u64))
                }
                PrimitiveKind::String => FeatureValue::String(
                    self.strings.get(self.heap.get(pos) as usize).map(str::to_string),
                ),
            },
        })
    }

    /// Writes any array element from a [`FeatureValue`] of the element kind.
    pub fn array_set(
        &mut self,
        addr: Addr,
        index: usize,
        value: &FeatureValue,
    ) -> Result<(), CasError> {
        let element = self.array_element_kind(addr)?;
        if !value.fits_element(element) {
            return Err(CasError::WrongTypeAccess {
                feature: "array element".to_string(),
                range: self.ts.type_name(self.type_of(addr)?).to_string(),
                accessed: value.kind_name(),
            });
        }
        match value {
            FeatureValue::Integer(v) => self.array_set_int(addr, index, *v),
            FeatureValue::Float(v) => self.array_set_float(addr, index, *v),
            FeatureValue::String(v) => self.array_set_string(addr, index, v.as_deref()),
            FeatureValue::Ref(v) => self.array_set_ref(addr, index, *v),
            FeatureValue::Boolean(v) => {
                let pos = self.element_pos(addr, index, element)?;
                self.bytes.set(pos, *v as i8);
                Ok(())
            }
            FeatureValue::Byte(v) => {
                let pos = self.element_pos(addr, index, element)?;
                self.bytes.set(pos, *v);
                Ok(())
            }
            FeatureValue::Short(v) => {
                let pos = self.element_pos(addr, index, element)?;
                self.shorts.set(pos, *v);
                Ok(())
            }
            FeatureValue::Long(v) => {
                let pos = self.element_pos(addr, index, element)?;
                self.longs.set(pos, *v);
                Ok(())
            }
            FeatureValue::Double(v) => {
                let pos = self.element_pos(addr, index, element)?;
                self.longs.set(pos, v.to_bits() as i64);
                Ok(())
            }
        }
    }

    /// Raw bytes of a boolean or byte array.
    pub fn array_bytes(&self, addr: Addr) -> Result<&[i8], CasError> {
        let (element, length) = self.array_header(addr)?;
        match element {
            ElementKind::Primitive(PrimitiveKind::Boolean | PrimitiveKind::Byte) => Ok(self
                .bytes
                .slice(self.heap.get(addr.cell() + 2) as usize, length)),
            _ => Err(CasError::WrongTypeAccess {
                feature: "array element".to_string(),
                range: self.ts.type_name(self.type_of(addr)?).to_string(),
                accessed: PrimitiveKind::Byte.name(),
            }),
        }
    }
}
