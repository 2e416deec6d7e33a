//! Comparators ordering feature structures inside sorted and set indexes.

use std::cmp::Ordering;

use crate::error::CasError;
use crate::heap::{Addr, AuxHeap, Heap, StringHeap};
use crate::types::{FeatureCode, PrimitiveKind, SlotKind, TypeCode, TypeSystem};

/// Direction of a feature key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Standard,
    Reverse,
}

/// One component of an index comparator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    /// Compare a primitive feature of the base type
    Feature {
        feature: FeatureCode,
        order: SortOrder,
    },
    /// Compare raw type codes, ascending
    TypeOrder,
}

/// Ordered list of sort keys over a base type.
///
/// Two feature structures are comparator-equal when every key compares
/// equal. Identical addresses always compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexComparator {
    type_code: TypeCode,
    keys: Vec<SortKey>,
}

impl IndexComparator {
    /// Creates a comparator without keys over `type_code`.
    ///
    /// Without keys all members of a sorted index tie and are ordered by
    /// address; a set index keeps a single member.
    pub fn new(type_code: TypeCode) -> Self {
        Self {
            type_code,
            keys: Vec::new(),
        }
    }

    /// Appends a feature key.
    pub fn with_key(mut self, feature: FeatureCode, order: SortOrder) -> Self {
        self.keys.push(SortKey::Feature { feature, order });
        self
    }

    /// Appends the type-order key.
    pub fn with_type_order(mut self) -> Self {
        self.keys.push(SortKey::TypeOrder);
        self
    }

    /// Default annotation ordering: begin ascending, end descending, type code ascending.
    pub fn annotation_default(ts: &TypeSystem) -> Self {
        let b = ts.builtins();
        Self::new(b.annotation)
            .with_key(b.begin, SortOrder::Standard)
            .with_key(b.end, SortOrder::Reverse)
            .with_type_order()
    }

    /// Base type of the index this comparator belongs to.
    pub fn type_code(&self) -> TypeCode {
        self.type_code
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// Checks that every key feature is a primitive feature visible on the base type.
    pub(crate) fn validate(&self, ts: &TypeSystem, label: &str) -> Result<(), CasError> {
        for key in &self.keys {
            if let SortKey::Feature { feature, .. } = key {
                let info = ts.feature_info(*feature);
                if !ts.is_subtype(self.type_code, info.domain) {
                    return Err(CasError::InvalidIndexDefinition {
                        label: label.to_string(),
                        message: format!(
                            "key feature '{}' is not defined on '{}'",
                            ts.feature_full_name(*feature),
                            ts.type_name(self.type_code)
                        ),
                    });
                }
                if info.slot == SlotKind::Ref {
                    return Err(CasError::InvalidIndexDefinition {
                        label: label.to_string(),
                        message: format!(
                            "key feature '{}' is not primitive",
                            ts.feature_full_name(*feature)
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Compares two members under the keys only.
    pub(crate) fn compare(&self, src: &KeySource<'_>, a: Addr, b: Addr) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        for key in &self.keys {
            let ord = match key {
                SortKey::Feature { feature, order } => {
                    let ord = src.compare_feature(a, b, *feature);
                    match order {
                        SortOrder::Standard => ord,
                        SortOrder::Reverse => ord.reverse(),
                    }
                }
                SortKey::TypeOrder => src.raw_type(a).cmp(&src.raw_type(b)),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Total order used by sorted indexes: keys, then address.
    pub(crate) fn compare_total(&self, src: &KeySource<'_>, a: Addr, b: Addr) -> Ordering {
        self.compare(src, a, b).then_with(|| a.cmp(&b))
    }
}

/// Read-only view of the heaps needed to evaluate sort keys.
#[derive(Clone, Copy)]
pub(crate) struct KeySource<'a> {
    pub(crate) ts: &'a TypeSystem,
    pub(crate) heap: &'a Heap,
    pub(crate) strings: &'a StringHeap,
    pub(crate) longs: &'a AuxHeap<i64>,
}

impl<'a> KeySource<'a> {
    #[inline]
    pub(crate) fn raw_type(&self, addr: Addr) -> i32 {
        self.heap.get(addr.cell())
    }

    /// Runtime type of a member; members are always valid records.
    pub(crate) fn type_of(&self, addr: Addr) -> Option<TypeCode> {
        self.ts.type_from_raw(self.raw_type(addr))
    }

    fn compare_feature(&self, a: Addr, b: Addr, feature: FeatureCode) -> Ordering {
        let info = self.ts.feature_info(feature);
        let offset = self.ts.offset_unchecked(feature);
        let va = self.heap.get(a.cell() + offset);
        let vb = self.heap.get(b.cell() + offset);
        match info.slot {
            SlotKind::Primitive(PrimitiveKind::Float) => {
                f32::from_bits(va as u32).total_cmp(&f32::from_bits(vb as u32))
            }
            SlotKind::Primitive(PrimitiveKind::Long) => self
                .longs
                .get(va as usize)
                .cmp(&self.longs.get(vb as usize)),
            SlotKind::Primitive(PrimitiveKind::Double) => {
                let da = f64::from_bits(self.longs.get(va as usize) as u64);
                let db = f64::from_bits(self.longs.get(vb as usize) as u64);
                da.total_cmp(&db)
            }
            SlotKind::Primitive(PrimitiveKind::String) => self
                .strings
                .get(va as usize)
                .cmp(&self.strings.get(vb as usize)),
            SlotKind::Primitive(_) => va.cmp(&vb),
            SlotKind::Ref => Ordering::Equal,
        }
    }
}
