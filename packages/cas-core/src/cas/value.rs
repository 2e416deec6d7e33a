use std::fmt;

use crate::heap::Addr;
use crate::types::{ElementKind, PrimitiveKind, SlotKind};

/// Value of a feature slot or array element.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(Option<String>),
    Ref(Option<Addr>),
}

impl FeatureValue {
    /// Name of the value kind, as used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FeatureValue::Boolean(_) => PrimitiveKind::Boolean.name(),
            FeatureValue::Byte(_) => PrimitiveKind::Byte.name(),
            FeatureValue::Short(_) => PrimitiveKind::Short.name(),
            FeatureValue::Integer(_) => PrimitiveKind::Integer.name(),
            FeatureValue::Long(_) => PrimitiveKind::Long.name(),
            FeatureValue::Float(_) => PrimitiveKind::Float.name(),
            FeatureValue::Double(_) => PrimitiveKind::Double.name(),
            FeatureValue::String(_) => PrimitiveKind::String.name(),
            FeatureValue::Ref(_) => SlotKind::Ref.name(),
        }
    }

    /// Returns `true` if the value can be stored in a slot of `kind`.
    pub fn fits_slot(&self, kind: SlotKind) -> bool {
        matches!(
            (self, kind),
            (FeatureValue::Boolean(_), SlotKind::Primitive(PrimitiveKind::Boolean))
                | (FeatureValue::Byte(_), SlotKind::Primitive(PrimitiveKind::Byte))
                | (FeatureValue::Short(_), SlotKind::Primitive(PrimitiveKind::Short))
                | (FeatureValue::Integer(_), SlotKind::Primitive(PrimitiveKind::Integer))
                | (FeatureValue::Long(_), SlotKind::Primitive(PrimitiveKind::Long))
                | (FeatureValue::Float(_), SlotKind::Primitive(PrimitiveKind::Float))
                | (FeatureValue::Double(_), SlotKind::Primitive(PrimitiveKind::Double))
                | (FeatureValue::String(_), SlotKind::Primitive(PrimitiveKind::String))
                | (FeatureValue::Ref(_), SlotKind::Ref)
        )
    }

    /// Returns `true` if the value can be stored in an array of `element`.
    pub fn fits_element(&self, element: ElementKind) -> bool {
        match element {
            ElementKind::Fs => self.fits_slot(SlotKind::Ref),
            ElementKind::Primitive(kind) => self.fits_slot(SlotKind::Primitive(kind)),
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Boolean(v) => write!(f, "{v}"),
            FeatureValue::Byte(v) => write!(f, "{v}"),
            FeatureValue::Short(v) => write!(f, "{v}"),
            FeatureValue::Integer(v) => write!(f, "{v}"),
            FeatureValue::Long(v) => write!(f, "{v}"),
            FeatureValue::Float(v) => write!(f, "{v}"),
            FeatureValue::Double(v) => write!(f, "{v}"),
            FeatureValue::String(Some(v)) => write!(f, "{v:?}"),
            FeatureValue::String(None) | FeatureValue::Ref(None) => write!(f, "null"),
            FeatureValue::Ref(Some(addr)) => write!(f, "#{addr}"),
        }
    }
}
