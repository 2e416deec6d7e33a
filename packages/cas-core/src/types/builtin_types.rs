use super::type_system::TypeSystem;
use super::{ElementKind, FeatureCode, PrimitiveKind, TypeClass, TypeCode};

/// Names of the built-in types and features.
pub mod names {
    pub const TOP: &str = "uima.cas.TOP";

    pub const BOOLEAN: &str = "uima.cas.Boolean";
    pub const BYTE: &str = "uima.cas.Byte";
    pub const SHORT: &str = "uima.cas.Short";
    pub const INTEGER: &str = "uima.cas.Integer";
    pub const LONG: &str = "uima.cas.Long";
    pub const FLOAT: &str = "uima.cas.Float";
    pub const DOUBLE: &str = "uima.cas.Double";
    pub const STRING: &str = "uima.cas.String";

    pub const ARRAY_BASE: &str = "uima.cas.ArrayBase";
    pub const FS_ARRAY: &str = "uima.cas.FSArray";
    pub const BOOLEAN_ARRAY: &str = "uima.cas.BooleanArray";
    pub const BYTE_ARRAY: &str = "uima.cas.ByteArray";
    pub const SHORT_ARRAY: &str = "uima.cas.ShortArray";
    pub const INTEGER_ARRAY: &str = "uima.cas.IntegerArray";
    pub const LONG_ARRAY: &str = "uima.cas.LongArray";
    pub const FLOAT_ARRAY: &str = "uima.cas.FloatArray";
    pub const DOUBLE_ARRAY: &str = "uima.cas.DoubleArray";
    pub const STRING_ARRAY: &str = "uima.cas.StringArray";

    pub const LIST_BASE: &str = "uima.cas.ListBase";
    pub const FS_LIST: &str = "uima.cas.FSList";
    pub const EMPTY_FS_LIST: &str = "uima.cas.EmptyFSList";
    pub const NON_EMPTY_FS_LIST: &str = "uima.cas.NonEmptyFSList";
    pub const INTEGER_LIST: &str = "uima.cas.IntegerList";
    pub const EMPTY_INTEGER_LIST: &str = "uima.cas.EmptyIntegerList";
    pub const NON_EMPTY_INTEGER_LIST: &str = "uima.cas.NonEmptyIntegerList";
    pub const FLOAT_LIST: &str = "uima.cas.FloatList";
    pub const EMPTY_FLOAT_LIST: &str = "uima.cas.EmptyFloatList";
    pub const NON_EMPTY_FLOAT_LIST: &str = "uima.cas.NonEmptyFloatList";
    pub const STRING_LIST: &str = "uima.cas.StringList";
    pub const EMPTY_STRING_LIST: &str = "uima.cas.EmptyStringList";
    pub const NON_EMPTY_STRING_LIST: &str = "uima.cas.NonEmptyStringList";

    pub const SOFA: &str = "uima.cas.Sofa";
    pub const ANNOTATION_BASE: &str = "uima.cas.AnnotationBase";
    pub const ANNOTATION: &str = "uima.tcas.Annotation";
    pub const DOCUMENT_ANNOTATION: &str = "uima.tcas.DocumentAnnotation";

    pub const FEATURE_HEAD: &str = "head";
    pub const FEATURE_TAIL: &str = "tail";
    pub const FEATURE_SOFA_NUM: &str = "sofaNum";
    pub const FEATURE_SOFA_ID: &str = "sofaID";
    pub const FEATURE_SOFA_MIME: &str = "mimeType";
    pub const FEATURE_SOFA_STRING: &str = "sofaString";
    pub const FEATURE_SOFA: &str = "sofa";
    pub const FEATURE_BEGIN: &str = "begin";
    pub const FEATURE_END: &str = "end";
    pub const FEATURE_LANGUAGE: &str = "language";

    /// Sofa ID of the initial view.
    pub const INITIAL_VIEW: &str = "_InitialView";
    /// Label of the built-in annotation index.
    pub const ANNOTATION_INDEX: &str = "AnnotationIndex";
}

/// Codes of the built-in types and features, fixed at construction.
#[derive(Debug, Clone)]
pub struct Builtins {
    pub top: TypeCode,
    pub boolean: TypeCode,
    pub byte: TypeCode,
    pub short: TypeCode,
    pub integer: TypeCode,
    pub long: TypeCode,
    pub float: TypeCode,
    pub double: TypeCode,
    pub string: TypeCode,
    pub array_base: TypeCode,
    pub fs_array: TypeCode,
    pub boolean_array: TypeCode,
    pub byte_array: TypeCode,
    pub short_array: TypeCode,
    pub integer_array: TypeCode,
    pub long_array: TypeCode,
    pub float_array: TypeCode,
    pub double_array: TypeCode,
    pub string_array: TypeCode,
    pub list_base: TypeCode,
    pub fs_list: TypeCode,
    pub empty_fs_list: TypeCode,
    pub non_empty_fs_list: TypeCode,
    pub sofa: TypeCode,
    pub annotation_base: TypeCode,
    pub annotation: TypeCode,
    pub document_annotation: TypeCode,
    pub fs_list_head: FeatureCode,
    pub fs_list_tail: FeatureCode,
    pub sofa_num: FeatureCode,
    pub sofa_id: FeatureCode,
    pub sofa_mime: FeatureCode,
    pub sofa_string: FeatureCode,
    pub sofa_ref: FeatureCode,
    pub begin: FeatureCode,
    pub end: FeatureCode,
    pub language: FeatureCode,
}

impl Builtins {
    /// Placeholder overwritten by [`register_builtin_types`] during construction.
    pub(crate) fn unresolved() -> Self {
        let t = TypeCode(1);
        let f = FeatureCode(1);
        Self {
            top: t,
            boolean: t,
            byte: t,
            short: t,
            integer: t,
            long: t,
            float: t,
            double: t,
            string: t,
            array_base: t,
            fs_array: t,
            boolean_array: t,
            byte_array: t,
            short_array: t,
            integer_array: t,
            long_array: t,
            float_array: t,
            double_array: t,
            string_array: t,
            list_base: t,
            fs_list: t,
            empty_fs_list: t,
            non_empty_fs_list: t,
            sofa: t,
            annotation_base: t,
            annotation: t,
            document_annotation: t,
            fs_list_head: f,
            fs_list_tail: f,
            sofa_num: f,
            sofa_id: f,
            sofa_mime: f,
            sofa_string: f,
            sofa_ref: f,
            begin: f,
            end: f,
            language: f,
        }
    }

    /// Returns the array type holding elements of the given kind.
    pub fn array_type(&self, element: ElementKind) -> TypeCode {
        match element {
            ElementKind::Fs => self.fs_array,
            ElementKind::Primitive(kind) => match kind {
                PrimitiveKind::Boolean => self.boolean_array,
                PrimitiveKind::Byte => self.byte_array,
                PrimitiveKind::Short => self.short_array,
                PrimitiveKind::Integer => self.integer_array,
                PrimitiveKind::Long => self.long_array,
                PrimitiveKind::Float => self.float_array,
                PrimitiveKind::Double => self.double_array,
                PrimitiveKind::String => self.string_array,
            },
        }
    }
}

/// Declares the built-in types on a fresh type system.
///
/// Must run before any user declaration so that built-in codes are the same
/// for every type system.
pub(crate) fn register_builtin_types(ts: &mut TypeSystem) -> Builtins {
    use names::*;

    let mut b = Builtins::unresolved();

    // final for inheritance, final for features
    let top = ts.declare_builtin(TOP, None, TypeClass::Fs, false, true);
    b.top = top;

    let primitives = [
        (BOOLEAN, PrimitiveKind::Boolean),
        (BYTE, PrimitiveKind::Byte),
        (SHORT, PrimitiveKind::Short),
        (INTEGER, PrimitiveKind::Integer),
        (LONG, PrimitiveKind::Long),
        (FLOAT, PrimitiveKind::Float),
        (DOUBLE, PrimitiveKind::Double),
        (STRING, PrimitiveKind::String),
    ];
    for (name, kind) in primitives {
        // String stays open so that string subtypes can extend it
        let final_inheritance = kind != PrimitiveKind::String;
        let code = ts.declare_builtin(
            name,
            Some(top),
            TypeClass::Primitive(kind),
            final_inheritance,
            true,
        );
        match kind {
            PrimitiveKind::Boolean => b.boolean = code,
            PrimitiveKind::Byte => b.byte = code,
            PrimitiveKind::Short => b.short = code,
            PrimitiveKind::Integer => b.integer = code,
            PrimitiveKind::Long => b.long = code,
            PrimitiveKind::Float => b.float = code,
            PrimitiveKind::Double => b.double = code,
            PrimitiveKind::String => b.string = code,
        }
    }

    b.array_base = ts.declare_builtin(ARRAY_BASE, Some(top), TypeClass::Fs, true, true);
    let arrays = [
        (FS_ARRAY, ElementKind::Fs),
        (BOOLEAN_ARRAY, ElementKind::Primitive(PrimitiveKind::Boolean)),
        (BYTE_ARRAY, ElementKind::Primitive(PrimitiveKind::Byte)),
        (SHORT_ARRAY, ElementKind::Primitive(PrimitiveKind::Short)),
        (INTEGER_ARRAY, ElementKind::Primitive(PrimitiveKind::Integer)),
        (LONG_ARRAY, ElementKind::Primitive(PrimitiveKind::Long)),
        (FLOAT_ARRAY, ElementKind::Primitive(PrimitiveKind::Float)),
        (DOUBLE_ARRAY, ElementKind::Primitive(PrimitiveKind::Double)),
        (STRING_ARRAY, ElementKind::Primitive(PrimitiveKind::String)),
    ];
    for (name, element) in arrays {
        let code = ts.declare_builtin(
            name,
            Some(b.array_base),
            TypeClass::Array(element),
            true,
            true,
        );
        match element {
            ElementKind::Fs => b.fs_array = code,
            ElementKind::Primitive(PrimitiveKind::Boolean) => b.boolean_array = code,
            ElementKind::Primitive(PrimitiveKind::Byte) => b.byte_array = code,
            ElementKind::Primitive(PrimitiveKind::Short) => b.short_array = code,
            ElementKind::Primitive(PrimitiveKind::Integer) => b.integer_array = code,
            ElementKind::Primitive(PrimitiveKind::Long) => b.long_array = code,
            ElementKind::Primitive(PrimitiveKind::Float) => b.float_array = code,
            ElementKind::Primitive(PrimitiveKind::Double) => b.double_array = code,
            ElementKind::Primitive(PrimitiveKind::String) => b.string_array = code,
        }
    }

    b.list_base = ts.declare_builtin(LIST_BASE, Some(top), TypeClass::Fs, false, true);
    let lists = [
        (FS_LIST, EMPTY_FS_LIST, NON_EMPTY_FS_LIST, top),
        (INTEGER_LIST, EMPTY_INTEGER_LIST, NON_EMPTY_INTEGER_LIST, b.integer),
        (FLOAT_LIST, EMPTY_FLOAT_LIST, NON_EMPTY_FLOAT_LIST, b.float),
        (STRING_LIST, EMPTY_STRING_LIST, NON_EMPTY_STRING_LIST, b.string),
    ];
    for (list, empty, non_empty, head_range) in lists {
        let list_code = ts.declare_builtin(list, Some(b.list_base), TypeClass::Fs, false, true);
        let empty_code = ts.declare_builtin(empty, Some(list_code), TypeClass::Fs, true, true);
        let non_empty_code =
            ts.declare_builtin(non_empty, Some(list_code), TypeClass::Fs, true, true);
        let head = ts.declare_builtin_feature(non_empty_code, FEATURE_HEAD, head_range);
        let tail = ts.declare_builtin_feature(non_empty_code, FEATURE_TAIL, list_code);
        if list == FS_LIST {
            b.fs_list = list_code;
            b.empty_fs_list = empty_code;
            b.non_empty_fs_list = non_empty_code;
            b.fs_list_head = head;
            b.fs_list_tail = tail;
        }
    }

    b.sofa = ts.declare_builtin(SOFA, Some(top), TypeClass::Fs, true, true);
    b.sofa_num = ts.declare_builtin_feature(b.sofa, FEATURE_SOFA_NUM, b.integer);
    b.sofa_id = ts.declare_builtin_feature(b.sofa, FEATURE_SOFA_ID, b.string);
    b.sofa_mime = ts.declare_builtin_feature(b.sofa, FEATURE_SOFA_MIME, b.string);
    b.sofa_string = ts.declare_builtin_feature(b.sofa, FEATURE_SOFA_STRING, b.string);

    b.annotation_base = ts.declare_builtin(ANNOTATION_BASE, Some(top), TypeClass::Fs, false, false);
    b.sofa_ref = ts.declare_builtin_feature(b.annotation_base, FEATURE_SOFA, b.sofa);

    b.annotation = ts.declare_builtin(
        ANNOTATION,
        Some(b.annotation_base),
        TypeClass::Fs,
        false,
        false,
    );
    b.begin = ts.declare_builtin_feature(b.annotation, FEATURE_BEGIN, b.integer);
    b.end = ts.declare_builtin_feature(b.annotation, FEATURE_END, b.integer);

    b.document_annotation = ts.declare_builtin(
        DOCUMENT_ANNOTATION,
        Some(b.annotation),
        TypeClass::Fs,
        false,
        false,
    );
    b.language = ts.declare_builtin_feature(b.document_annotation, FEATURE_LANGUAGE, b.string);

    b
}
