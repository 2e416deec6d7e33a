//! XMI deserializer.

use std::collections::HashMap;
use std::str;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::namespaces::{namespace_of_uri, CAS_NS_URI};
use super::shared_data::{OotsElement, XmiSharedData, XmlAttribute, XmlChildElement};
use super::xmi_writer::xml_error;
use crate::cas::{Cas, FeatureValue};
use crate::error::CasError;
use crate::heap::Addr;
use crate::types::{ElementKind, FeatureCode, PrimitiveKind, SlotKind, TypeClass, TypeCode};

/// One top-level element of the document.
#[derive(Debug, Default)]
struct RawElement {
    namespace_uri: String,
    local_name: String,
    attributes: Vec<XmlAttribute>,
    children: Vec<XmlChildElement>,
}

impl RawElement {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Attributes other than `xmi:*` bookkeeping.
    fn features(&self) -> impl Iterator<Item = &XmlAttribute> {
        self.attributes.iter().filter(|a| !a.name.starts_with("xmi:"))
    }
}

fn utf8(bytes: &[u8]) -> Result<&str, CasError> {
    str::from_utf8(bytes).map_err(xml_error)
}

fn read_attributes(start: &BytesStart<'_>) -> Result<Vec<XmlAttribute>, CasError> {
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(xml_error)?;
        attributes.push(XmlAttribute {
            name: utf8(attr.key.as_ref())?.to_string(),
            value: attr.unescape_value().map_err(xml_error)?.into_owned(),
        });
    }
    Ok(attributes)
}

/// Parses the document into its top-level elements.
fn parse(xml: &str) -> Result<Vec<RawElement>, CasError> {
    let mut reader = Reader::from_str(xml);
    let mut prefixes: HashMap<String, String> = HashMap::new();
    let mut elements = Vec::new();
    let mut depth = 0usize;
    let mut current: Option<RawElement> = None;
    let mut child: Option<XmlChildElement> = None;

    let resolve = |prefixes: &HashMap<String, String>, qname: &str| -> (String, String) {
        match qname.split_once(':') {
            Some((prefix, local)) => (
                prefixes.get(prefix).cloned().unwrap_or_default(),
                local.to_string(),
            ),
            None => (String::new(), qname.to_string()),
        }
    };

    loop {
        let event = reader.read_event().map_err(xml_error)?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let empty = matches!(event, Event::Empty(_));
                let qname = utf8(e.name().as_ref())?.to_string();
                match depth {
                    0 => {
                        for attr in read_attributes(e)? {
                            if let Some(prefix) = attr.name.strip_prefix("xmlns:") {
                                prefixes.insert(prefix.to_string(), attr.value);
                            }
                        }
                    }
                    1 => {
                        let (namespace_uri, local_name) = resolve(&prefixes, &qname);
                        let element = RawElement {
                            namespace_uri,
                            local_name,
                            attributes: read_attributes(e)?,
                            children: Vec::new(),
                        };
                        if empty {
                            elements.push(element);
                        } else {
                            current = Some(element);
                        }
                    }
                    2 => {
                        let attributes = read_attributes(e)?;
                        let nil = attributes
                            .iter()
                            .any(|a| a.name.ends_with("nil") && a.value == "true");
                        let value = if nil { None } else { Some(String::new()) };
                        let element = XmlChildElement { name: qname, value };
                        if empty {
                            if let Some(parent) = current.as_mut() {
                                parent.children.push(element);
                            }
                        } else {
                            child = Some(element);
                        }
                    }
                    _ => {}
                }
                if !empty {
                    depth += 1;
                }
            }
            Event::Text(ref t) => {
                if let Some(c) = child.as_mut() {
                    let text = t.unescape().map_err(xml_error)?;
                    if let Some(value) = c.value.as_mut() {
                        value.push_str(&text);
                    }
                }
            }
            Event::CData(ref t) => {
                if let Some(value) = child.as_mut().and_then(|c| c.value.as_mut()) {
                    value.push_str(utf8(t)?);
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                match depth {
                    1 => {
                        if let Some(element) = current.take() {
                            elements.push(element);
                        }
                    }
                    2 => {
                        if let (Some(c), Some(parent)) = (child.take(), current.as_mut()) {
                            parent.children.push(c);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if prefixes.is_empty() && elements.is_empty() {
        return Err(CasError::Serialization("document has no XMI root element".to_string()));
    }
    Ok(elements)
}

fn parse_id(value: &str) -> Result<u32, CasError> {
    value
        .trim()
        .parse()
        .map_err(|_| CasError::Serialization(format!("invalid xmi:id '{value}'")))
}

fn parse_number<T: str::FromStr>(value: &str, what: &str) -> Result<T, CasError> {
    value
        .trim()
        .parse()
        .map_err(|_| CasError::Serialization(format!("invalid {what} value '{value}'")))
}

fn parse_bool(value: &str) -> Result<bool, CasError> {
    match value.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(CasError::Serialization(format!("invalid boolean value '{other}'"))),
    }
}

fn parse_byte(value: &str) -> Result<i8, CasError> {
    let v = value.trim();
    v.parse::<i8>()
        .or_else(|_| v.parse::<u8>().map(|b| b as i8))
        .map_err(|_| CasError::Serialization(format!("invalid byte value '{value}'")))
}

fn parse_primitive(kind: PrimitiveKind, value: &str) -> Result<FeatureValue, CasError> {
    Ok(match kind {
        PrimitiveKind::Boolean => FeatureValue::Boolean(parse_bool(value)?),
        PrimitiveKind::Byte => FeatureValue::Byte(parse_byte(value)?),
        PrimitiveKind::Short => FeatureValue::Short(parse_number(value, kind.name())?),
        PrimitiveKind::Integer => FeatureValue::Integer(parse_number(value, kind.name())?),
        PrimitiveKind::Long => FeatureValue::Long(parse_number(value, kind.name())?),
        PrimitiveKind::Float => FeatureValue::Float(parse_number(value, kind.name())?),
        PrimitiveKind::Double => FeatureValue::Double(parse_number(value, kind.name())?),
        PrimitiveKind::String => FeatureValue::String(Some(value.to_string())),
    })
}

/// Reads XMI documents into a CAS.
///
/// A strict deserializer fails on elements, features and references the
/// type system cannot represent. A lenient one skips them and, when shared
/// data is supplied, records them there so that the next serialization
/// writes them back.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmiDeserializer {
    lenient: bool,
}

impl XmiDeserializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lenient() -> Self {
        Self { lenient: true }
    }

    pub fn is_lenient(&self) -> bool {
        self.lenient
    }

    /// Replaces the contents of `cas` with the document.
    ///
    /// # Arguments
    /// * `xml` - XMI document
    /// * `cas` - Target CAS; it is reset first
    /// * `shared` - Side table receiving the ID mapping of this document
    ///
    /// # Returns
    /// `Err(CasError::UnknownType)` or `Err(CasError::UnknownId)` in strict
    /// mode for unrepresentable content, `Err(CasError::Serialization)` for
    /// malformed documents.
    pub fn deserialize(
        &self,
        xml: &str,
        cas: &mut Cas,
        mut shared: Option<&mut XmiSharedData>,
    ) -> Result<(), CasError> {
        let elements = parse(xml)?;
        cas.reset();
        if let Some(shared) = shared.as_deref_mut() {
            shared.clear_id_map();
            shared.clear_out_of_type_system_data();
        }

        let mut run = Run {
            lenient: self.lenient,
            cas,
            shared,
            by_id: HashMap::new(),
            created: Vec::new(),
            sofa_id: None,
            max_array_len: xml.len(),
        };
        let mut views = Vec::new();
        for (i, element) in elements.iter().enumerate() {
            if element.namespace_uri == CAS_NS_URI {
                match element.local_name.as_str() {
                    "NULL" => continue,
                    "View" => {
                        views.push(element);
                        continue;
                    }
                    _ => {}
                }
            }
            run.create(i, element)?;
        }
        for (i, addr) in run.created.clone() {
            run.fill(&elements[i], addr)?;
        }
        for view in views {
            run.index_view(view)?;
        }
        if let Some(shared) = run.shared.as_deref() {
            shared.check_for_dups()?;
        }
        tracing::debug!(
            "Deserialized {} feature structures from XMI",
            run.created.len()
        );
        Ok(())
    }
}

/// Deserializes with a strict deserializer.
pub fn deserialize(
    xml: &str,
    cas: &mut Cas,
    shared: Option<&mut XmiSharedData>,
) -> Result<(), CasError> {
    XmiDeserializer::new().deserialize(xml, cas, shared)
}

/// Outcome of resolving an `xmi:id` reference.
enum Resolved {
    Null,
    Fs(Addr),
    Unknown(u32),
}

/// State of one deserialization.
struct Run<'c, 's> {
    lenient: bool,
    cas: &'c mut Cas,
    shared: Option<&'s mut XmiSharedData>,
    by_id: HashMap<u32, Addr>,
    /// Element position and address of every created feature structure
    created: Vec<(usize, Addr)>,
    sofa_id: Option<u32>,
    /// Upper bound for declared array sizes
    max_array_len: usize,
}

impl Run<'_, '_> {
    fn type_of_element(&self, element: &RawElement) -> Option<TypeCode> {
        let namespace = namespace_of_uri(&element.namespace_uri)?;
        let name = if namespace.is_empty() {
            element.local_name.clone()
        } else {
            format!("{}.{}", namespace, element.local_name)
        };
        self.cas.type_system().type_by_name(&name)
    }

    fn xmi_id(element: &RawElement) -> Result<u32, CasError> {
        let id = element.attribute("xmi:id").ok_or_else(|| {
            CasError::Serialization(format!("element '{}' has no xmi:id", element.local_name))
        })?;
        parse_id(id)
    }

    fn create(&mut self, position: usize, element: &RawElement) -> Result<(), CasError> {
        let id = Self::xmi_id(element)?;
        let Some(t) = self.type_of_element(element) else {
            if !self.lenient {
                return Err(CasError::UnknownType(format!(
                    "{{{}}}{}",
                    element.namespace_uri, element.local_name
                )));
            }
            tracing::warn!(
                "Keeping element '{}' (xmi:id {}) of unknown type",
                element.local_name,
                id
            );
            if let Some(shared) = self.shared.as_deref_mut() {
                shared.add_out_of_type_system_element(OotsElement {
                    xmi_id: id,
                    namespace_uri: element.namespace_uri.clone(),
                    local_name: element.local_name.clone(),
                    attributes: element
                        .attributes
                        .iter()
                        .filter(|a| a.name != "xmi:id")
                        .cloned()
                        .collect(),
                    child_elements: element.children.clone(),
                });
            }
            return Ok(());
        };

        let ts = self.cas.type_system().clone();
        let addr = match ts.type_class(t) {
            TypeClass::Array(element_kind) => {
                let len = array_length(element, element_kind, self.max_array_len)?;
                self.cas.create_array(t, len)?
            }
            TypeClass::Fs if t == ts.builtins().sofa => {
                if self.sofa_id.is_some() {
                    return Err(CasError::Serialization(
                        "only the initial view is supported".to_string(),
                    ));
                }
                self.sofa_id = Some(id);
                self.cas.ensure_sofa()?
            }
            _ => self.cas.create(t)?,
        };
        if self.by_id.insert(id, addr).is_some() {
            return Err(CasError::IndexConsistency(format!("xmi:id {id} used twice")));
        }
        if let Some(shared) = self.shared.as_deref_mut() {
            shared.add_id_mapping(addr, id);
        }
        self.created.push((position, addr));
        Ok(())
    }

    /// Resolves a reference; unknown IDs are only tolerated when lenient.
    fn resolve(&self, value: &str) -> Result<Resolved, CasError> {
        let id = parse_id(value)?;
        if id == 0 {
            return Ok(Resolved::Null);
        }
        match self.by_id.get(&id) {
            Some(addr) => Ok(Resolved::Fs(*addr)),
            None if self.lenient => Ok(Resolved::Unknown(id)),
            None => Err(CasError::UnknownId(id.to_string())),
        }
    }

    fn fill(&mut self, element: &RawElement, addr: Addr) -> Result<(), CasError> {
        let ts = self.cas.type_system().clone();
        let t = self.cas.type_of(addr)?;
        if let TypeClass::Array(kind) = ts.type_class(t) {
            return self.fill_array(element, addr, kind);
        }
        for attr in element.features() {
            let Some(f) = ts.feature_by_name(t, &attr.name) else {
                self.unknown_feature(addr, t, &attr.name, Some(attr.value.as_str()))?;
                continue;
            };
            self.set_feature(addr, f, &attr.name, &attr.value)?;
        }
        for child in &element.children {
            match ts.feature_by_name(t, &child.name) {
                Some(f) if ts.slot_kind(f) == SlotKind::Primitive(PrimitiveKind::String) => {
                    self.cas.set_string(addr, f, child.value.as_deref())?;
                }
                Some(f) => {
                    return Err(CasError::Serialization(format!(
                        "feature '{}' cannot be given as a child element",
                        ts.feature_full_name(f)
                    )));
                }
                None => {
                    self.unknown_feature(addr, t, &child.name, None)?;
                    if let Some(shared) = self.shared.as_deref_mut() {
                        shared.add_out_of_type_system_child_element(
                            addr,
                            &child.name,
                            child.value.as_deref(),
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn unknown_feature(
        &mut self,
        addr: Addr,
        t: TypeCode,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), CasError> {
        let ts = self.cas.type_system();
        if !self.lenient {
            return Err(CasError::FeatureMissing {
                type_name: ts.type_name(t).to_string(),
                feature: name.to_string(),
            });
        }
        tracing::warn!(
            "Keeping unknown feature '{}' of type '{}'",
            name,
            ts.type_name(t)
        );
        if let (Some(value), Some(shared)) = (value, self.shared.as_deref_mut()) {
            shared.add_out_of_type_system_attribute(addr, name, value);
        }
        Ok(())
    }

    fn set_feature(
        &mut self,
        addr: Addr,
        f: FeatureCode,
        name: &str,
        value: &str,
    ) -> Result<(), CasError> {
        let ts = self.cas.type_system().clone();
        let parsed = match ts.slot_kind(f) {
            SlotKind::Primitive(kind) => parse_primitive(kind, value)?,
            SlotKind::Ref => match self.resolve(value)? {
                Resolved::Null => FeatureValue::Ref(None),
                Resolved::Fs(target) => FeatureValue::Ref(Some(target)),
                Resolved::Unknown(id) => {
                    tracing::warn!("Keeping reference '{}' to unknown xmi:id {}", name, id);
                    if let Some(shared) = self.shared.as_deref_mut() {
                        shared.add_out_of_type_system_attribute(addr, name, value);
                    }
                    return Ok(());
                }
            },
        };
        self.cas.set_value(addr, f, &parsed)
    }

    fn fill_array(
        &mut self,
        element: &RawElement,
        addr: Addr,
        kind: ElementKind,
    ) -> Result<(), CasError> {
        let len = self.cas.array_len(addr)?;
        match kind {
            ElementKind::Primitive(PrimitiveKind::String) => {
                for (i, child) in element
                    .children
                    .iter()
                    .filter(|c| c.name == "elements")
                    .take(len)
                    .enumerate()
                {
                    self.cas.array_set_string(addr, i, child.value.as_deref())?;
                }
            }
            ElementKind::Primitive(PrimitiveKind::Byte) => {
                let encoded = element.attribute("elements").unwrap_or_default();
                let bytes = hex::decode(encoded.trim()).map_err(xml_error)?;
                for (i, b) in bytes.into_iter().take(len).enumerate() {
                    self.cas.array_set(addr, i, &FeatureValue::Byte(b as i8))?;
                }
            }
            ElementKind::Fs => {
                let values = element.attribute("elements").unwrap_or_default();
                for (i, value) in values.split_whitespace().take(len).enumerate() {
                    match self.resolve(value)? {
                        Resolved::Null => self.cas.array_set_ref(addr, i, None)?,
                        Resolved::Fs(target) => self.cas.array_set_ref(addr, i, Some(target))?,
                        Resolved::Unknown(id) => {
                            tracing::warn!("Keeping array reference to unknown xmi:id {}", id);
                            if let Some(shared) = self.shared.as_deref_mut() {
                                shared.add_out_of_type_system_array_element(addr, i, id);
                            }
                        }
                    }
                }
            }
            ElementKind::Primitive(primitive) => {
                let values = element.attribute("elements").unwrap_or_default();
                for (i, value) in values.split_whitespace().take(len).enumerate() {
                    self.cas
                        .array_set(addr, i, &parse_primitive(primitive, value)?)?;
                }
            }
        }
        Ok(())
    }

    fn index_view(&mut self, view: &RawElement) -> Result<(), CasError> {
        let sofa = match view.attribute("sofa") {
            Some(id) => Some(parse_id(id)?),
            None => None,
        };
        if sofa.is_some() && sofa != self.sofa_id {
            return Err(CasError::Serialization(format!(
                "view refers to unknown sofa {}",
                view.attribute("sofa").unwrap_or_default()
            )));
        }
        let members = view.attribute("members").unwrap_or_default();
        let sofa_addr = self.cas.sofa();
        for value in members.split_whitespace() {
            match self.resolve(value)? {
                Resolved::Fs(addr) if Some(addr) != sofa_addr => self.cas.add_fs(addr)?,
                Resolved::Fs(_) | Resolved::Null => {}
                Resolved::Unknown(id) => {
                    if let (Some(sofa), Some(shared)) = (sofa, self.shared.as_deref_mut()) {
                        shared.add_out_of_type_system_view_member(sofa, id);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Array length from the `size` attribute, or from the elements present.
///
/// A declared size may exceed the elements present but not `limit`.
fn array_length(element: &RawElement, kind: ElementKind, limit: usize) -> Result<usize, CasError> {
    let present = match kind {
        ElementKind::Primitive(PrimitiveKind::String) => element
            .children
            .iter()
            .filter(|c| c.name == "elements")
            .count(),
        ElementKind::Primitive(PrimitiveKind::Byte) => {
            element.attribute("elements").unwrap_or_default().trim().len() / 2
        }
        _ => element
            .attribute("elements")
            .unwrap_or_default()
            .split_whitespace()
            .count(),
    };
    let Some(size) = element.attribute("size") else {
        return Ok(present);
    };
    let size: usize = parse_number(size, "array size")?;
    if size < present {
        return Err(CasError::Serialization(format!(
            "array '{}' has size {} but {} elements",
            element.local_name, size, present
        )));
    }
    if size > limit {
        return Err(CasError::Serialization(format!(
            "array '{}' size {} exceeds the document length {}",
            element.local_name, size, limit
        )));
    }
    Ok(size)
}
