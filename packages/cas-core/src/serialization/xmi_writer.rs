//! XMI serializer.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Display;
use std::io::Write;

use quick_xml::escape::escape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::Writer;

use super::namespaces::{
    namespace_uri, split_type_name, NamespaceMap, CAS_NS_URI, XMI_NS_URI, XMI_VERSION,
};
use super::shared_data::{XmiSharedData, XmlChildElement};
use crate::cas::{Cas, FeatureValue};
use crate::error::CasError;
use crate::heap::Addr;
use crate::types::{ElementKind, PrimitiveKind, TypeClass};

pub(crate) fn xml_error(err: impl Display) -> CasError {
    CasError::Serialization(err.to_string())
}

/// Attribute with the value escaped, including whitespace that XML
/// parsers would otherwise normalize.
fn attribute<'a>(key: &'a str, value: &str) -> Attribute<'a> {
    let escaped = escape(value)
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
        .replace('\t', "&#9;");
    Attribute {
        key: QName(key.as_bytes()),
        value: Cow::Owned(escaped.into_bytes()),
    }
}

fn join<T: Display>(values: impl IntoIterator<Item = T>) -> String {
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Feature structures to write, in document order.
struct Plan {
    /// Sofa first, then indexed, then kept and referenced-only feature structures
    order: Vec<Addr>,
    /// Indexed feature structures in index order
    members: Vec<Addr>,
    ids: HashMap<Addr, u32>,
}

/// Collects the indexed feature structures and everything reachable from them.
///
/// Elements kept for unknown types may refer to feature structures that are
/// neither indexed nor reachable, so while there are any, every feature
/// structure with a recorded ID is written as well.
fn plan(cas: &Cas, shared: &XmiSharedData) -> Result<Plan, CasError> {
    let ts = cas.type_system();
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    if let Some(sofa) = cas.sofa() {
        visited.insert(sofa);
        order.push(sofa);
    }
    let mut members = Vec::new();
    for addr in cas.all_indexed_fs(ts.builtins().top) {
        if visited.insert(addr) {
            order.push(addr);
            members.push(addr);
        }
    }
    if !shared.out_of_type_system_elements().is_empty() {
        for addr in shared.mapped_addrs() {
            if cas.type_of(addr).is_ok() && visited.insert(addr) {
                order.push(addr);
            }
        }
    }

    let mut queue: VecDeque<Addr> = order.iter().copied().collect();
    while let Some(addr) = queue.pop_front() {
        for target in references(cas, addr)? {
            if visited.insert(target) {
                order.push(target);
                queue.push_back(target);
            }
        }
    }
    Ok(Plan {
        order,
        members,
        ids: HashMap::new(),
    })
}

/// Non-null references held by the feature structure at `addr`.
fn references(cas: &Cas, addr: Addr) -> Result<Vec<Addr>, CasError> {
    let ts = cas.type_system();
    let t = cas.type_of(addr)?;
    let mut targets = Vec::new();
    match ts.type_class(t) {
        TypeClass::Array(ElementKind::Fs) => {
            for i in 0..cas.array_len(addr)? {
                if let Some(target) = cas.array_get_ref(addr, i)? {
                    targets.push(target);
                }
            }
        }
        TypeClass::Array(_) | TypeClass::Primitive(_) => {}
        TypeClass::Fs => {
            for f in ts.features_of(t)? {
                if let FeatureValue::Ref(Some(target)) = cas.get_value(addr, *f)? {
                    targets.push(target);
                }
            }
        }
    }
    Ok(targets)
}

/// Serializes the CAS to an XMI string.
///
/// With `shared`, IDs recorded by an earlier deserialization are reused,
/// new feature structures get IDs above the recorded maximum, and data kept
/// for unknown types and features is written back.
///
/// # Returns
/// `Err(CasError::IndexConsistency)` if the shared ID map holds duplicates.
pub fn serialize(cas: &Cas, shared: Option<&mut XmiSharedData>) -> Result<String, CasError> {
    let mut out = Vec::new();
    serialize_to(cas, &mut out, shared)?;
    String::from_utf8(out).map_err(xml_error)
}

/// Serializes the CAS as XMI into `sink`.
pub fn serialize_to<W: Write>(
    cas: &Cas,
    sink: W,
    shared: Option<&mut XmiSharedData>,
) -> Result<(), CasError> {
    let mut local = XmiSharedData::new();
    let has_shared = shared.is_some();
    let shared = shared.unwrap_or(&mut local);
    let mut plan = plan(cas, shared)?;
    for addr in &plan.order {
        plan.ids.insert(*addr, shared.get_xmi_id(*addr));
    }

    let ts = cas.type_system();
    let mut namespaces = NamespaceMap::new();
    namespaces.prefix_for(CAS_NS_URI);
    let mut qnames: HashMap<Addr, String> = HashMap::with_capacity(plan.order.len());
    for addr in &plan.order {
        let (namespace, short) = split_type_name(ts.type_name(cas.type_of(*addr)?));
        let prefix = namespaces.prefix_for(&namespace_uri(namespace));
        qnames.insert(*addr, format!("{prefix}:{short}"));
    }
    let oots_prefixes: Vec<String> = shared
        .out_of_type_system_elements()
        .iter()
        .map(|e| namespaces.prefix_for(&e.namespace_uri))
        .collect();
    let cas_prefix = namespaces.prefix_for(CAS_NS_URI);

    let mut writer = Writer::new_with_indent(sink, b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;
    let mut root = BytesStart::new("xmi:XMI");
    root.push_attribute(("xmlns:xmi", XMI_NS_URI));
    let ns_attrs: Vec<(String, String)> = namespaces
        .iter()
        .map(|(uri, prefix)| (format!("xmlns:{prefix}"), uri.to_string()))
        .collect();
    for (key, uri) in &ns_attrs {
        root.push_attribute((key.as_str(), uri.as_str()));
    }
    root.push_attribute(("xmi:version", XMI_VERSION));
    writer.write_event(Event::Start(root)).map_err(xml_error)?;

    let null_name = format!("{cas_prefix}:NULL");
    let mut null = BytesStart::new(null_name.as_str());
    null.push_attribute(("xmi:id", "0"));
    writer.write_event(Event::Empty(null)).map_err(xml_error)?;

    for addr in &plan.order {
        write_fs(cas, &mut writer, *addr, &qnames[addr], &plan.ids, shared)?;
    }

    for (element, prefix) in shared.out_of_type_system_elements().iter().zip(&oots_prefixes) {
        let name = format!("{}:{}", prefix, element.local_name);
        let id = element.xmi_id.to_string();
        let mut start = BytesStart::new(name.as_str());
        start.push_attribute(attribute("xmi:id", &id));
        for attr in &element.attributes {
            start.push_attribute(attribute(&attr.name, &attr.value));
        }
        write_with_children(&mut writer, start, &name, &element.child_elements)?;
    }

    let sofa_id = cas.sofa().map(|s| plan.ids[&s]);
    let mut member_ids: Vec<u32> = plan.members.iter().map(|m| plan.ids[m]).collect();
    if let Some(sofa_id) = sofa_id {
        member_ids.extend_from_slice(shared.out_of_type_system_view_members(sofa_id));
    }
    if sofa_id.is_some() || !member_ids.is_empty() {
        let view_name = format!("{cas_prefix}:View");
        let mut view = BytesStart::new(view_name.as_str());
        if let Some(sofa_id) = sofa_id {
            view.push_attribute(attribute("sofa", &sofa_id.to_string()));
        }
        view.push_attribute(attribute("members", &join(&member_ids)));
        writer.write_event(Event::Empty(view)).map_err(xml_error)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("xmi:XMI")))
        .map_err(xml_error)?;
    writer.into_inner().flush()?;

    if has_shared {
        shared.check_for_dups()?;
    }
    tracing::debug!(
        "Serialized {} feature structures ({} indexed) to XMI",
        plan.order.len(),
        plan.members.len()
    );
    Ok(())
}

fn write_with_children<W: Write>(
    writer: &mut Writer<W>,
    start: BytesStart<'_>,
    name: &str,
    children: &[XmlChildElement],
) -> Result<(), CasError> {
    if children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(xml_error);
    }
    writer.write_event(Event::Start(start)).map_err(xml_error)?;
    for child in children {
        let mut element = BytesStart::new(child.name.as_str());
        match &child.value {
            None => {
                element.push_attribute(("nil", "true"));
                writer.write_event(Event::Empty(element)).map_err(xml_error)?;
            }
            Some(value) if value.is_empty() => {
                writer.write_event(Event::Empty(element)).map_err(xml_error)?;
            }
            Some(value) => {
                writer.write_event(Event::Start(element)).map_err(xml_error)?;
                writer
                    .write_event(Event::Text(BytesText::new(value)))
                    .map_err(xml_error)?;
                writer
                    .write_event(Event::End(BytesEnd::new(child.name.as_str())))
                    .map_err(xml_error)?;
            }
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_error)
}

fn id_or_zero(ids: &HashMap<Addr, u32>, target: Option<Addr>) -> u32 {
    target.and_then(|t| ids.get(&t).copied()).unwrap_or(0)
}

fn write_fs<W: Write>(
    cas: &Cas,
    writer: &mut Writer<W>,
    addr: Addr,
    name: &str,
    ids: &HashMap<Addr, u32>,
    shared: &XmiSharedData,
) -> Result<(), CasError> {
    let ts = cas.type_system();
    let t = cas.type_of(addr)?;
    let mut start = BytesStart::new(name);
    start.push_attribute(attribute("xmi:id", &ids[&addr].to_string()));
    let mut children = Vec::new();

    match ts.type_class(t) {
        TypeClass::Array(element) => {
            let len = cas.array_len(addr)?;
            start.push_attribute(attribute("size", &len.to_string()));
            match element {
                ElementKind::Fs => {
                    let mut elements = Vec::with_capacity(len);
                    for i in 0..len {
                        elements.push(id_or_zero(ids, cas.array_get_ref(addr, i)?));
                    }
                    for oots in shared.out_of_type_system_array_elements(addr) {
                        if let Some(slot) = elements.get_mut(oots.index) {
                            *slot = oots.xmi_id;
                        }
                    }
                    start.push_attribute(attribute("elements", &join(elements)));
                }
                ElementKind::Primitive(PrimitiveKind::Byte) => {
                    let bytes: Vec<u8> = cas.array_bytes(addr)?.iter().map(|b| *b as u8).collect();
                    start.push_attribute(attribute("elements", &hex::encode_upper(bytes)));
                }
                ElementKind::Primitive(PrimitiveKind::String) => {
                    for i in 0..len {
                        children.push(XmlChildElement {
                            name: "elements".to_string(),
                            value: cas.array_get_string(addr, i)?.map(str::to_string),
                        });
                    }
                }
                ElementKind::Primitive(_) => {
                    let mut elements = Vec::with_capacity(len);
                    for i in 0..len {
                        elements.push(cas.array_get(addr, i)?);
                    }
                    start.push_attribute(attribute("elements", &join(elements)));
                }
            }
        }
        TypeClass::Fs => {
            for f in ts.features_of(t)? {
                let value = match cas.get_value(addr, *f)? {
                    FeatureValue::String(None) | FeatureValue::Ref(None) => continue,
                    FeatureValue::String(Some(s)) => s,
                    FeatureValue::Ref(Some(target)) => id_or_zero(ids, Some(target)).to_string(),
                    other => other.to_string(),
                };
                start.push_attribute(attribute(ts.feature_name(*f), &value));
            }
            if let Some(oots) = shared.out_of_type_system_features(addr) {
                for attr in &oots.attributes {
                    start.push_attribute(attribute(&attr.name, &attr.value));
                }
                children.extend(oots.child_elements.iter().cloned());
            }
        }
        TypeClass::Primitive(_) => {
            return Err(CasError::Serialization(format!(
                "primitive type '{}' on the heap at {}",
                ts.type_name(t),
                addr
            )))
        }
    }
    write_with_children(writer, start, name, &children)
}
