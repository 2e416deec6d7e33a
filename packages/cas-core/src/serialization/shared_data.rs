//! State shared between consecutive XMI serializations of one CAS.

use std::collections::HashMap;
use std::fmt;

use crate::error::CasError;
use crate::heap::Addr;

/// Attribute of an XMI element that has no counterpart in the type system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    pub name: String,
    pub value: String,
}

/// Child element kept verbatim; `None` stands for an explicit nil.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlChildElement {
    pub name: String,
    pub value: Option<String>,
}

/// XMI element whose type is unknown to the type system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OotsElement {
    pub xmi_id: u32,
    /// Namespace URI of the element
    pub namespace_uri: String,
    /// Element name without prefix
    pub local_name: String,
    /// Attributes other than `xmi:id`
    pub attributes: Vec<XmlAttribute>,
    pub child_elements: Vec<XmlChildElement>,
}

/// Out-of-type-system reference held by an FS array element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OotsArrayElement {
    pub index: usize,
    pub xmi_id: u32,
}

/// Unknown features of a known feature structure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OotsFeatures {
    pub attributes: Vec<XmlAttribute>,
    pub child_elements: Vec<XmlChildElement>,
}

/// Side table mapping heap addresses to XMI IDs.
///
/// Pass the same instance to the deserializer and to a later serializer so
/// that unchanged feature structures keep their IDs and data the type system
/// does not know is written back out.
#[derive(Debug, Clone, Default)]
pub struct XmiSharedData {
    addr_to_id: HashMap<Addr, u32>,
    id_to_addr: HashMap<u32, Addr>,
    max_id: u32,
    oots_elements: Vec<OotsElement>,
    oots_view_members: HashMap<u32, Vec<u32>>,
    oots_features: HashMap<Addr, OotsFeatures>,
    oots_array_elements: HashMap<Addr, Vec<OotsArrayElement>>,
}

impl XmiSharedData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `addr` is serialized with `xmi_id`.
    pub fn add_id_mapping(&mut self, addr: Addr, xmi_id: u32) {
        if let Some(old) = self.addr_to_id.insert(addr, xmi_id) {
            if old != xmi_id && self.id_to_addr.get(&old) == Some(&addr) {
                self.id_to_addr.remove(&old);
            }
        }
        self.id_to_addr.insert(xmi_id, addr);
        self.max_id = self.max_id.max(xmi_id);
    }

    /// Returns the ID of `addr`, assigning one above the current maximum if
    /// the address has none yet.
    pub fn get_xmi_id(&mut self, addr: Addr) -> u32 {
        if let Some(id) = self.addr_to_id.get(&addr) {
            return *id;
        }
        self.max_id += 1;
        let id = self.max_id;
        self.add_id_mapping(addr, id);
        id
    }

    /// ID previously recorded for `addr`, without assigning one.
    pub fn xmi_id_of(&self, addr: Addr) -> Option<u32> {
        self.addr_to_id.get(&addr).copied()
    }

    pub fn addr_for_xmi_id(&self, xmi_id: u32) -> Option<Addr> {
        self.id_to_addr.get(&xmi_id).copied()
    }

    /// Largest ID recorded or assigned so far.
    pub fn max_xmi_id(&self) -> u32 {
        self.max_id
    }

    /// Addresses with an ID, in ID order.
    pub fn mapped_addrs(&self) -> Vec<Addr> {
        let mut mapped: Vec<(u32, Addr)> = self
            .addr_to_id
            .iter()
            .map(|(addr, id)| (*id, *addr))
            .collect();
        mapped.sort_unstable();
        mapped.into_iter().map(|(_, addr)| addr).collect()
    }

    /// Number of addresses with an ID.
    pub fn mapped_count(&self) -> usize {
        self.addr_to_id.len()
    }

    /// Forgets all address to ID mappings and resets the maximum ID.
    pub fn clear_id_map(&mut self) {
        self.addr_to_id.clear();
        self.id_to_addr.clear();
        self.max_id = 0;
    }

    /// Forgets all data recorded for elements and features unknown to the type system.
    pub fn clear_out_of_type_system_data(&mut self) {
        self.oots_elements.clear();
        self.oots_view_members.clear();
        self.oots_features.clear();
        self.oots_array_elements.clear();
    }

    pub fn add_out_of_type_system_element(&mut self, element: OotsElement) {
        self.max_id = self.max_id.max(element.xmi_id);
        self.oots_elements.push(element);
    }

    pub fn out_of_type_system_elements(&self) -> &[OotsElement] {
        &self.oots_elements
    }

    /// Records that an unknown element belongs to the view of the Sofa with `sofa_xmi_id`.
    pub fn add_out_of_type_system_view_member(&mut self, sofa_xmi_id: u32, member_xmi_id: u32) {
        self.oots_view_members
            .entry(sofa_xmi_id)
            .or_default()
            .push(member_xmi_id);
    }

    pub fn out_of_type_system_view_members(&self, sofa_xmi_id: u32) -> &[u32] {
        self.oots_view_members
            .get(&sofa_xmi_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn add_out_of_type_system_attribute(&mut self, addr: Addr, name: &str, value: &str) {
        self.oots_features
            .entry(addr)
            .or_default()
            .attributes
            .push(XmlAttribute {
                name: name.to_string(),
                value: value.to_string(),
            });
    }

    pub fn add_out_of_type_system_child_element(
        &mut self,
        addr: Addr,
        name: &str,
        value: Option<&str>,
    ) {
        self.oots_features
            .entry(addr)
            .or_default()
            .child_elements
            .push(XmlChildElement {
                name: name.to_string(),
                value: value.map(str::to_string),
            });
    }

    /// Unknown features recorded for a known feature structure.
    pub fn out_of_type_system_features(&self, addr: Addr) -> Option<&OotsFeatures> {
        self.oots_features.get(&addr)
    }

    pub fn add_out_of_type_system_array_element(&mut self, addr: Addr, index: usize, xmi_id: u32) {
        self.oots_array_elements
            .entry(addr)
            .or_default()
            .push(OotsArrayElement { index, xmi_id });
    }

    pub fn out_of_type_system_array_elements(&self, addr: Addr) -> &[OotsArrayElement] {
        self.oots_array_elements
            .get(&addr)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Fails if two addresses share one XMI ID.
    ///
    /// # Returns
    /// `Err(CasError::IndexConsistency)` naming the first duplicate found.
    pub fn check_for_dups(&self) -> Result<(), CasError> {
        let mut seen: HashMap<u32, Addr> = HashMap::with_capacity(self.addr_to_id.len());
        for (addr, id) in &self.addr_to_id {
            if let Some(other) = seen.insert(*id, *addr) {
                return Err(CasError::IndexConsistency(format!(
                    "xmi:id {} is mapped to both {} and {}",
                    id,
                    other.min(*addr),
                    other.max(*addr)
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for XmiSharedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut mappings: Vec<_> = self.addr_to_id.iter().collect();
        mappings.sort();
        write!(f, "max xmi:id {}, mappings [", self.max_id)?;
        for (i, (addr, id)) in mappings.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{addr}->{id}")?;
        }
        write!(
            f,
            "], {} out-of-type-system elements",
            self.oots_elements.len()
        )
    }
}
