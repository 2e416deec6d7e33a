//! XMI serialization.
//!
//! A document holds one element per feature structure, named after its type
//! with a namespace prefix derived from the dotted type namespace:
//!
//! ```text
//! <xmi:XMI xmlns:xmi="http://www.omg.org/XMI" xmlns:cas="http:///uima/cas.ecore"
//!          xmlns:tcas="http:///uima/tcas.ecore" xmi:version="2.0">
//!   <cas:NULL xmi:id="0"/>
//!   <cas:Sofa xmi:id="1" sofaNum="1" sofaID="_InitialView" sofaString="Hello"/>
//!   <tcas:Annotation xmi:id="2" sofa="1" begin="0" end="5"/>
//!   <cas:View sofa="1" members="2"/>
//! </xmi:XMI>
//! ```
//!
//! References are written as `xmi:id` values. [`XmiSharedData`] carries the
//! address to ID mapping from a deserialization to the next serialization.

mod namespaces;
mod shared_data;
mod xmi_reader;
mod xmi_writer;

pub use shared_data::{
    OotsArrayElement, OotsElement, OotsFeatures, XmiSharedData, XmlAttribute, XmlChildElement,
};
pub use xmi_reader::{deserialize, XmiDeserializer};
pub use xmi_writer::{serialize, serialize_to};

#[cfg(test)]
mod tests {
    include!("tests.rs");
}
