//! Mapping between dotted type namespaces and XMI namespace URIs and prefixes.

use std::collections::{HashMap, HashSet};

pub(crate) const XMI_NS_URI: &str = "http://www.omg.org/XMI";
pub(crate) const CAS_NS_URI: &str = "http:///uima/cas.ecore";
pub(crate) const XMI_VERSION: &str = "2.0";

const URI_SCHEME: &str = "http:///";
const URI_SUFFIX: &str = ".ecore";
const NO_NAMESPACE: &str = "noNamespace";
const NO_NAMESPACE_URI: &str = "http:///uima/noNamespace.ecore";

/// Splits `a.b.Type` into `("a.b", "Type")`.
pub(crate) fn split_type_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) => (&name[..pos], &name[pos + 1..]),
        None => ("", name),
    }
}

/// `uima.tcas` becomes `http:///uima/tcas.ecore`.
pub(crate) fn namespace_uri(namespace: &str) -> String {
    if namespace.is_empty() {
        return NO_NAMESPACE_URI.to_string();
    }
    format!("{}{}{}", URI_SCHEME, namespace.replace('.', "/"), URI_SUFFIX)
}

/// Inverse of [`namespace_uri`]; `None` for URIs not produced by it.
pub(crate) fn namespace_of_uri(uri: &str) -> Option<String> {
    if uri == NO_NAMESPACE_URI {
        return Some(String::new());
    }
    let path = uri.strip_prefix(URI_SCHEME)?.strip_suffix(URI_SUFFIX)?;
    Some(path.replace('/', "."))
}

/// Prefix assignment for one document.
///
/// The preferred prefix is the last namespace segment; colliding prefixes
/// get a numeric suffix.
#[derive(Debug, Default)]
pub(crate) struct NamespaceMap {
    prefixes: Vec<(String, String)>,
    by_uri: HashMap<String, usize>,
    used: HashSet<String>,
}

impl NamespaceMap {
    pub(crate) fn new() -> Self {
        let mut map = Self::default();
        map.used.insert("xmi".to_string());
        map
    }

    /// Returns the prefix for `uri`, assigning one on first use.
    pub(crate) fn prefix_for(&mut self, uri: &str) -> String {
        if let Some(&i) = self.by_uri.get(uri) {
            return self.prefixes[i].1.clone();
        }
        let preferred = preferred_prefix(uri);
        let mut prefix = preferred.clone();
        let mut n = 2;
        while self.used.contains(&prefix) {
            prefix = format!("{preferred}{n}");
            n += 1;
        }
        self.used.insert(prefix.clone());
        self.by_uri.insert(uri.to_string(), self.prefixes.len());
        self.prefixes.push((uri.to_string(), prefix.clone()));
        prefix
    }

    /// `(uri, prefix)` pairs in assignment order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(u, p)| (u.as_str(), p.as_str()))
    }
}

fn preferred_prefix(uri: &str) -> String {
    let namespace = namespace_of_uri(uri).unwrap_or_default();
    let last = namespace.rsplit('.').next().unwrap_or_default();
    if last.is_empty() || !last.chars().next().is_some_and(char::is_alphabetic) {
        NO_NAMESPACE.to_string()
    } else {
        last.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_round_trip() {
        assert_eq!(namespace_uri("uima.tcas"), "http:///uima/tcas.ecore");
        assert_eq!(
            namespace_of_uri("http:///uima/tcas.ecore").as_deref(),
            Some("uima.tcas")
        );
        assert_eq!(namespace_of_uri(&namespace_uri("")).as_deref(), Some(""));
        assert_eq!(namespace_of_uri("urn:other"), None);
    }

    #[test]
    fn test_split_type_name() {
        assert_eq!(split_type_name("uima.cas.Sofa"), ("uima.cas", "Sofa"));
        assert_eq!(split_type_name("Token"), ("", "Token"));
    }

    #[test]
    fn test_prefix_collisions_get_suffix() {
        let mut map = NamespaceMap::new();
        assert_eq!(map.prefix_for("http:///org/a/types.ecore"), "types");
        assert_eq!(map.prefix_for("http:///org/b/types.ecore"), "types2");
        assert_eq!(map.prefix_for("http:///org/a/types.ecore"), "types");
        assert_eq!(map.prefix_for("http:///uima/noNamespace.ecore"), "noNamespace");
        assert_eq!(map.iter().count(), 3);
    }
}
