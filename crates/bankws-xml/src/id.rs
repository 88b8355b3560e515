#![forbid(unsafe_code)]

//! Identifier attributes and same-document URI references (`#id`).

use crate::document::XmlDocument;
use uppsala::NodeId;
use bankws_core::{ns, Error};

/// An attribute that carries an element identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdAttr {
    /// Namespace URI, `None` for an unqualified attribute.
    pub namespace: Option<String>,
    pub local_name: String,
}

impl IdAttr {
    pub fn new(namespace: Option<&str>, local_name: &str) -> Self {
        Self {
            namespace: namespace.map(str::to_owned),
            local_name: local_name.to_owned(),
        }
    }

    /// Parse `{namespace}local` (Clark notation) or a bare `local`.
    pub fn parse(name: &str) -> Self {
        if let Some(rest) = name.strip_prefix('{') {
            if let Some((uri, local)) = rest.split_once('}') {
                return Self::new(Some(uri), local);
            }
        }
        Self::new(None, name)
    }

    /// `wsu:Id` followed by the unqualified `Id`, `ID` and `id`.
    pub fn defaults() -> Vec<IdAttr> {
        vec![
            Self::new(Some(ns::WSU), ns::attr::ID),
            Self::new(None, "Id"),
            Self::new(None, "ID"),
            Self::new(None, "id"),
        ]
    }
}

/// Parse a same-document reference (e.g., `#foo` → `foo`).
pub fn parse_same_document_ref(uri: &str) -> Option<&str> {
    uri.strip_prefix('#').filter(|id| !id.is_empty())
}

/// Every element carrying `id` in one of `id_attrs`, in document order.
pub fn find_by_id(doc: &XmlDocument, id_attrs: &[IdAttr], id: &str) -> Vec<NodeId> {
    doc.elements()
        .into_iter()
        .filter(|&element| {
            id_attrs.iter().any(|a| {
                doc.attribute_ns(element, a.namespace.as_deref().unwrap_or(""), &a.local_name)
                    == Some(id)
            })
        })
        .collect()
}

/// Resolve an identifier to exactly one element.
///
/// A missing identifier and an identifier shared by several elements are
/// both errors: a signature must never be checked against an element
/// chosen by document order.
pub fn resolve_id(doc: &XmlDocument, id_attrs: &[IdAttr], id: &str) -> Result<NodeId, Error> {
    let mut matches = find_by_id(doc, id_attrs, id);
    match matches.len() {
        1 => Ok(matches.remove(0)),
        0 => Err(Error::InvalidUri(format!("ID not found: {id}"))),
        n => Err(Error::InvalidUri(format!("ID {id} is carried by {n} elements"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<r xmlns:wsu="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd"><a wsu:Id="x"/><b Id="y"/><c id="y"/></r>"#;

    #[test]
    fn test_same_document_ref() {
        assert_eq!(parse_same_document_ref("#abc"), Some("abc"));
        assert_eq!(parse_same_document_ref("#"), None);
        assert_eq!(parse_same_document_ref("abc"), None);
        assert_eq!(parse_same_document_ref(""), None);
    }

    #[test]
    fn test_resolve_wsu_id() {
        let doc = XmlDocument::parse(DOC).unwrap();
        let a = doc.child_elements(doc.root())[0];
        assert_eq!(resolve_id(&doc, &IdAttr::defaults(), "x").unwrap(), a);
    }

    #[test]
    fn test_duplicate_and_missing_ids_fail() {
        let doc = XmlDocument::parse(DOC).unwrap();
        assert!(resolve_id(&doc, &IdAttr::defaults(), "y").is_err());
        assert!(resolve_id(&doc, &IdAttr::defaults(), "nope").is_err());
    }

    #[test]
    fn test_unqualified_id_does_not_match_namespaced_lookup() {
        let doc = XmlDocument::parse(r#"<r><a Id="x"/></r>"#).unwrap();
        let only_wsu = [IdAttr::new(Some(ns::WSU), "Id")];
        assert!(find_by_id(&doc, &only_wsu, "x").is_empty());
    }

    #[test]
    fn test_parse_clark_notation() {
        assert_eq!(IdAttr::parse("{urn:x}Id"), IdAttr::new(Some("urn:x"), "Id"));
        assert_eq!(IdAttr::parse("ID"), IdAttr::new(None, "ID"));
    }
}
