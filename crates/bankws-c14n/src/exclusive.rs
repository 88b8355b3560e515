#![forbid(unsafe_code)]

//! Exclusive XML Canonicalization 1.0.
//!
//! Algorithm URI: `http://www.w3.org/2001/10/xml-exc-c14n#`
//! With comments: `http://www.w3.org/2001/10/xml-exc-c14n#WithComments`
//!
//! Only "visibly utilized" namespace prefixes are rendered: the element's
//! own prefix and those of its attributes, plus any prefix named in the
//! InclusiveNamespaces PrefixList. A subtree canonicalizes to the same bytes
//! wherever it is moved in a document, which is what WS-Security relies on.

use crate::render::{NamespacePolicy, NsDecl, NsMap, Renderer};
use bankws_xml::{NodeId, XmlDocument};
use std::collections::BTreeSet;
use uppsala::Element;

struct ExclusivePolicy {
    inclusive_prefixes: Vec<String>,
}

impl NamespacePolicy for ExclusivePolicy {
    fn select(&self, element: &Element<'_>, scope: &NsMap, rendered: &NsMap) -> Vec<NsDecl> {
        let mut utilized: BTreeSet<&str> = BTreeSet::new();
        utilized.insert(element.name.prefix.as_deref().unwrap_or(""));
        for attr in &element.attributes {
            if let Some(prefix) = attr.name.prefix.as_deref().filter(|p| *p != "xml") {
                utilized.insert(prefix);
            }
        }
        for prefix in &self.inclusive_prefixes {
            if scope.contains_key(prefix) {
                utilized.insert(prefix.as_str());
            }
        }

        utilized
            .into_iter()
            .filter_map(|prefix| {
                let uri = scope.get(prefix).map_or("", String::as_str);
                let previous = rendered.get(prefix).map_or("", String::as_str);
                if uri == previous || (!prefix.is_empty() && uri.is_empty()) {
                    return None;
                }
                Some(NsDecl {
                    prefix: prefix.to_owned(),
                    uri: uri.to_owned(),
                })
            })
            .collect()
    }

    fn inherits_xml_attrs(&self) -> bool {
        false
    }
}

/// Canonicalize a document (or the subtree at `apex`) using Exclusive C14N.
///
/// `inclusive_prefixes` is the InclusiveNamespaces PrefixList; `#default`
/// stands for the default namespace.
pub fn canonicalize(
    doc: &XmlDocument,
    apex: Option<NodeId>,
    with_comments: bool,
    inclusive_prefixes: &[String],
) -> Vec<u8> {
    let policy = ExclusivePolicy {
        inclusive_prefixes: inclusive_prefixes
            .iter()
            .map(|p| if p == "#default" { String::new() } else { p.clone() })
            .collect(),
    };
    Renderer::new(doc, &policy, with_comments).render(apex)
}

/// Split a `PrefixList` attribute value into prefixes.
pub fn parse_prefix_list(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_owned).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENVELOPE: &str = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" xmlns:wsu="urn:wsu" xmlns:unused="urn:unused"><soap:Header/><soap:Body wsu:Id="b"><m:Op xmlns:m="urn:m"><m:x>1</m:x></m:Op></soap:Body></soap:Envelope>"#;

    /// Canonical form of the `index`th element child of the document element,
    /// or of the whole document.
    fn c14n(xml: &str, index: Option<usize>, prefixes: &[String]) -> String {
        let doc = XmlDocument::parse(xml).unwrap();
        let apex = index.map(|i| doc.child_elements(doc.root())[i]);
        String::from_utf8(canonicalize(&doc, apex, false, prefixes)).unwrap()
    }

    #[test]
    fn test_only_visibly_utilized_namespaces() {
        assert_eq!(
            c14n(ENVELOPE, Some(1), &[]),
            r#"<soap:Body xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" xmlns:wsu="urn:wsu" wsu:Id="b"><m:Op xmlns:m="urn:m"><m:x>1</m:x></m:Op></soap:Body>"#
        );
    }

    #[test]
    fn test_subtree_is_context_independent() {
        let moved = r#"<other xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" xmlns:x="urn:x"><soap:Body xmlns:wsu="urn:wsu" wsu:Id="b"><m:Op xmlns:m="urn:m"><m:x>1</m:x></m:Op></soap:Body></other>"#;
        assert_eq!(c14n(ENVELOPE, Some(1), &[]), c14n(moved, Some(0), &[]));
    }

    #[test]
    fn test_inclusive_prefix_list() {
        let out = c14n(ENVELOPE, Some(1), &parse_prefix_list("unused"));
        assert!(out.starts_with(
            r#"<soap:Body xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" xmlns:unused="urn:unused" xmlns:wsu="urn:wsu""#
        ));
    }

    #[test]
    fn test_default_namespace() {
        let xml = r#"<a xmlns="urn:a"><b><c xmlns=""/></b></a>"#;
        assert_eq!(
            c14n(xml, Some(0), &[]),
            r#"<b xmlns="urn:a"><c xmlns=""></c></b>"#
        );
        assert_eq!(c14n(r#"<x:a xmlns:x="urn:x" xmlns="urn:d"/>"#, None, &[]), r#"<x:a xmlns:x="urn:x"></x:a>"#);
        assert_eq!(
            c14n(r#"<r xmlns="urn:a" xmlns:a="urn:a"><x/></r>"#, None, &[]),
            r#"<r xmlns="urn:a"><x></x></r>"#
        );
    }

    #[test]
    fn test_comments_follow_mode() {
        let doc = XmlDocument::parse("<r><!--c-->t</r>").unwrap();
        assert_eq!(canonicalize(&doc, None, false, &[]), b"<r>t</r>");
        assert_eq!(canonicalize(&doc, None, true, &[]), b"<r><!--c-->t</r>");
    }
}
