#![forbid(unsafe_code)]

//! Inclusive Canonical XML 1.0 (C14N 1.0).
//!
//! Algorithm URI: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315`
//! With comments: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments`
//!
//! Every namespace in scope is rendered on the first output element where it
//! differs from what the nearest output ancestor rendered. When a subtree is
//! canonicalized on its own, its apex therefore carries all namespaces and
//! `xml:*` attributes inherited from the ancestors it was cut from.

use crate::render::{NamespacePolicy, NsDecl, NsMap, Renderer};
use bankws_xml::{NodeId, XmlDocument};
use uppsala::Element;

struct InclusivePolicy;

impl NamespacePolicy for InclusivePolicy {
    fn select(&self, _element: &Element<'_>, scope: &NsMap, rendered: &NsMap) -> Vec<NsDecl> {
        scope
            .iter()
            .filter(|(prefix, _)| *prefix != "xml")
            .filter(|(prefix, uri)| {
                let previous = rendered.get(*prefix).map_or("", String::as_str);
                if prefix.is_empty() {
                    // xmlns="" only when undoing a rendered default.
                    uri.as_str() != previous
                } else {
                    !uri.is_empty() && uri.as_str() != previous
                }
            })
            .map(|(prefix, uri)| NsDecl {
                prefix: prefix.clone(),
                uri: uri.clone(),
            })
            .collect()
    }

    fn inherits_xml_attrs(&self) -> bool {
        true
    }
}

/// Canonicalize a document (or the subtree at `apex`) using Inclusive C14N 1.0.
pub fn canonicalize(doc: &XmlDocument, apex: Option<NodeId>, with_comments: bool) -> Vec<u8> {
    Renderer::new(doc, &InclusivePolicy, with_comments).render(apex)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c14n(xml: &str, with_comments: bool) -> String {
        let doc = XmlDocument::parse(xml).unwrap();
        String::from_utf8(canonicalize(&doc, None, with_comments)).unwrap()
    }

    /// Canonical form of the document element's first element child.
    fn c14n_first_child(xml: &str) -> String {
        let doc = XmlDocument::parse(xml).unwrap();
        let apex = doc.child_elements(doc.root())[0];
        String::from_utf8(canonicalize(&doc, Some(apex), false)).unwrap()
    }

    #[test]
    fn test_simple_c14n() {
        // Attributes sorted by local name, empty elements expanded.
        assert_eq!(
            c14n(r#"<root><a b="1" a="2"/></root>"#, false),
            r#"<root><a a="2" b="1"></a></root>"#
        );
    }

    #[test]
    fn test_namespace_rendering() {
        let out = c14n(
            r#"<root xmlns:b="http://b" xmlns:a="http://a"><a:child xmlns:a="http://a"/></root>"#,
            false,
        );
        assert_eq!(
            out,
            r#"<root xmlns:a="http://a" xmlns:b="http://b"><a:child></a:child></root>"#
        );
    }

    #[test]
    fn test_namespaced_attribute_order() {
        let out = c14n(
            r#"<e xmlns:z="urn:a" xmlns:y="urn:b" y:x="1" z:x="2" b="3" a="4"/>"#,
            false,
        );
        assert_eq!(
            out,
            r#"<e xmlns:y="urn:b" xmlns:z="urn:a" a="4" b="3" z:x="2" y:x="1"></e>"#
        );
    }

    #[test]
    fn test_text_escaping() {
        assert_eq!(
            c14n(r#"<root>a &amp; b &lt; c &gt; "d"</root>"#, false),
            r#"<root>a &amp; b &lt; c &gt; "d"</root>"#
        );
    }

    #[test]
    fn test_comments_and_document_level_nodes() {
        let xml = "<!--before--><r><!--in-->x</r><?pi  tail?><!--after-->";
        assert_eq!(c14n(xml, false), "<r>x</r>\n<?pi tail?>");
        assert_eq!(
            c14n(xml, true),
            "<!--before-->\n<r><!--in-->x</r>\n<?pi tail?>\n<!--after-->"
        );
    }

    #[test]
    fn test_default_namespace_undeclaration() {
        assert_eq!(
            c14n(r#"<a xmlns="urn:a"><b xmlns=""><c xmlns=""/></b></a>"#, false),
            r#"<a xmlns="urn:a"><b xmlns=""><c></c></b></a>"#
        );
        // Nothing to undo at the top level.
        assert_eq!(c14n(r#"<a xmlns=""/>"#, false), "<a></a>");
    }

    #[test]
    fn test_subtree_inherits_all_namespaces_and_xml_attrs() {
        let xml = r#"<r xmlns="urn:d" xmlns:p="urn:p" xml:lang="fi"><p:s a="1"><t/></p:s></r>"#;
        assert_eq!(
            c14n_first_child(xml),
            r#"<p:s xmlns="urn:d" xmlns:p="urn:p" a="1" xml:lang="fi"><t></t></p:s>"#
        );
    }

    #[test]
    fn test_unprefixed_names_stay_unprefixed() {
        assert_eq!(
            c14n(r#"<r xmlns="urn:a" xmlns:a="urn:a"><x/><a:y/></r>"#, false),
            r#"<r xmlns="urn:a" xmlns:a="urn:a"><x></x><a:y></a:y></r>"#
        );
    }

    #[test]
    fn test_processing_instruction_data_is_verbatim() {
        let mut tree = uppsala::parse("<r/>").unwrap().into_static();
        let root = tree.document_element().unwrap();
        let pi = tree.create_processing_instruction("pi", Some("a\r\nb > c & d".into()));
        tree.append_child(root, pi);
        let doc = XmlDocument::from_document(tree).unwrap();
        assert_eq!(
            canonicalize(&doc, None, false),
            b"<r><?pi a\r\nb > c & d?></r>"
        );
    }

    #[test]
    fn test_whitespace_inside_tags_is_insignificant() {
        assert_eq!(
            c14n("<r  a = 'x' \n>\n  <s   /></r >", false),
            "<r a=\"x\">\n  <s></s></r>"
        );
    }
}
