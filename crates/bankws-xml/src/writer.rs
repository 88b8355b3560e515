#![forbid(unsafe_code)]

//! XML serialization of an [`XmlDocument`] through uppsala's serializer.

use crate::document::XmlDocument;
use uppsala::{NodeId, NodeKind, XmlWriteOptions};

/// The declaration emitted when one is requested.
pub const XML_DECLARATION: &str = "<?xml version='1.0' encoding='UTF-8'?>";

/// Serialize a document, optionally preceded by an XML declaration.
///
/// A declaration present in the parsed input is not carried over. Comments
/// and processing instructions outside the document element are kept, one
/// per line.
pub fn serialize(doc: &XmlDocument, xml_declaration: bool) -> Vec<u8> {
    let tree = doc.document();
    let options = XmlWriteOptions::compact();
    let mut out = String::new();
    if xml_declaration {
        out.push_str(XML_DECLARATION);
        out.push('\n');
    }
    let top_level: Vec<NodeId> = tree
        .children(tree.root())
        .into_iter()
        .filter(|&id| !matches!(tree.node_kind(id), Some(NodeKind::Text(_))))
        .collect();
    for (i, id) in top_level.into_iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&tree.node_to_xml_with_options(id, &options));
    }
    out.into_bytes()
}

/// Serialize the subtree at `id`, with ancestor namespace bindings taken as
/// already in scope.
pub fn serialize_element(doc: &XmlDocument, id: NodeId) -> Vec<u8> {
    doc.document()
        .node_to_xml_with_options(id, &XmlWriteOptions::compact())
        .into_bytes()
}
