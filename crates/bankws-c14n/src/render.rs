#![forbid(unsafe_code)]

//! Shared rendering for C14N output.
//!
//! Both C14N variants walk the uppsala tree the same way and differ only in
//! which namespace declarations an element renders; that choice is supplied
//! by a [`NamespacePolicy`].

use crate::escape;
use bankws_core::ns;
use bankws_xml::XmlDocument;
use std::collections::BTreeMap;
use uppsala::{Element, NodeId, NodeKind};

/// Prefix → URI bindings. `""` is the default namespace.
pub type NsMap = BTreeMap<String, String>;

/// A namespace declaration to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsDecl {
    /// The prefix ("" for default namespace).
    pub prefix: String,
    /// The namespace URI.
    pub uri: String,
}

impl NsDecl {
    fn write(&self, out: &mut Vec<u8>) {
        if self.prefix.is_empty() {
            out.extend_from_slice(b" xmlns=\"");
        } else {
            out.extend_from_slice(b" xmlns:");
            out.extend_from_slice(self.prefix.as_bytes());
            out.extend_from_slice(b"=\"");
        }
        out.extend_from_slice(escape::escape_attr(&self.uri).as_bytes());
        out.push(b'"');
    }
}

impl Ord for NsDecl {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Default namespace first, then by prefix.
        match (self.prefix.is_empty(), other.prefix.is_empty()) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => self.prefix.cmp(&other.prefix),
        }
    }
}

impl PartialOrd for NsDecl {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// An attribute to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    /// The namespace URI of the attribute ("" for no namespace).
    pub ns_uri: String,
    pub local_name: String,
    /// `prefix:local` or just `local`.
    pub qualified_name: String,
    pub value: String,
}

impl Attr {
    fn write(&self, out: &mut Vec<u8>) {
        out.push(b' ');
        out.extend_from_slice(self.qualified_name.as_bytes());
        out.extend_from_slice(b"=\"");
        out.extend_from_slice(escape::escape_attr(&self.value).as_bytes());
        out.push(b'"');
    }
}

impl From<&uppsala::Attribute<'_>> for Attr {
    fn from(a: &uppsala::Attribute<'_>) -> Self {
        Self {
            ns_uri: a.name.namespace_uri.as_deref().unwrap_or("").to_owned(),
            local_name: a.name.local_name.to_string(),
            qualified_name: a.name.prefixed_name().into_owned(),
            value: a.value.to_string(),
        }
    }
}

impl Ord for Attr {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Unqualified attributes first (by local name), then by
        // (namespace URI, local name).
        match (self.ns_uri.is_empty(), other.ns_uri.is_empty()) {
            (true, true) => self.local_name.cmp(&other.local_name),
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            (false, false) => self
                .ns_uri
                .cmp(&other.ns_uri)
                .then(self.local_name.cmp(&other.local_name)),
        }
    }
}

impl PartialOrd for Attr {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Decides which namespace declarations an element renders.
pub(crate) trait NamespacePolicy {
    /// `scope` is everything in scope at `element`; `rendered` is what the
    /// nearest rendered ancestor already put in effect.
    fn select(&self, element: &Element<'_>, scope: &NsMap, rendered: &NsMap) -> Vec<NsDecl>;

    /// Whether a subtree apex picks up `xml:*` attributes from its ancestors.
    fn inherits_xml_attrs(&self) -> bool;
}

pub(crate) struct Renderer<'d, 'p, P: NamespacePolicy> {
    doc: &'d XmlDocument,
    policy: &'p P,
    with_comments: bool,
    out: Vec<u8>,
}

impl<'d, 'p, P: NamespacePolicy> Renderer<'d, 'p, P> {
    pub(crate) fn new(doc: &'d XmlDocument, policy: &'p P, with_comments: bool) -> Self {
        Self {
            doc,
            policy,
            with_comments,
            out: Vec::new(),
        }
    }

    pub(crate) fn render(mut self, apex: Option<NodeId>) -> Vec<u8> {
        let doc = self.doc;
        let tree = doc.document();
        match apex {
            None => {
                let mut after_root = false;
                for child in tree.children(tree.root()) {
                    match tree.node_kind(child) {
                        Some(NodeKind::Element(_)) => {
                            self.element(child, &NsMap::new(), &NsMap::new(), &[]);
                            after_root = true;
                        }
                        Some(NodeKind::Comment(_) | NodeKind::ProcessingInstruction(_)) => {
                            if !self.renders(child) {
                                continue;
                            }
                            // Outside the document element each node sits on
                            // its own line.
                            if after_root {
                                self.out.push(b'\n');
                                self.leaf(child);
                            } else {
                                self.leaf(child);
                                self.out.push(b'\n');
                            }
                        }
                        _ => {}
                    }
                }
            }
            Some(id) => {
                let parent_scope = match tree.parent(id).filter(|&p| doc.element(p).is_some()) {
                    Some(parent) => doc.in_scope_namespaces(parent),
                    None => NsMap::new(),
                };
                let inherited = if self.policy.inherits_xml_attrs() {
                    inherited_xml_attrs(doc, id)
                } else {
                    Vec::new()
                };
                self.element(id, &parent_scope, &NsMap::new(), &inherited);
            }
        }
        self.out
    }

    fn renders(&self, id: NodeId) -> bool {
        match self.doc.document().node_kind(id) {
            Some(NodeKind::Comment(_)) => self.with_comments,
            Some(NodeKind::ProcessingInstruction(_)) => true,
            _ => false,
        }
    }

    fn leaf(&mut self, id: NodeId) {
        let doc = self.doc;
        match doc.document().node_kind(id) {
            Some(NodeKind::Text(t) | NodeKind::CData(t)) => {
                self.out.extend_from_slice(escape::escape_text(t).as_bytes())
            }
            Some(NodeKind::Comment(c)) => {
                if self.with_comments {
                    self.out.extend_from_slice(b"<!--");
                    self.out.extend_from_slice(c.as_bytes());
                    self.out.extend_from_slice(b"-->");
                }
            }
            Some(NodeKind::ProcessingInstruction(pi)) => {
                self.out.extend_from_slice(b"<?");
                self.out.extend_from_slice(pi.target.as_bytes());
                if let Some(data) = pi.data.as_deref().filter(|d| !d.is_empty()) {
                    self.out.push(b' ');
                    self.out.extend_from_slice(data.as_bytes());
                }
                self.out.extend_from_slice(b"?>");
            }
            _ => {}
        }
    }

    fn element(&mut self, id: NodeId, parent_scope: &NsMap, rendered: &NsMap, extra: &[Attr]) {
        let doc = self.doc;
        let Some(element) = doc.element(id) else {
            return;
        };

        let mut scope = parent_scope.clone();
        for (prefix, uri) in &element.namespace_declarations {
            scope.insert(prefix.to_string(), uri.to_string());
        }

        let mut ns_decls = self.policy.select(element, &scope, rendered);
        ns_decls.sort();

        let mut attrs: Vec<Attr> = element.attributes.iter().map(Attr::from).collect();
        for attr in extra {
            let present = attrs
                .iter()
                .any(|a| a.ns_uri == attr.ns_uri && a.local_name == attr.local_name);
            if !present {
                attrs.push(attr.clone());
            }
        }
        attrs.sort();

        let name = element.name.prefixed_name();
        self.out.push(b'<');
        self.out.extend_from_slice(name.as_bytes());
        for decl in &ns_decls {
            decl.write(&mut self.out);
        }
        for attr in &attrs {
            attr.write(&mut self.out);
        }
        self.out.push(b'>');

        let mut child_rendered = rendered.clone();
        for decl in ns_decls {
            child_rendered.insert(decl.prefix, decl.uri);
        }
        for child in doc.document().children_iter(id) {
            if doc.element(child).is_some() {
                self.element(child, &scope, &child_rendered, &[]);
            } else {
                self.leaf(child);
            }
        }

        self.out.extend_from_slice(b"</");
        self.out.extend_from_slice(name.as_bytes());
        self.out.push(b'>');
    }
}

/// `xml:*` attributes in effect at `id` from its ancestors, nearest wins.
fn inherited_xml_attrs(doc: &XmlDocument, id: NodeId) -> Vec<Attr> {
    let mut seen: BTreeMap<String, Attr> = BTreeMap::new();
    for ancestor in doc.ancestors(id).into_iter().filter_map(|a| doc.element(a)) {
        for attr in &ancestor.attributes {
            if attr.name.namespace_uri.as_deref() == Some(ns::XML) {
                seen.entry(attr.name.local_name.to_string())
                    .or_insert_with(|| Attr::from(attr));
            }
        }
    }
    seen.into_values().collect()
}
