#![forbid(unsafe_code)]

//! Mutable XML document backed by an `uppsala` arena.
//!
//! The signer edits the tree in place (headers, tokens and the Signature
//! itself) and the canonicalizer walks it. Nodes are addressed by
//! [`NodeId`]. Element and attribute names keep the prefixes they were
//! written with; an empty namespace name is stored as no namespace.

use bankws_core::Error;
use std::borrow::Cow;
use std::collections::BTreeMap;
use uppsala::{Attribute, Document, Element, NodeId, NodeKind, QName};

/// Build an owned name. `""` for `namespace` means no namespace.
pub fn qname(prefix: Option<&str>, namespace: &str, local_name: &str) -> QName<'static> {
    QName {
        namespace_uri: non_empty(namespace).map(|ns| Cow::Owned(ns.to_owned())),
        prefix: prefix
            .filter(|p| !p.is_empty())
            .map(|p| Cow::Owned(p.to_owned())),
        local_name: Cow::Owned(local_name.to_owned()),
    }
}

fn non_empty(namespace: &str) -> Option<&str> {
    Some(namespace).filter(|ns| !ns.is_empty())
}

/// A parsed XML document and its document element.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    doc: Document<'static>,
    root: NodeId,
}

impl XmlDocument {
    /// Parse XML text. DTDs are rejected.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let doc = crate::parser()
            .parse(text)
            .map_err(|e| Error::XmlParse(e.to_string()))?
            .into_static();
        Self::from_document(doc)
    }

    /// Parse XML from bytes (UTF-8).
    pub fn parse_bytes(data: &[u8]) -> Result<Self, Error> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::XmlParse(format!("invalid UTF-8: {e}")))?;
        Self::parse(text)
    }

    /// Wrap an already built document.
    pub fn from_document(mut doc: Document<'static>) -> Result<Self, Error> {
        let root = doc
            .document_element()
            .ok_or_else(|| Error::XmlParse("document has no root element".into()))?;
        drop_empty_namespaces(&mut doc);
        Ok(Self { doc, root })
    }

    pub fn document(&self) -> &Document<'static> {
        &self.doc
    }

    /// The document element.
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn element(&self, id: NodeId) -> Option<&Element<'static>> {
        self.doc.element(id)
    }

    /// Like [`element`](Self::element) but reports a structure error.
    pub fn require(&self, id: NodeId) -> Result<&Element<'static>, Error> {
        self.doc
            .element(id)
            .ok_or_else(|| Error::XmlStructure(format!("node {} is not an element", id.index())))
    }

    fn require_mut(&mut self, id: NodeId) -> Result<&mut Element<'static>, Error> {
        self.doc
            .element_mut(id)
            .ok_or_else(|| Error::XmlStructure(format!("node {} is not an element", id.index())))
    }

    /// Whether `id` is an element named `local_name` in `namespace` (`""`
    /// for no namespace).
    pub fn is(&self, id: NodeId, namespace: &str, local_name: &str) -> bool {
        self.doc
            .element(id)
            .is_some_and(|e| e.name.matches(non_empty(namespace), local_name))
    }

    /// `prefix:local` or `local`, as written.
    pub fn qualified_name(&self, id: NodeId) -> Option<String> {
        self.doc.element(id).map(|e| e.name.prefixed_name().into_owned())
    }

    /// Value of an attribute in no namespace.
    pub fn attribute(&self, id: NodeId, local_name: &str) -> Option<&str> {
        self.attribute_ns(id, "", local_name)
    }

    /// Value of a namespaced attribute (`""` for no namespace).
    pub fn attribute_ns(&self, id: NodeId, namespace: &str, local_name: &str) -> Option<&str> {
        self.doc
            .element(id)?
            .attributes
            .iter()
            .find(|a| a.name.matches(non_empty(namespace), local_name))
            .map(|a| a.value.as_ref())
    }

    /// Set an attribute, replacing any attribute with the same expanded
    /// name whatever prefix it was written with.
    pub fn set_attribute(&mut self, id: NodeId, name: QName<'static>, value: &str) -> Result<(), Error> {
        let value = Cow::Owned(value.to_owned());
        let element = self.require_mut(id)?;
        let namespace = name.namespace_uri.clone();
        match element
            .attributes
            .iter_mut()
            .find(|a| a.name.matches(namespace.as_deref(), &name.local_name))
        {
            Some(attr) => {
                attr.name = name;
                attr.value = value;
            }
            None => element.attributes.push(Attribute { name, value }),
        }
        Ok(())
    }

    /// Concatenated text of the immediate text and CDATA children.
    pub fn text(&self, id: NodeId) -> String {
        self.doc
            .children_iter(id)
            .filter_map(|child| self.doc.text_content(child))
            .collect()
    }

    /// Replace every child of `id` with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<(), Error> {
        self.require(id)?;
        for child in self.doc.children(id) {
            self.doc.remove_child(id, child);
        }
        let node = self.doc.create_text(text.to_owned());
        self.doc.append_child(id, node);
        Ok(())
    }

    /// Element children of `id` in document order.
    pub fn child_elements(&self, id: NodeId) -> Vec<NodeId> {
        self.doc
            .children_iter(id)
            .filter(|&child| self.doc.element(child).is_some())
            .collect()
    }

    pub fn find_child(&self, id: NodeId, namespace: &str, local_name: &str) -> Option<NodeId> {
        self.doc
            .children_iter(id)
            .find(|&child| self.is(child, namespace, local_name))
    }

    pub fn find_children(&self, id: NodeId, namespace: &str, local_name: &str) -> Vec<NodeId> {
        self.doc
            .children_iter(id)
            .filter(|&child| self.is(child, namespace, local_name))
            .collect()
    }

    /// Every element attached to the tree, in document order, the root first.
    pub fn elements(&self) -> Vec<NodeId> {
        self.doc
            .descendants(self.doc.root())
            .into_iter()
            .filter(|&id| self.doc.element(id).is_some())
            .collect()
    }

    /// First element in document order with the given expanded name.
    pub fn find_element(&self, namespace: &str, local_name: &str) -> Option<NodeId> {
        self.find_elements(namespace, local_name).into_iter().next()
    }

    /// All elements in document order with the given expanded name.
    pub fn find_elements(&self, namespace: &str, local_name: &str) -> Vec<NodeId> {
        self.elements()
            .into_iter()
            .filter(|&id| self.is(id, namespace, local_name))
            .collect()
    }

    /// Element ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        self.doc
            .ancestors(id)
            .into_iter()
            .filter(|&a| self.doc.element(a).is_some())
            .collect()
    }

    /// Namespace bindings in scope at `id`, including its own declarations.
    /// An undeclared default namespace maps `""` → `""`.
    pub fn in_scope_namespaces(&self, id: NodeId) -> BTreeMap<String, String> {
        let mut chain = self.ancestors(id);
        chain.reverse();
        chain.push(id);
        let mut scope = BTreeMap::new();
        for element in chain.into_iter().filter_map(|e| self.doc.element(e)) {
            for (prefix, uri) in &element.namespace_declarations {
                scope.insert(prefix.to_string(), uri.to_string());
            }
        }
        scope
    }

    /// Declare `prefix` → `uri` on `id`, replacing an earlier declaration
    /// of the same prefix there. `""` is the default namespace.
    pub fn declare_namespace(&mut self, id: NodeId, prefix: &str, uri: &str) -> Result<(), Error> {
        self.require(id)?;
        self.doc.declare_namespace(id, Some(prefix), uri.to_owned());
        Ok(())
    }

    /// Return a prefix bound to `uri` at `id`, declaring `preferred` (or a
    /// numbered variant of it) on that element when no binding exists.
    pub fn ensure_namespace(&mut self, id: NodeId, preferred: &str, uri: &str) -> Result<String, Error> {
        let scope = self.in_scope_namespaces(id);
        if scope.get(preferred).map(String::as_str) == Some(uri) {
            return Ok(preferred.to_owned());
        }
        if let Some((prefix, _)) = scope.iter().find(|(p, u)| !p.is_empty() && *u == uri) {
            return Ok(prefix.clone());
        }
        let mut prefix = preferred.to_owned();
        let mut n = 1;
        while scope.contains_key(&prefix) {
            prefix = format!("{preferred}{n}");
            n += 1;
        }
        self.declare_namespace(id, &prefix, uri)?;
        Ok(prefix)
    }

    /// Create a detached element. Attach it with
    /// [`append_child`](Self::append_child) or [`prepend_child`](Self::prepend_child).
    pub fn create_element(&mut self, prefix: Option<&str>, local_name: &str, namespace: &str) -> NodeId {
        self.doc.create_element(qname(prefix, namespace, local_name))
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), Error> {
        self.require(parent)?;
        self.doc.append_child(parent, child);
        Ok(())
    }

    /// Attach `child` as the first child of `parent`.
    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), Error> {
        self.require(parent)?;
        match self.doc.first_child(parent) {
            Some(first) => self.doc.insert_before(parent, child, first),
            None => self.doc.append_child(parent, child),
        }
        Ok(())
    }

    /// Create an element and append it to `parent`.
    pub fn append_element(
        &mut self,
        parent: NodeId,
        prefix: Option<&str>,
        local_name: &str,
        namespace: &str,
    ) -> Result<NodeId, Error> {
        let child = self.create_element(prefix, local_name, namespace);
        self.append_child(parent, child)?;
        Ok(child)
    }

    /// Detach `id` from the tree. The document element itself cannot be removed.
    pub fn remove(&mut self, id: NodeId) -> Result<(), Error> {
        if id == self.root {
            return Err(Error::XmlStructure("cannot remove the document element".into()));
        }
        let parent = self
            .doc
            .parent(id)
            .ok_or_else(|| Error::XmlStructure(format!("node {} is not attached", id.index())))?;
        self.doc.remove_child(parent, id);
        Ok(())
    }
}

/// Rewrite `Some("")` namespace names on elements and attributes to `None`.
fn drop_empty_namespaces(doc: &mut Document<'static>) {
    let affected: Vec<NodeId> = doc
        .descendants(doc.root())
        .into_iter()
        .filter(|&id| match doc.node_kind(id) {
            Some(NodeKind::Element(e)) => {
                is_empty_namespace(&e.name) || e.attributes.iter().any(|a| is_empty_namespace(&a.name))
            }
            _ => false,
        })
        .collect();
    for id in affected {
        if let Some(element) = doc.element_mut(id) {
            clear_empty_namespace(&mut element.name);
            for attr in &mut element.attributes {
                clear_empty_namespace(&mut attr.name);
            }
        }
    }
}

fn is_empty_namespace(name: &QName<'_>) -> bool {
    name.namespace_uri.as_deref() == Some("")
}

fn clear_empty_namespace(name: &mut QName<'static>) {
    if is_empty_namespace(name) {
        name.namespace_uri = None;
    }
}
