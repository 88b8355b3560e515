#![forbid(unsafe_code)]

//! ReferenceSet: identifiers for signable elements and the `<Reference>`
//! list built from them.

use bankws_c14n::C14nMode;
use bankws_core::{algorithm, ns, Error};
use bankws_xml::{qname, NodeId, XmlDocument};

/// Elements queued for signing, identified by the `wsu:Id` given to them.
#[derive(Debug, Default)]
pub struct ReferenceSet {
    queue: Vec<String>,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `element` a fresh `wsu:Id` without queueing it.
    ///
    /// An existing `wsu:Id` is replaced, so marking is safe on retries.
    pub fn mark(&self, doc: &mut XmlDocument, element: NodeId) -> Result<String, Error> {
        let prefix = doc.ensure_namespace(element, ns::prefix::WSU, ns::WSU)?;
        let id = new_id();
        doc.set_attribute(element, qname(Some(&prefix), ns::WSU, ns::attr::ID), &id)?;
        Ok(id)
    }

    /// Mark `element` and queue it for SignedInfo.
    pub fn push_and_mark(&mut self, doc: &mut XmlDocument, element: NodeId) -> Result<String, Error> {
        let id = self.mark(doc, element)?;
        self.queue.push(id.clone());
        Ok(id)
    }

    /// Queued identifiers in signing order.
    pub fn queued(&self) -> &[String] {
        &self.queue
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// One detached `<Reference URI="#id">` per queued element, each with a
    /// canonicalization transform, SHA-1 and an empty `DigestValue`.
    ///
    /// With `implicit_document` set and nothing queued, a single
    /// `<Reference URI="">` with the enveloped-signature transform covers
    /// the whole document instead.
    pub fn build_references(
        &self,
        doc: &mut XmlDocument,
        ds_prefix: Option<&str>,
        mode: C14nMode,
        implicit_document: bool,
    ) -> Result<Vec<NodeId>, Error> {
        if self.queue.is_empty() && implicit_document {
            return Ok(vec![reference(doc, ds_prefix, "", algorithm::ENVELOPED_SIGNATURE)?]);
        }
        self.queue
            .iter()
            .map(|id| reference(doc, ds_prefix, &format!("#{id}"), mode.uri()))
            .collect()
    }
}

/// Set the `DigestValue` text of a `<Reference>` built by
/// [`ReferenceSet::build_references`].
pub fn fill_digest(doc: &mut XmlDocument, reference: NodeId, digest_b64: &str) -> Result<(), Error> {
    let value = doc
        .find_child(reference, ns::DSIG, ns::node::DIGEST_VALUE)
        .ok_or_else(|| Error::MissingElement("DigestValue".into()))?;
    doc.set_text(value, digest_b64)
}

/// `id-` followed by a random UUID.
pub fn new_id() -> String {
    format!("id-{}", uuid::Uuid::new_v4())
}

fn reference(doc: &mut XmlDocument, ds_prefix: Option<&str>, uri: &str, transform: &str) -> Result<NodeId, Error> {
    let algorithm_attr = || qname(None, "", ns::attr::ALGORITHM);
    let reference = doc.create_element(ds_prefix, ns::node::REFERENCE, ns::DSIG);
    doc.set_attribute(reference, qname(None, "", ns::attr::URI), uri)?;
    let transforms = doc.append_element(reference, ds_prefix, ns::node::TRANSFORMS, ns::DSIG)?;
    let t = doc.append_element(transforms, ds_prefix, ns::node::TRANSFORM, ns::DSIG)?;
    doc.set_attribute(t, algorithm_attr(), transform)?;
    let method = doc.append_element(reference, ds_prefix, ns::node::DIGEST_METHOD, ns::DSIG)?;
    doc.set_attribute(method, algorithm_attr(), algorithm::SHA1)?;
    doc.append_element(reference, ds_prefix, ns::node::DIGEST_VALUE, ns::DSIG)?;
    Ok(reference)
}
