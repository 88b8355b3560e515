#![forbid(unsafe_code)]

//! Typed view of a `<ds:Signature>` element, decoded in one pass.

use bankws_c14n::C14nMode;
use bankws_core::{algorithm, ns, Error};
use bankws_crypto::b64;
use bankws_keys::CertificateSource;
use bankws_xml::{NodeId, XmlDocument};
use std::collections::BTreeSet;

/// Everything the validator needs from a Signature element.
#[derive(Debug, Clone)]
pub struct SignatureRecord {
    pub signature: NodeId,
    pub signed_info: NodeId,
    pub c14n_mode: C14nMode,
    /// PrefixList of the CanonicalizationMethod's InclusiveNamespaces.
    pub inclusive_prefixes: Vec<String>,
    pub signature_method: String,
    pub signature_value: Vec<u8>,
    pub references: Vec<ReferenceRecord>,
    pub certificate: Option<CertificateSource>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRecord {
    pub uri: String,
    pub transforms: Vec<TransformRecord>,
    pub digest_method: String,
    pub digest_value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRecord {
    pub algorithm: String,
    pub inclusive_prefixes: Vec<String>,
}

impl ReferenceRecord {
    /// PrefixList carried by this reference's canonicalization transform.
    pub fn inclusive_prefixes(&self) -> &[String] {
        self.transforms
            .iter()
            .find(|t| C14nMode::from_uri(&t.algorithm).is_some())
            .map(|t| t.inclusive_prefixes.as_slice())
            .unwrap_or(&[])
    }
}

impl SignatureRecord {
    /// Decode the Signature element `signature`.
    pub fn decode(doc: &XmlDocument, signature: NodeId) -> Result<Self, Error> {
        doc.require(signature)?;

        let mut signed_info = None;
        let mut signature_value = None;
        let mut certificate = None;
        for (child, local_name) in dsig_children(doc, signature) {
            match local_name {
                ns::node::SIGNED_INFO if signed_info.is_none() => signed_info = Some(child),
                ns::node::SIGNATURE_VALUE if signature_value.is_none() => {
                    signature_value = Some(b64::decode(&doc.text(child))?)
                }
                ns::node::KEY_INFO if certificate.is_none() => {
                    certificate = CertificateSource::from_key_info(doc, child)
                }
                _ => {}
            }
        }

        let signed_info =
            signed_info.ok_or_else(|| Error::MissingElement(ns::node::SIGNED_INFO.into()))?;
        let signature_value = signature_value
            .ok_or_else(|| Error::MissingElement(ns::node::SIGNATURE_VALUE.into()))?;
        let info = decode_signed_info(doc, signed_info)?;

        Ok(Self {
            signature,
            signed_info,
            c14n_mode: info.c14n_mode,
            inclusive_prefixes: info.inclusive_prefixes,
            signature_method: info.signature_method,
            signature_value,
            references: info.references,
            certificate,
        })
    }
}

struct SignedInfo {
    c14n_mode: C14nMode,
    inclusive_prefixes: Vec<String>,
    signature_method: String,
    references: Vec<ReferenceRecord>,
}

/// Element children of `id` in the dsig namespace, with their local names.
fn dsig_children(doc: &XmlDocument, id: NodeId) -> Vec<(NodeId, &str)> {
    doc.child_elements(id)
        .into_iter()
        .filter_map(|child| {
            let element = doc.element(child)?;
            (element.name.namespace_uri.as_deref() == Some(ns::DSIG))
                .then(|| (child, element.name.local_name.as_ref()))
        })
        .collect()
}

fn decode_signed_info(doc: &XmlDocument, si: NodeId) -> Result<SignedInfo, Error> {
    let mut c14n = None;
    let mut signature_method = None;
    let mut references = Vec::new();
    for (child, local_name) in dsig_children(doc, si) {
        match local_name {
            ns::node::CANONICALIZATION_METHOD if c14n.is_none() => {
                let uri = require_algorithm(doc, child)?;
                let mode = C14nMode::from_uri(uri).ok_or_else(|| {
                    Error::UnsupportedAlgorithm(format!("canonicalization: {uri}"))
                })?;
                c14n = Some((mode, prefix_list(doc, child)));
            }
            ns::node::SIGNATURE_METHOD if signature_method.is_none() => {
                signature_method = Some(require_algorithm(doc, child)?.to_owned());
            }
            ns::node::REFERENCE => references.push(decode_reference(doc, child)?),
            _ => {}
        }
    }

    if references.is_empty() {
        return Err(Error::MissingElement(ns::node::REFERENCE.into()));
    }
    let mut seen = BTreeSet::new();
    for r in &references {
        if !seen.insert(r.uri.as_str()) {
            return Err(Error::XmlStructure(format!(
                "duplicate Reference URI {:?}",
                r.uri
            )));
        }
    }

    let (c14n_mode, inclusive_prefixes) =
        c14n.unwrap_or((C14nMode::InclusiveWithComments, Vec::new()));
    Ok(SignedInfo {
        c14n_mode,
        inclusive_prefixes,
        signature_method: signature_method
            .ok_or_else(|| Error::MissingElement(ns::node::SIGNATURE_METHOD.into()))?,
        references,
    })
}

fn decode_reference(doc: &XmlDocument, reference: NodeId) -> Result<ReferenceRecord, Error> {
    let mut transforms = Vec::new();
    let mut digest_method = None;
    let mut digest_value = None;
    for (child, local_name) in dsig_children(doc, reference) {
        match local_name {
            ns::node::TRANSFORMS => {
                for transform in doc.find_children(child, ns::DSIG, ns::node::TRANSFORM) {
                    transforms.push(TransformRecord {
                        algorithm: require_algorithm(doc, transform)?.to_owned(),
                        inclusive_prefixes: prefix_list(doc, transform),
                    });
                }
            }
            ns::node::DIGEST_METHOD => {
                digest_method = Some(require_algorithm(doc, child)?.to_owned())
            }
            ns::node::DIGEST_VALUE => digest_value = Some(b64::decode(&doc.text(child))?),
            _ => {}
        }
    }

    Ok(ReferenceRecord {
        uri: doc.attribute(reference, ns::attr::URI).unwrap_or("").to_owned(),
        transforms,
        digest_method: digest_method.unwrap_or_else(|| algorithm::SHA1.to_owned()),
        digest_value: digest_value
            .ok_or_else(|| Error::MissingElement(ns::node::DIGEST_VALUE.into()))?,
    })
}

fn require_algorithm(doc: &XmlDocument, element: NodeId) -> Result<&str, Error> {
    doc.attribute(element, ns::attr::ALGORITHM).ok_or_else(|| {
        let name = doc.qualified_name(element).unwrap_or_default();
        Error::MissingAttribute(format!("Algorithm on {name}"))
    })
}

fn prefix_list(doc: &XmlDocument, method: NodeId) -> Vec<String> {
    doc.find_child(method, ns::EXC_C14N, ns::node::INCLUSIVE_NAMESPACES)
        .and_then(|inc| doc.attribute(inc, ns::attr::PREFIX_LIST))
        .map(|list| list.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default()
}
