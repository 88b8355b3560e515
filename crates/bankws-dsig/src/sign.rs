#![forbid(unsafe_code)]

//! XML-DSig signature creation.
//!
//! Two profiles are supported:
//!
//! - **Application**: the enveloped signature of a bank request document. A
//!   single `URI=""` reference covers the whole document minus the
//!   signature, canonicalized with comments, and the certificate is embedded
//!   as `X509Certificate`.
//! - **WS-Security**: the signature of a SOAP envelope. The Body and the
//!   `wsu:Timestamp` are referenced by `wsu:Id` and canonicalized with
//!   exclusive C14N, and KeyInfo points at a BinarySecurityToken.

use crate::references::{self, ReferenceSet};
use crate::wsse;
use bankws_c14n::C14nMode;
use bankws_core::{algorithm, ns, Error};
use bankws_crypto::{b64, digest};
use bankws_keys::{keyinfo, Credentials};
use bankws_xml::{id, qname, writer, IdAttr, NodeId, XmlDocument};
use chrono::Utc;
use std::path::Path;
use std::time::Duration;

/// Which kind of document is being signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningProfile {
    Application,
    WsSecurity,
}

impl SigningProfile {
    /// Canonicalization used when [`SignOptions::c14n_mode`] is unset.
    pub fn default_c14n(self) -> C14nMode {
        match self {
            SigningProfile::Application => C14nMode::InclusiveWithComments,
            SigningProfile::WsSecurity => C14nMode::Exclusive,
        }
    }
}

/// Options for [`sign`].
#[derive(Debug, Clone)]
pub struct SignOptions {
    /// Overrides the profile's canonicalization.
    pub c14n_mode: Option<C14nMode>,
    /// Prefix the output with `<?xml version='1.0' encoding='UTF-8'?>`.
    pub xml_declaration: bool,
    /// Lifetime of a newly created `wsu:Timestamp`.
    pub timestamp_validity: Duration,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            c14n_mode: None,
            xml_declaration: false,
            timestamp_validity: Duration::from_secs(300),
        }
    }
}

/// Sign `document` with the key and certificate read from disk.
///
/// Any failure aborts the whole call; no partially signed output is
/// produced.
pub fn sign(
    document: &[u8],
    key_path: &Path,
    cert_path: &Path,
    profile: SigningProfile,
    options: &SignOptions,
) -> Result<Vec<u8>, Error> {
    let mut doc = XmlDocument::parse_bytes(document)?;
    let credentials = Credentials::load(key_path, cert_path)?;
    sign_document(&mut doc, &credentials, profile, options)?;
    Ok(writer::serialize(&doc, options.xml_declaration))
}

/// Insert a complete `<Signature>` into `doc`.
pub fn sign_document(
    doc: &mut XmlDocument,
    credentials: &Credentials,
    profile: SigningProfile,
    options: &SignOptions,
) -> Result<(), Error> {
    let mode = options.c14n_mode.unwrap_or(profile.default_c14n());
    let mut refs = ReferenceSet::new();

    let (parent, ds_prefix, key_info) = match profile {
        SigningProfile::Application => {
            remove_root_signatures(doc)?;
            let key_info = keyinfo::x509_key_info(doc, None, &credentials.certificate_der)?;
            (doc.root(), None, key_info)
        }
        SigningProfile::WsSecurity => {
            let prepared = wsse::prepare_envelope(
                doc,
                &credentials.certificate_der,
                options.timestamp_validity,
                &mut refs,
                Utc::now(),
            )?;
            let security = prepared.security;
            let key_info = keyinfo::token_reference_key_info(
                doc,
                Some(&security.ds),
                &security.wsse,
                &prepared.token_id,
            )?;
            (security.element, Some(security.ds), key_info)
        }
    };
    let ds_prefix = ds_prefix.as_deref();

    // Digests are taken before the Signature is attached, so the
    // whole-document reference already excludes it.
    let reference_elements =
        refs.build_references(doc, ds_prefix, mode, profile == SigningProfile::Application)?;
    for &reference in &reference_elements {
        let uri = doc.attribute(reference, ns::attr::URI).unwrap_or("").to_owned();
        let data = referenced_bytes(doc, &uri, mode)?;
        log::debug!("pre-digest data for URI {uri:?}:\n{}", String::from_utf8_lossy(&data));
        references::fill_digest(doc, reference, &digest::sha1_base64(&data))?;
    }

    let signature = doc.create_element(ds_prefix, ns::node::SIGNATURE, ns::DSIG);
    if ds_prefix.is_none() {
        doc.declare_namespace(signature, "", ns::DSIG)?;
    }
    let signed_info = doc.append_element(signature, ds_prefix, ns::node::SIGNED_INFO, ns::DSIG)?;
    algorithm_element(doc, signed_info, ds_prefix, ns::node::CANONICALIZATION_METHOD, mode.uri())?;
    algorithm_element(doc, signed_info, ds_prefix, ns::node::SIGNATURE_METHOD, algorithm::RSA_SHA1)?;
    for reference in reference_elements {
        doc.append_child(signed_info, reference)?;
    }
    let value = doc.append_element(signature, ds_prefix, ns::node::SIGNATURE_VALUE, ns::DSIG)?;
    doc.append_child(signature, key_info)?;

    // SignedInfo is canonicalized in place so that it sees exactly the
    // namespace context a verifier of the output will see.
    doc.append_child(parent, signature)?;
    let canonical = bankws_c14n::canonicalize_element(doc, signed_info, mode, &[])?;
    log::debug!("pre-signature SignedInfo:\n{}", String::from_utf8_lossy(&canonical));
    let signature_value = bankws_crypto::sign::from_uri(algorithm::RSA_SHA1)?
        .sign(&credentials.signing_key(), &canonical)?;
    doc.set_text(value, &b64::encode(&signature_value))?;

    log::info!(
        "signed document ({:?} profile, {} canonicalization)",
        profile,
        mode
    );
    Ok(())
}

/// Canonical bytes a reference URI covers: the document for `""`, the
/// identified element for `#id`.
fn referenced_bytes(doc: &XmlDocument, uri: &str, mode: C14nMode) -> Result<Vec<u8>, Error> {
    if uri.is_empty() {
        return bankws_c14n::canonicalize_document(doc, mode);
    }
    let id = id::parse_same_document_ref(uri)
        .ok_or_else(|| Error::InvalidUri(format!("unsupported reference URI: {uri}")))?;
    let element = id::resolve_id(doc, &IdAttr::defaults(), id)?;
    bankws_c14n::canonicalize_element(doc, element, mode, &[])
}

fn algorithm_element(
    doc: &mut XmlDocument,
    parent: NodeId,
    prefix: Option<&str>,
    local_name: &str,
    uri: &str,
) -> Result<NodeId, Error> {
    let element = doc.append_element(parent, prefix, local_name, ns::DSIG)?;
    doc.set_attribute(element, qname(None, "", ns::attr::ALGORITHM), uri)?;
    Ok(element)
}

/// Signatures appended to the document element by an earlier attempt.
fn remove_root_signatures(doc: &mut XmlDocument) -> Result<(), Error> {
    let stale = doc.find_children(doc.root(), ns::DSIG, ns::node::SIGNATURE);
    for &signature in &stale {
        doc.remove(signature)?;
    }
    if !stale.is_empty() {
        log::debug!("removed existing Signature from the document element");
    }
    Ok(())
}
