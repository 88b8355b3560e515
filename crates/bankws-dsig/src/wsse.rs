#![forbid(unsafe_code)]

//! SOAP envelope preparation for the WS-Security signing profile.
//!
//! Locates or creates `soap:Header/wsse:Security`, drops what a previous
//! signing attempt left behind, and marks the Body and the `wsu:Timestamp`
//! for signing. The certificate goes into a `wsse:BinarySecurityToken`
//! that KeyInfo points at.

use crate::references::ReferenceSet;
use bankws_core::{algorithm, ns, Error};
use bankws_keys::keyinfo;
use bankws_xml::{qname, NodeId, XmlDocument};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::time::Duration;

/// The Security header and the prefixes bound in its scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityHeader {
    pub element: NodeId,
    pub ds: String,
    pub wsse: String,
    pub wsu: String,
}

/// Result of [`prepare_envelope`].
#[derive(Debug, Clone)]
pub struct PreparedEnvelope {
    pub security: SecurityHeader,
    /// `wsu:Id` of the inserted BinarySecurityToken.
    pub token_id: String,
}

/// Namespace of the SOAP envelope at the document root.
pub fn soap_namespace(doc: &XmlDocument) -> Result<&'static str, Error> {
    let root = doc.root();
    [ns::SOAP11_ENV, ns::SOAP12_ENV]
        .into_iter()
        .find(|soap| doc.is(root, soap, ns::node::ENVELOPE))
        .ok_or_else(|| {
            Error::XmlStructure(format!(
                "document element {} is not a SOAP Envelope",
                doc.qualified_name(root).unwrap_or_default()
            ))
        })
}

/// Mark Body and Timestamp for signing and insert the certificate token.
pub fn prepare_envelope(
    doc: &mut XmlDocument,
    certificate_der: &[u8],
    timestamp_validity: Duration,
    refs: &mut ReferenceSet,
    now: DateTime<Utc>,
) -> Result<PreparedEnvelope, Error> {
    let soap = soap_namespace(doc)?;
    let header = ensure_header(doc, soap)?;
    let security = ensure_security(doc, header, soap)?;
    remove_stale(doc, security.element)?;

    let body = doc
        .find_child(doc.root(), soap, ns::node::BODY)
        .ok_or_else(|| Error::XmlStructure("SOAP envelope has no Body".into()))?;
    refs.push_and_mark(doc, body)?;

    let timestamp = prepare_timestamp(doc, &security, timestamp_validity, now)?;
    refs.push_and_mark(doc, timestamp)?;

    let token = keyinfo::binary_security_token(doc, &security.wsse, certificate_der)?;
    doc.append_child(security.element, token)?;
    let token_id = refs.mark(doc, token)?;

    Ok(PreparedEnvelope { security, token_id })
}

/// `soap:Header`, created as the Envelope's first child if absent.
pub fn ensure_header(doc: &mut XmlDocument, soap: &str) -> Result<NodeId, Error> {
    let root = doc.root();
    if let Some(header) = doc.find_child(root, soap, ns::node::HEADER) {
        return Ok(header);
    }
    let prefix = doc.require(root)?.name.prefix.as_deref().map(str::to_owned);
    let header = doc.create_element(prefix.as_deref(), ns::node::HEADER, soap);
    doc.prepend_child(root, header)?;
    Ok(header)
}

/// Locate or create `wsse:Security` under `header`.
pub fn ensure_security(doc: &mut XmlDocument, header: NodeId, soap: &str) -> Result<SecurityHeader, Error> {
    let element = match doc.find_child(header, ns::WSSE, ns::node::SECURITY) {
        Some(existing) => existing,
        None => {
            let security = doc.create_element(Some(ns::prefix::WSSE), ns::node::SECURITY, ns::WSSE);
            doc.declare_namespace(security, ns::prefix::DSIG, ns::DSIG)?;
            doc.declare_namespace(security, ns::prefix::WSSE, ns::WSSE)?;
            doc.declare_namespace(security, ns::prefix::WSU, ns::WSU)?;
            doc.append_child(header, security)?;
            log::debug!("created wsse:Security header");
            security
        }
    };

    if doc.attribute_ns(element, soap, ns::attr::MUST_UNDERSTAND).is_none() {
        let preferred = doc
            .require(doc.root())?
            .name
            .prefix
            .as_deref()
            .unwrap_or("soap")
            .to_owned();
        let soap_prefix = doc.ensure_namespace(element, &preferred, soap)?;
        doc.set_attribute(element, qname(Some(&soap_prefix), soap, ns::attr::MUST_UNDERSTAND), "1")?;
    }

    Ok(SecurityHeader {
        ds: doc.ensure_namespace(element, ns::prefix::DSIG, ns::DSIG)?,
        wsse: doc.ensure_namespace(element, ns::prefix::WSSE, ns::WSSE)?,
        wsu: doc.ensure_namespace(element, ns::prefix::WSU, ns::WSU)?,
        element,
    })
}

/// Drop signatures and X.509 tokens left by an earlier signing attempt.
pub fn remove_stale(doc: &mut XmlDocument, security: NodeId) -> Result<usize, Error> {
    let stale: Vec<NodeId> = doc
        .child_elements(security)
        .into_iter()
        .filter(|&child| is_stale(doc, child))
        .collect();
    for &element in &stale {
        doc.remove(element)?;
    }
    if !stale.is_empty() {
        log::debug!("removed {} stale signature element(s) from the Security header", stale.len());
    }
    Ok(stale.len())
}

fn is_stale(doc: &XmlDocument, element: NodeId) -> bool {
    doc.is(element, ns::DSIG, ns::node::SIGNATURE)
        || (doc.is(element, ns::WSSE, ns::node::BINARY_SECURITY_TOKEN)
            && matches!(
                doc.attribute(element, ns::attr::VALUE_TYPE),
                None | Some(algorithm::X509_V3_TOKEN)
            ))
}

/// The Security header's `wsu:Timestamp`.
///
/// An existing Timestamp has its `Created`/`Expires` truncated to whole
/// seconds. Otherwise a new one valid for `validity` from `now` is inserted
/// as the header's first child.
pub fn prepare_timestamp(
    doc: &mut XmlDocument,
    security: &SecurityHeader,
    validity: Duration,
    now: DateTime<Utc>,
) -> Result<NodeId, Error> {
    if let Some(existing) = doc.find_child(security.element, ns::WSU, ns::node::TIMESTAMP) {
        truncate_timestamp(doc, existing)?;
        return Ok(existing);
    }

    let validity = chrono::Duration::from_std(validity)
        .map_err(|e| Error::Other(format!("timestamp validity out of range: {e}")))?;
    let expires = now
        .checked_add_signed(validity)
        .ok_or_else(|| Error::Other("timestamp expiry out of range".into()))?;
    let wsu = Some(security.wsu.as_str());
    let timestamp = doc.create_element(wsu, ns::node::TIMESTAMP, ns::WSU);
    let created = doc.append_element(timestamp, wsu, ns::node::CREATED, ns::WSU)?;
    doc.set_text(created, &format_instant(now))?;
    let expiry = doc.append_element(timestamp, wsu, ns::node::EXPIRES, ns::WSU)?;
    doc.set_text(expiry, &format_instant(expires))?;
    doc.prepend_child(security.element, timestamp)?;
    Ok(timestamp)
}

/// Rewrite `Created` and `Expires` to whole-second UTC.
pub fn truncate_timestamp(doc: &mut XmlDocument, timestamp: NodeId) -> Result<(), Error> {
    for child in doc.child_elements(timestamp) {
        if doc.is(child, ns::WSU, ns::node::CREATED) || doc.is(child, ns::WSU, ns::node::EXPIRES) {
            let truncated = truncate_instant(&doc.text(child))?;
            doc.set_text(child, &truncated)?;
        }
    }
    Ok(())
}

/// Parse an xsd:dateTime and render it as `YYYY-MM-DDTHH:MM:SSZ`.
///
/// A value without a zone designator is taken as UTC.
pub fn truncate_instant(text: &str) -> Result<String, Error> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(format_instant(dt.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| format_instant(naive.and_utc()))
        .map_err(|e| Error::XmlStructure(format!("invalid timestamp {text:?}: {e}")))
}

pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
