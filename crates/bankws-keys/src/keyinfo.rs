#![forbid(unsafe_code)]

//! KeyInfo XML processing: where the signer's certificate lives.
//!
//! Application messages embed the certificate directly in
//! `<ds:X509Data><ds:X509Certificate>`. WS-Security envelopes carry it in a
//! `<wsse:BinarySecurityToken>` in the Security header and point at it from
//! `<wsse:SecurityTokenReference>`.

use bankws_core::{algorithm, ns, Error};
use bankws_crypto::b64;
use bankws_xml::{id, qname, IdAttr, NodeId, XmlDocument};

/// How a `<ds:KeyInfo>` identifies the signing certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateSource {
    /// Base64 text of an embedded `X509Certificate`.
    Embedded(String),
    /// `URI` of a `wsse:Reference` to a BinarySecurityToken.
    TokenReference(String),
}

impl CertificateSource {
    /// Read a KeyInfo element. A token reference wins over embedded data.
    pub fn from_key_info(doc: &XmlDocument, key_info: NodeId) -> Option<Self> {
        let token_uri = doc
            .find_child(key_info, ns::WSSE, ns::node::SECURITY_TOKEN_REFERENCE)
            .and_then(|str_el| doc.find_child(str_el, ns::WSSE, ns::node::WSSE_REFERENCE))
            .and_then(|reference| doc.attribute(reference, ns::attr::URI));
        if let Some(uri) = token_uri {
            return Some(Self::TokenReference(uri.to_owned()));
        }

        doc.find_children(key_info, ns::DSIG, ns::node::X509_DATA)
            .into_iter()
            .find_map(|data| doc.find_child(data, ns::DSIG, ns::node::X509_CERTIFICATE))
            .map(|cert| Self::Embedded(doc.text(cert)))
    }

    /// Produce the DER certificate bytes.
    pub fn resolve(&self, doc: &XmlDocument, id_attrs: &[IdAttr]) -> Result<Vec<u8>, Error> {
        match self {
            Self::Embedded(text) => b64::decode(text),
            Self::TokenReference(uri) => {
                let token_id = id::parse_same_document_ref(uri).ok_or_else(|| {
                    Error::InvalidUri(format!("token reference is not same-document: {uri}"))
                })?;
                let token = id::resolve_id(doc, id_attrs, token_id)?;
                if !doc.is(token, ns::WSSE, ns::node::BINARY_SECURITY_TOKEN) {
                    return Err(Error::Certificate(format!(
                        "{uri} does not point at a BinarySecurityToken"
                    )));
                }
                match doc.attribute(token, ns::attr::VALUE_TYPE) {
                    None | Some(algorithm::X509_V3_TOKEN) => b64::decode(&doc.text(token)),
                    Some(other) => Err(Error::Certificate(format!(
                        "unsupported token ValueType: {other}"
                    ))),
                }
            }
        }
    }
}

/// Detached `<KeyInfo><X509Data><X509Certificate>` carrying `cert_der`.
pub fn x509_key_info(doc: &mut XmlDocument, ds_prefix: Option<&str>, cert_der: &[u8]) -> Result<NodeId, Error> {
    let key_info = doc.create_element(ds_prefix, ns::node::KEY_INFO, ns::DSIG);
    let data = doc.append_element(key_info, ds_prefix, ns::node::X509_DATA, ns::DSIG)?;
    let cert = doc.append_element(data, ds_prefix, ns::node::X509_CERTIFICATE, ns::DSIG)?;
    doc.set_text(cert, &b64::encode(cert_der))?;
    Ok(key_info)
}

/// Detached `<KeyInfo><wsse:SecurityTokenReference><wsse:Reference URI="#token_id">`.
pub fn token_reference_key_info(
    doc: &mut XmlDocument,
    ds_prefix: Option<&str>,
    wsse_prefix: &str,
    token_id: &str,
) -> Result<NodeId, Error> {
    let key_info = doc.create_element(ds_prefix, ns::node::KEY_INFO, ns::DSIG);
    let str_el = doc.append_element(key_info, Some(wsse_prefix), ns::node::SECURITY_TOKEN_REFERENCE, ns::WSSE)?;
    let reference = doc.append_element(str_el, Some(wsse_prefix), ns::node::WSSE_REFERENCE, ns::WSSE)?;
    doc.set_attribute(reference, qname(None, "", ns::attr::URI), &format!("#{token_id}"))?;
    doc.set_attribute(reference, qname(None, "", ns::attr::VALUE_TYPE), algorithm::X509_V3_TOKEN)?;
    Ok(key_info)
}

/// A detached `<wsse:BinarySecurityToken>` carrying `cert_der` as base64.
pub fn binary_security_token(doc: &mut XmlDocument, wsse_prefix: &str, cert_der: &[u8]) -> Result<NodeId, Error> {
    let token = doc.create_element(Some(wsse_prefix), ns::node::BINARY_SECURITY_TOKEN, ns::WSSE);
    doc.set_attribute(token, qname(None, "", ns::attr::ENCODING_TYPE), algorithm::BASE64_BINARY)?;
    doc.set_attribute(token, qname(None, "", ns::attr::VALUE_TYPE), algorithm::X509_V3_TOKEN)?;
    doc.set_text(token, &b64::encode(cert_der))?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CERT: &[u8] = include_bytes!("../../../test-data/certs/signer.der");

    fn security() -> XmlDocument {
        XmlDocument::parse(&format!(
            r#"<wsse:Security xmlns:wsse="{}" xmlns:wsu="{}" xmlns:ds="{}"/>"#,
            ns::WSSE,
            ns::WSU,
            ns::DSIG
        ))
        .unwrap()
    }

    /// Attach `token` as `wsu:Id="id"` followed by a KeyInfo referencing it.
    fn with_reference(doc: &mut XmlDocument, token: NodeId, id: &str) -> NodeId {
        let root = doc.root();
        doc.set_attribute(token, qname(Some("wsu"), ns::WSU, "Id"), id).unwrap();
        doc.append_child(root, token).unwrap();
        let key_info = token_reference_key_info(doc, Some("ds"), "wsse", id).unwrap();
        doc.append_child(root, key_info).unwrap();
        key_info
    }

    #[test]
    fn test_embedded_certificate_round_trip() {
        let mut doc = security();
        let key_info = x509_key_info(&mut doc, Some("ds"), CERT).unwrap();
        let root = doc.root();
        doc.append_child(root, key_info).unwrap();
        let source = CertificateSource::from_key_info(&doc, key_info).unwrap();
        assert!(matches!(source, CertificateSource::Embedded(_)));
        assert_eq!(source.resolve(&doc, &IdAttr::defaults()).unwrap(), CERT);
    }

    #[test]
    fn test_token_reference_resolves_to_bst() {
        let mut doc = security();
        let bst = binary_security_token(&mut doc, "wsse", CERT).unwrap();
        let key_info = with_reference(&mut doc, bst, "id-token");
        let source = CertificateSource::from_key_info(&doc, key_info).unwrap();
        assert_eq!(source, CertificateSource::TokenReference("#id-token".into()));
        assert_eq!(source.resolve(&doc, &IdAttr::defaults()).unwrap(), CERT);
    }

    #[test]
    fn test_reference_to_non_token_fails() {
        let mut doc = security();
        let not_a_token = doc.create_element(Some("wsu"), "Timestamp", ns::WSU);
        let key_info = with_reference(&mut doc, not_a_token, "id-ts");
        let source = CertificateSource::from_key_info(&doc, key_info).unwrap();
        assert!(source.resolve(&doc, &IdAttr::defaults()).is_err());
    }

    #[test]
    fn test_empty_key_info() {
        let mut doc = security();
        let root = doc.root();
        let empty = doc.append_element(root, Some("ds"), "KeyInfo", ns::DSIG).unwrap();
        assert_eq!(CertificateSource::from_key_info(&doc, empty), None);
    }
}
