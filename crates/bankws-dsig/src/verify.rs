#![forbid(unsafe_code)]

//! XML-DSig signature verification.
//!
//! Processing order:
//! 1. Parse the document and locate the first `<ds:Signature>`
//! 2. Decode SignedInfo, SignatureValue and KeyInfo into a [`SignatureRecord`]
//! 3. Resolve the signer's certificate from KeyInfo
//! 4. For each `<Reference>`: canonicalize what it covers, digest, compare
//! 5. Check the certificate against the CRL
//! 6. Canonicalize `<SignedInfo>` and verify `<SignatureValue>`

use crate::context::DsigContext;
use crate::record::{ReferenceRecord, SignatureRecord};
use bankws_c14n::C14nMode;
use bankws_core::{algorithm, ns, Error};
use bankws_crypto::{digest, SigningKey};
use bankws_xml::{id, XmlDocument};

/// Result of signature verification.
#[derive(Debug)]
pub enum VerifyResult {
    /// Signature is valid.
    Valid,
    /// Signature is well-formed but does not hold. `cause` is one of
    /// [`Error::MissingElement`] (no Signature at all),
    /// [`Error::DigestMismatch`], [`Error::Revoked`] or
    /// [`Error::SignatureInvalid`].
    Invalid { cause: Error },
}

impl VerifyResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyResult::Valid)
    }

    fn invalid(cause: Error) -> Self {
        VerifyResult::Invalid { cause }
    }
}

/// Verify a signed XML document.
///
/// `Ok(Invalid)` reports a well-formed signature that does not hold; `Err`
/// reports a document that could not be checked at all. The input is never
/// modified.
pub fn verify(ctx: &DsigContext, xml: &[u8]) -> Result<VerifyResult, Error> {
    let doc = XmlDocument::parse_bytes(xml)?;

    let Some(signature) = doc.find_element(ns::DSIG, ns::node::SIGNATURE) else {
        return Ok(VerifyResult::invalid(Error::MissingElement(
            ns::node::SIGNATURE.into(),
        )));
    };
    let record = SignatureRecord::decode(&doc, signature)?;

    let certificate = record
        .certificate
        .as_ref()
        .ok_or_else(|| Error::MissingElement("certificate in KeyInfo".into()))?
        .resolve(&doc, &ctx.id_attrs)?;
    let info = bankws_keys::x509::certificate_info(&certificate).ok();
    if let Some(info) = &info {
        log::debug!("signed by {} (serial {})", info.subject, info.serial);
    }

    for reference in &record.references {
        let computed = reference_digest(ctx, &doc, &record, reference)?;
        if computed != reference.digest_value {
            return Ok(VerifyResult::invalid(Error::DigestMismatch(format!(
                "URI {:?}",
                reference.uri
            ))));
        }
    }

    if ctx.revocation.is_revoked(&certificate)? {
        let serial = info.map_or_else(|| "unknown".to_owned(), |info| info.serial);
        return Ok(VerifyResult::invalid(Error::Revoked(serial)));
    }

    let canonical = bankws_c14n::canonicalize_element(
        &doc,
        record.signed_info,
        record.c14n_mode,
        &record.inclusive_prefixes,
    )?;
    if ctx.debug {
        log::debug!("pre-signature SignedInfo:\n{}", String::from_utf8_lossy(&canonical));
    }

    let public_key = bankws_keys::x509::public_key(&certificate)?;
    let alg = bankws_crypto::sign::from_uri(&record.signature_method)?;
    if alg.verify(&SigningKey::RsaPublic(public_key), &canonical, &record.signature_value)? {
        Ok(VerifyResult::Valid)
    } else {
        Ok(VerifyResult::invalid(Error::SignatureInvalid(
            "SignatureValue does not match SignedInfo".into(),
        )))
    }
}

/// Verify a signed XML document, collapsing every failure to `false`.
pub fn validate(ctx: &DsigContext, xml: &[u8]) -> bool {
    match verify(ctx, xml) {
        Ok(VerifyResult::Valid) => {
            log::info!("signature is valid");
            true
        }
        Ok(VerifyResult::Invalid { cause }) => {
            log::warn!("signature rejected: {cause}");
            false
        }
        Err(e) => {
            log::warn!("signature could not be verified: {e}");
            false
        }
    }
}

/// Digest of what `reference` covers, canonicalized with the
/// CanonicalizationMethod's mode.
fn reference_digest(
    ctx: &DsigContext,
    doc: &XmlDocument,
    record: &SignatureRecord,
    reference: &ReferenceRecord,
) -> Result<Vec<u8>, Error> {
    check_transforms(reference)?;

    let data = if reference.uri.is_empty() {
        // Enveloped: the whole document minus the Signature, on a copy.
        let mut copy = doc.clone();
        copy.remove(record.signature)?;
        bankws_c14n::canonicalize_document(&copy, record.c14n_mode)?
    } else {
        let id = id::parse_same_document_ref(&reference.uri).ok_or_else(|| {
            Error::InvalidUri(format!("unsupported reference URI: {}", reference.uri))
        })?;
        let element = id::resolve_id(doc, &ctx.id_attrs, id)?;
        bankws_c14n::canonicalize_element(
            doc,
            element,
            record.c14n_mode,
            reference.inclusive_prefixes(),
        )?
    };
    if ctx.debug {
        log::debug!(
            "pre-digest data for URI {:?}:\n{}",
            reference.uri,
            String::from_utf8_lossy(&data)
        );
    }
    digest::digest(&reference.digest_method, &data)
}

fn check_transforms(reference: &ReferenceRecord) -> Result<(), Error> {
    for transform in &reference.transforms {
        let known = transform.algorithm == algorithm::ENVELOPED_SIGNATURE
            || C14nMode::from_uri(&transform.algorithm).is_some();
        if !known {
            return Err(Error::UnsupportedAlgorithm(format!(
                "transform: {}",
                transform.algorithm
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sign::{sign_document, SignOptions, SigningProfile};
    use bankws_crl::RevocationCheck;
    use bankws_keys::{loader, Credentials};
    use bankws_xml::writer;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    const KEY: &[u8] = include_bytes!("../../../test-data/keys/signer-pkcs1.pem");
    const CERT: &[u8] = include_bytes!("../../../test-data/certs/signer.der");

    /// Answers with a fixed verdict and records that it was asked.
    struct FixedRevocation {
        revoked: bool,
        asked: Arc<AtomicBool>,
    }

    impl RevocationCheck for FixedRevocation {
        fn is_revoked(&self, _: &[u8]) -> Result<bool, Error> {
            self.asked.store(true, Ordering::SeqCst);
            Ok(self.revoked)
        }
    }

    fn ctx(revoked: bool) -> (DsigContext, Arc<AtomicBool>) {
        let asked = Arc::new(AtomicBool::new(false));
        let check = FixedRevocation {
            revoked,
            asked: Arc::clone(&asked),
        };
        (DsigContext::new(Box::new(check)), asked)
    }

    fn signed(xml: &str, profile: SigningProfile) -> Vec<u8> {
        let creds =
            Credentials::new(loader::load_private_key(KEY).unwrap(), CERT.to_vec()).unwrap();
        let mut doc = XmlDocument::parse(xml).unwrap();
        sign_document(&mut doc, &creds, profile, &SignOptions::default()).unwrap();
        writer::serialize(&doc, false)
    }

    const REQUEST: &str = r#"<CertApplicationRequest xmlns="http://op.fi/mlp/xmldata/"><CustomerId>1000012345</CustomerId><!-- note --><Timestamp>2026-03-01T08:30:15Z</Timestamp></CertApplicationRequest>"#;
    const ENVELOPE: &str = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"><soapenv:Header/><soapenv:Body><cor:getCertificatein xmlns:cor="http://mlp.op.fi/OPCertificateService"><cor:RequestHeader><cor:SenderId>1000012345</cor:SenderId></cor:RequestHeader></cor:getCertificatein></soapenv:Body></soapenv:Envelope>"#;

    #[test]
    fn test_application_round_trip() {
        let (ctx, asked) = ctx(false);
        let out = signed(REQUEST, SigningProfile::Application);
        assert!(verify(&ctx, &out).unwrap().is_valid());
        assert!(asked.load(Ordering::SeqCst));
    }

    #[test]
    fn test_ws_security_round_trip() {
        let (ctx, _) = ctx(false);
        let out = signed(ENVELOPE, SigningProfile::WsSecurity);
        assert!(validate(&ctx, &out));
    }

    #[test]
    fn test_unsigned_document_rejected() {
        let (ctx, _) = ctx(false);
        assert!(matches!(
            verify(&ctx, REQUEST.as_bytes()).unwrap(),
            VerifyResult::Invalid { cause: Error::MissingElement(_) }
        ));
        assert!(!validate(&ctx, b"<not-xml"));
    }

    #[test]
    fn test_tampered_content_fails_before_revocation() {
        let (ctx, asked) = ctx(false);
        let out = String::from_utf8(signed(REQUEST, SigningProfile::Application)).unwrap();
        let tampered = out.replace("1000012345</CustomerId>", "1000012346</CustomerId>");
        let result = verify(&ctx, tampered.as_bytes()).unwrap();
        assert!(matches!(
            result,
            VerifyResult::Invalid { cause: Error::DigestMismatch(ref uri) } if uri == "URI \"\""
        ));
        assert!(!asked.load(Ordering::SeqCst));
    }

    #[test]
    fn test_revoked_certificate_rejected() {
        let (ctx, _) = ctx(true);
        let out = signed(ENVELOPE, SigningProfile::WsSecurity);
        let serial = bankws_keys::x509::certificate_info(CERT).unwrap().serial;
        match verify(&ctx, &out).unwrap() {
            VerifyResult::Invalid { cause: Error::Revoked(s) } => assert_eq!(s, serial),
            other => panic!("expected a revoked verdict, got {other:?}"),
        }
    }

    #[test]
    fn test_forged_signature_value_rejected() {
        let (ctx, asked) = ctx(false);
        let out = String::from_utf8(signed(REQUEST, SigningProfile::Application)).unwrap();
        let start = out.find("<SignatureValue>").unwrap() + "<SignatureValue>".len();
        let original = &out[start..start + 4];
        let forged = if original == "AAAA" { "BBBB" } else { "AAAA" };
        let tampered = format!("{}{forged}{}", &out[..start], &out[start + 4..]);
        assert!(matches!(
            verify(&ctx, tampered.as_bytes()).unwrap(),
            VerifyResult::Invalid { cause: Error::SignatureInvalid(_) }
        ));
        assert!(asked.load(Ordering::SeqCst));
        assert!(!validate(&ctx, tampered.as_bytes()));
    }

    #[test]
    fn test_unknown_transform_is_error() {
        let (ctx, _) = ctx(false);
        let out = String::from_utf8(signed(REQUEST, SigningProfile::Application)).unwrap();
        let odd = out.replace(algorithm::ENVELOPED_SIGNATURE, "urn:custom-transform");
        assert!(matches!(verify(&ctx, odd.as_bytes()), Err(Error::UnsupportedAlgorithm(_))));
    }

    #[test]
    fn test_input_is_not_modified() {
        let (ctx, _) = ctx(false);
        let out = signed(REQUEST, SigningProfile::Application);
        let before = out.clone();
        assert!(validate(&ctx, &out));
        assert_eq!(out, before);
    }
}
