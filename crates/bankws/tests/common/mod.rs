use bankws::crl::{FileCrlFetcher, MemoryCacheStore, RevocationChecker};
use bankws::{DsigContext, RevocationConfig, SignOptions, SigningProfile};
use std::path::PathBuf;

pub const REQUEST: &str = r#"<CertApplicationRequest xmlns="http://op.fi/mlp/xmldata/" Version="1.0"><CustomerId>1000012345</CustomerId><!-- issued by test --><Timestamp>2026-03-01T08:30:15+02:00</Timestamp><Environment>TEST</Environment><SoftwareId>bankws</SoftwareId></CertApplicationRequest>"#;

pub const ENVELOPE: &str = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"><soapenv:Header/><soapenv:Body><cor:getCertificatein xmlns:cor="http://mlp.op.fi/OPCertificateService"><cor:RequestHeader><cor:SenderId>1000012345</cor:SenderId><cor:RequestId>42</cor:RequestId></cor:RequestHeader><cor:ApplicationRequest>PENlcnRBcHBsaWNhdGlvblJlcXVlc3QvPg==</cor:ApplicationRequest></cor:getCertificatein></soapenv:Body></soapenv:Envelope>"#;

pub fn data(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../test-data")
        .join(path)
}

#[allow(dead_code)]
pub fn read(path: &str) -> Vec<u8> {
    std::fs::read(data(path)).unwrap()
}

pub fn sign(document: &str, profile: SigningProfile) -> Vec<u8> {
    sign_with(document, profile, &SignOptions::default())
}

pub fn sign_with(document: &str, profile: SigningProfile, options: &SignOptions) -> Vec<u8> {
    bankws::sign(
        document.as_bytes(),
        &data("keys/signer-pkcs1.pem"),
        &data("certs/signer.der"),
        profile,
        options,
    )
    .unwrap()
}

/// A context whose CRL is read from `test-data/crl/<crl>` into memory.
pub fn context(crl: &str) -> DsigContext {
    context_with(crl, RevocationConfig::default())
}

pub fn context_with(crl: &str, config: RevocationConfig) -> DsigContext {
    let checker = RevocationChecker::new(
        MemoryCacheStore::new(),
        FileCrlFetcher::new(data(&format!("crl/{crl}"))),
        config,
    );
    DsigContext::new(Box::new(checker))
}

#[allow(dead_code)]
pub fn text(bytes: &[u8]) -> String {
    String::from_utf8(bytes.to_vec()).unwrap()
}
