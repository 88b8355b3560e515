#![forbid(unsafe_code)]

//! Signing credentials: a private key and the certificate that vouches for it.

use crate::{loader, x509};
use bankws_core::Error;
use bankws_crypto::SigningKey;
use std::path::Path;

/// A private key paired with its DER certificate, held only in memory.
pub struct Credentials {
    pub private_key: rsa::RsaPrivateKey,
    pub certificate_der: Vec<u8>,
}

impl Credentials {
    /// Load both files. The certificate must carry the key's public half.
    pub fn load(key_path: &Path, cert_path: &Path) -> Result<Self, Error> {
        let private_key = loader::load_private_key_file(key_path)?;
        let certificate_der = loader::load_certificate_file(cert_path)?;
        Self::new(private_key, certificate_der)
    }

    pub fn new(private_key: rsa::RsaPrivateKey, certificate_der: Vec<u8>) -> Result<Self, Error> {
        let cert_key = x509::public_key(&certificate_der)?;
        if cert_key != private_key.to_public_key() {
            return Err(Error::Certificate(
                "certificate public key does not match the private key".into(),
            ));
        }
        Ok(Self {
            private_key,
            certificate_der,
        })
    }

    pub fn signing_key(&self) -> SigningKey {
        SigningKey::Rsa(self.private_key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data");

    #[test]
    fn test_load_matching_pair() {
        let creds = Credentials::load(
            &Path::new(DATA).join("keys/signer-pkcs8.pem"),
            &Path::new(DATA).join("certs/signer.der"),
        )
        .unwrap();
        assert!(!creds.certificate_der.is_empty());
        assert!(matches!(creds.signing_key(), SigningKey::Rsa(_)));
    }

    #[test]
    fn test_mismatched_pair_rejected() {
        let result = Credentials::load(
            &Path::new(DATA).join("keys/signer-pkcs1.pem"),
            &Path::new(DATA).join("certs/other.der"),
        );
        assert!(matches!(result, Err(Error::Certificate(_))));
    }
}
