#![forbid(unsafe_code)]

//! RSA-SHA1 (PKCS#1 v1.5) signatures.

use bankws_core::{algorithm, Error};
use signature::SignatureEncoding;

/// Key material for signature operations.
pub enum SigningKey {
    Rsa(rsa::RsaPrivateKey),
    RsaPublic(rsa::RsaPublicKey),
}

impl SigningKey {
    fn public_key(&self) -> rsa::RsaPublicKey {
        match self {
            SigningKey::Rsa(pk) => pk.to_public_key(),
            SigningKey::RsaPublic(pk) => pk.clone(),
        }
    }
}

/// Trait for signature algorithms.
pub trait SignatureAlgorithm: Send {
    fn uri(&self) -> &'static str;
    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error>;
    fn verify(&self, key: &SigningKey, data: &[u8], signature: &[u8]) -> Result<bool, Error>;
}

/// Create a signature algorithm from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn SignatureAlgorithm>, Error> {
    match uri {
        algorithm::RSA_SHA1 => Ok(Box::new(RsaSha1)),
        _ => Err(Error::UnsupportedAlgorithm(format!(
            "signature algorithm: {uri}"
        ))),
    }
}

struct RsaSha1;

impl SignatureAlgorithm for RsaSha1 {
    fn uri(&self) -> &'static str {
        algorithm::RSA_SHA1
    }

    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        use signature::Signer;
        let SigningKey::Rsa(private_key) = key else {
            return Err(Error::KeyFormat("RSA private key required".into()));
        };
        let sk = rsa::pkcs1v15::SigningKey::<sha1::Sha1>::new(private_key.clone());
        let sig = sk
            .try_sign(data)
            .map_err(|e| Error::Crypto(format!("RSA-SHA1 signing failed: {e}")))?;
        Ok(sig.to_vec())
    }

    fn verify(&self, key: &SigningKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        use signature::Verifier;
        let sig = rsa::pkcs1v15::Signature::try_from(sig_bytes)
            .map_err(|e| Error::Crypto(format!("invalid RSA signature: {e}")))?;
        let vk = rsa::pkcs1v15::VerifyingKey::<sha1::Sha1>::new(key.public_key());
        Ok(vk.verify(data, &sig).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkcs1::DecodeRsaPrivateKey;

    const KEY_PEM: &str = include_str!("../../../test-data/keys/signer-pkcs1.pem");
    const OTHER_PEM: &str = include_str!("../../../test-data/keys/other.pem");

    fn key(pem: &str) -> rsa::RsaPrivateKey {
        rsa::RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| {
                use rsa::pkcs8::DecodePrivateKey;
                rsa::RsaPrivateKey::from_pkcs8_pem(pem)
            })
            .unwrap()
    }

    #[test]
    fn test_sign_then_verify_with_public_key() {
        let alg = from_uri(algorithm::RSA_SHA1).unwrap();
        let private = key(KEY_PEM);
        let public = SigningKey::RsaPublic(private.to_public_key());
        let sig = alg.sign(&SigningKey::Rsa(private), b"<SignedInfo/>").unwrap();
        assert_eq!(sig.len(), 256);
        assert!(alg.verify(&public, b"<SignedInfo/>", &sig).unwrap());
        assert!(!alg.verify(&public, b"<SignedInfo />", &sig).unwrap());
    }

    #[test]
    fn test_wrong_key_does_not_verify() {
        let alg = from_uri(algorithm::RSA_SHA1).unwrap();
        let sig = alg.sign(&SigningKey::Rsa(key(KEY_PEM)), b"data").unwrap();
        let other = SigningKey::RsaPublic(key(OTHER_PEM).to_public_key());
        assert!(!alg.verify(&other, b"data", &sig).unwrap());
    }

    #[test]
    fn test_public_key_cannot_sign() {
        let alg = from_uri(algorithm::RSA_SHA1).unwrap();
        let public = SigningKey::RsaPublic(key(KEY_PEM).to_public_key());
        assert!(matches!(alg.sign(&public, b"x"), Err(Error::KeyFormat(_))));
    }

    #[test]
    fn test_unsupported_signature_method() {
        assert!(from_uri("http://www.w3.org/2001/04/xmldsig-more#rsa-sha256").is_err());
    }
}
