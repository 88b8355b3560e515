#![forbid(unsafe_code)]

//! DigestEngine: SHA-1 over canonicalized bytes.

use bankws_core::{algorithm, Error};
use digest::Digest;

/// Trait for digest algorithms.
pub trait DigestAlgorithm: Send {
    /// Feed data into the hash.
    fn update(&mut self, data: &[u8]);
    /// Finalize and return the hash value.
    fn finalize(self: Box<Self>) -> Vec<u8>;
    /// Algorithm URI.
    fn uri(&self) -> &'static str;
}

/// Create a digest algorithm from its URI. Only SHA-1 is part of the bank profile.
pub fn from_uri(uri: &str) -> Result<Box<dyn DigestAlgorithm>, Error> {
    match uri {
        algorithm::SHA1 => Ok(Box::new(Sha1Digest(sha1::Sha1::new()))),
        _ => Err(Error::UnsupportedAlgorithm(format!(
            "digest algorithm: {uri}"
        ))),
    }
}

/// Compute a digest in one shot.
pub fn digest(uri: &str, data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut hasher = from_uri(uri)?;
    hasher.update(data);
    Ok(hasher.finalize())
}

/// The 20-byte SHA-1 value of `data`.
pub fn sha1(data: &[u8]) -> [u8; 20] {
    sha1::Sha1::digest(data).into()
}

/// SHA-1 of `data` as the base64 text stored in `DigestValue`.
pub fn sha1_base64(data: &[u8]) -> String {
    crate::b64::encode(&sha1(data))
}

struct Sha1Digest(sha1::Sha1);

impl DigestAlgorithm for Sha1Digest {
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0.finalize().to_vec()
    }

    fn uri(&self) -> &'static str {
        algorithm::SHA1
    }
}
