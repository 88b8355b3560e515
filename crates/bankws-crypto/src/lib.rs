#![forbid(unsafe_code)]

//! Cryptographic primitives for the bankws signature engine: the SHA-1
//! DigestEngine, RSA-SHA1 signatures and the base64 text form both use in XML.

pub mod b64;
pub mod digest;
pub mod sign;

pub use digest::DigestAlgorithm;
pub use sign::{SignatureAlgorithm, SigningKey};
