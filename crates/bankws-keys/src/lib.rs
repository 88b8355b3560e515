#![forbid(unsafe_code)]

//! Key and certificate handling for the bankws signature engine.
//!
//! Loads the caller's RSA private key (PEM or DER, PKCS#1 or PKCS#8) and
//! X.509 certificate from disk, inspects certificates (serial, subject,
//! notAfter, renewal window), and reads or writes certificate references in
//! `<ds:KeyInfo>`.

pub mod key;
pub mod keyinfo;
pub mod loader;
pub mod x509;

pub use key::Credentials;
pub use keyinfo::CertificateSource;
pub use x509::CertificateInfo;
