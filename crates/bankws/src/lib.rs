#![forbid(unsafe_code)]

//! XML-DSig engine for bank web-service channels.
//!
//! The two calls other code needs are [`sign`] and [`validate`]; the member
//! crates are re-exported for everything else.

pub use bankws_c14n as c14n;
pub use bankws_core as core;
pub use bankws_crl as crl;
pub use bankws_crypto as crypto;
pub use bankws_dsig as dsig;
pub use bankws_keys as keys;
pub use bankws_xml as xml;

pub use bankws_core::{Error, Result};
pub use bankws_crl::RevocationConfig;
pub use bankws_dsig::{DsigContext, SignOptions, SigningProfile, VerifyResult};

use std::path::Path;

/// Sign `document` with the RSA key and certificate at the given paths.
pub fn sign(
    document: &[u8],
    key_path: &Path,
    cert_path: &Path,
    profile: SigningProfile,
    options: &SignOptions,
) -> Result<Vec<u8>> {
    bankws_dsig::sign(document, key_path, cert_path, profile, options)
}

/// Validate a signed document against the default CRL cache and endpoint.
///
/// Never fails: any problem with the document, signature, certificate or
/// revocation status yields `false`.
pub fn validate(document: &[u8]) -> bool {
    validate_with(RevocationConfig::default(), document)
}

/// [`validate`] with explicit revocation settings.
pub fn validate_with(config: RevocationConfig, document: &[u8]) -> bool {
    let ctx = DsigContext::with_revocation_config(config);
    bankws_dsig::validate(&ctx, document)
}
