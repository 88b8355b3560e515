#![forbid(unsafe_code)]

//! X.509 certificate inspection.
//!
//! Only the attributes the bank channel needs are exposed: serial number
//! (revocation lookup), subject (logging), notAfter (renewal window) and the
//! RSA public key (signature verification).

use bankws_core::Error;
use chrono::{DateTime, Utc};
use der::{Decode, Encode};
use x509_cert::Certificate;

/// Certificates within this many days of expiry should be renewed.
pub const RENEWAL_WINDOW_DAYS: i64 = 60;

/// The certificate attributes the signature engine uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// Serial number as uppercase hex, without a DER sign byte.
    pub serial: String,
    /// Subject distinguished name (RFC 4514).
    pub subject: String,
    pub not_after: DateTime<Utc>,
}

pub fn parse_certificate(der: &[u8]) -> Result<Certificate, Error> {
    Certificate::from_der(der)
        .map_err(|e| Error::Certificate(format!("failed to parse X.509 certificate: {e}")))
}

pub fn certificate_info(der: &[u8]) -> Result<CertificateInfo, Error> {
    let cert = parse_certificate(der)?;
    let tbs = &cert.tbs_certificate;
    let secs = tbs.validity.not_after.to_unix_duration().as_secs();
    let not_after = i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .ok_or_else(|| Error::Certificate("notAfter out of range".into()))?;
    Ok(CertificateInfo {
        serial: serial_hex(tbs.serial_number.as_bytes()),
        subject: tbs.subject.to_string(),
        not_after,
    })
}

/// Raw serial number bytes as encoded in the certificate.
pub fn serial_number(der: &[u8]) -> Result<Vec<u8>, Error> {
    Ok(parse_certificate(der)?
        .tbs_certificate
        .serial_number
        .as_bytes()
        .to_vec())
}

/// Format serial bytes as hex, dropping leading zero bytes.
pub fn serial_hex(bytes: &[u8]) -> String {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len().saturating_sub(1));
    bytes[start..].iter().map(|b| format!("{b:02X}")).collect()
}

/// The RSA public key carried by a certificate.
pub fn public_key(der: &[u8]) -> Result<rsa::RsaPublicKey, Error> {
    use spki::DecodePublicKey;
    let cert = parse_certificate(der)?;
    let spki_der = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| Error::Certificate(format!("failed to encode SPKI: {e}")))?;
    rsa::RsaPublicKey::from_public_key_der(&spki_der)
        .map_err(|e| Error::Certificate(format!("certificate does not carry an RSA key: {e}")))
}

/// Whether the certificate is inside its renewal window at `now`.
///
/// An expired certificate cannot be renewed with itself and is an error.
pub fn check_renewable(der: &[u8], now: DateTime<Utc>) -> Result<bool, Error> {
    let info = certificate_info(der)?;
    if info.not_after <= now {
        return Err(Error::Certificate(format!(
            "certificate {} expired at {}",
            info.serial, info.not_after
        )));
    }
    let remaining = info.not_after - now;
    log::debug!(
        "certificate {} expires in {} days",
        info.serial,
        remaining.num_days()
    );
    Ok(remaining.num_days() < RENEWAL_WINDOW_DAYS)
}
