#![forbid(unsafe_code)]

use std::path::PathBuf;

/// Errors produced by the bankws XML-DSig engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("invalid XML structure: {0}")]
    XmlStructure(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("unsupported or unreadable key: {0}")]
    KeyFormat(String),

    #[error("credential file {path} is not readable: {source}")]
    MissingCredential {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("digest mismatch for reference: {0}")]
    DigestMismatch(String),

    #[error("canonicalization error: {0}")]
    Canonicalization(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("missing required attribute: {0}")]
    MissingAttribute(String),

    #[error("invalid URI reference: {0}")]
    InvalidUri(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("certificate has been revoked: serial {0}")]
    Revoked(String),

    #[error("CRL error: {0}")]
    Crl(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap an I/O failure on a key or certificate file.
    pub fn missing_credential(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::MissingCredential {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
