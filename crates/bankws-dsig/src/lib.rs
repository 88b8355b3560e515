#![forbid(unsafe_code)]

//! Enveloped XML-DSig signing and validation for bank web services.
//!
//! [`sign`] produces RSA-SHA1 signatures in either the application profile
//! (whole document, embedded certificate) or the WS-Security profile (SOAP
//! Body and Timestamp, BinarySecurityToken). [`validate`] checks either kind
//! and answers with a single boolean.

pub mod context;
pub mod record;
pub mod references;
pub mod sign;
pub mod verify;
pub mod wsse;

pub use context::DsigContext;
pub use references::ReferenceSet;
pub use sign::{sign, sign_document, SignOptions, SigningProfile};
pub use verify::{validate, verify, VerifyResult};
