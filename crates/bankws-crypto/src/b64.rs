#![forbid(unsafe_code)]

//! Base64 as it appears in XML-DSig element content.

use bankws_core::Error;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode base64 element text. Line breaks and indentation inserted by
/// pretty-printers are ignored.
pub fn decode(text: &str) -> Result<Vec<u8>, Error> {
    let clean: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(clean)
        .map_err(|e| Error::Base64(e.to_string()))
}
