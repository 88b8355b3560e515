#![forbid(unsafe_code)]

//! XML document model for the bankws signature engine.
//!
//! Parses with `uppsala` into an arena tree that can be edited before
//! signing, canonicalized, searched by identifier attribute and written back
//! out as bytes.

pub mod document;
pub mod id;
pub mod writer;

pub use document::{qname, XmlDocument};
pub use id::IdAttr;
pub use uppsala::{NodeId, NodeKind, QName};

/// Return an uppsala parser configured for untrusted input.
///
/// DTDs are rejected: bank messages never carry one, and refusing them
/// keeps entity declarations out of signed content entirely.
pub fn parser() -> uppsala::Parser {
    uppsala::Parser::new().with_forbid_dtd(true)
}
