#![forbid(unsafe_code)]

//! XML Canonicalization (C14N) for the bankws signature engine.
//!
//! Implements the four W3C variants the bank profiles use:
//! - Canonical XML 1.0 (with and without comments)
//! - Exclusive Canonical XML 1.0 (with and without comments)
//!
//! Either a whole document or a single element subtree can be
//! canonicalized. A subtree inherits the namespace declarations (and, for
//! inclusive C14N, the `xml:*` attributes) of its ancestors.

pub mod escape;
pub mod exclusive;
pub mod inclusive;
pub mod render;

use bankws_core::{algorithm, Error};
use bankws_xml::{NodeId, XmlDocument};

/// The canonicalization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum C14nMode {
    /// Canonical XML 1.0
    Inclusive,
    /// Canonical XML 1.0 with comments
    InclusiveWithComments,
    /// Exclusive Canonical XML 1.0
    Exclusive,
    /// Exclusive Canonical XML 1.0 with comments
    ExclusiveWithComments,
}

impl C14nMode {
    /// Build a mode from its two independent flags.
    pub fn new(exclusive: bool, with_comments: bool) -> Self {
        match (exclusive, with_comments) {
            (false, false) => Self::Inclusive,
            (false, true) => Self::InclusiveWithComments,
            (true, false) => Self::Exclusive,
            (true, true) => Self::ExclusiveWithComments,
        }
    }

    /// Get the algorithm URI for this mode.
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Inclusive => algorithm::C14N,
            Self::InclusiveWithComments => algorithm::C14N_WITH_COMMENTS,
            Self::Exclusive => algorithm::EXC_C14N,
            Self::ExclusiveWithComments => algorithm::EXC_C14N_WITH_COMMENTS,
        }
    }

    /// Parse a C14N mode from an algorithm URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            algorithm::C14N => Some(Self::Inclusive),
            algorithm::C14N_WITH_COMMENTS => Some(Self::InclusiveWithComments),
            algorithm::EXC_C14N => Some(Self::Exclusive),
            algorithm::EXC_C14N_WITH_COMMENTS => Some(Self::ExclusiveWithComments),
            _ => None,
        }
    }

    pub fn with_comments(&self) -> bool {
        matches!(self, Self::InclusiveWithComments | Self::ExclusiveWithComments)
    }

    pub fn is_exclusive(&self) -> bool {
        matches!(self, Self::Exclusive | Self::ExclusiveWithComments)
    }
}

impl std::fmt::Display for C14nMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.uri())
    }
}

/// Canonicalize a document, or the subtree rooted at `apex` when given.
///
/// - `inclusive_prefixes`: for exclusive C14N, the InclusiveNamespaces
///   PrefixList (`#default` names the default namespace)
pub fn canonicalize(
    doc: &XmlDocument,
    apex: Option<NodeId>,
    mode: C14nMode,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    if let Some(id) = apex {
        if doc.element(id).is_none() {
            return Err(Error::Canonicalization(format!(
                "node {} is not an element",
                id.index()
            )));
        }
    }
    if mode.is_exclusive() {
        Ok(exclusive::canonicalize(doc, apex, mode.with_comments(), inclusive_prefixes))
    } else {
        Ok(inclusive::canonicalize(doc, apex, mode.with_comments()))
    }
}

/// Canonicalize a whole document.
pub fn canonicalize_document(doc: &XmlDocument, mode: C14nMode) -> Result<Vec<u8>, Error> {
    canonicalize(doc, None, mode, &[])
}

/// Canonicalize the element `id` with the namespace context of its ancestors.
pub fn canonicalize_element(
    doc: &XmlDocument,
    id: NodeId,
    mode: C14nMode,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    canonicalize(doc, Some(id), mode, inclusive_prefixes)
}
