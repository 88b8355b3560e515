#![forbid(unsafe_code)]

//! DSig context: the collaborators and settings used by validation.

use bankws_crl::{RevocationCheck, RevocationChecker, RevocationConfig};
use bankws_xml::IdAttr;

/// Context for XML-DSig validation.
pub struct DsigContext {
    /// Consulted with the signer's certificate before the signature value
    /// is checked.
    pub revocation: Box<dyn RevocationCheck>,
    /// Attributes that carry element identifiers for `#id` references.
    pub id_attrs: Vec<IdAttr>,
    /// Log pre-digest and pre-signature data at debug level.
    pub debug: bool,
}

impl DsigContext {
    pub fn new(revocation: Box<dyn RevocationCheck>) -> Self {
        Self {
            revocation,
            id_attrs: IdAttr::defaults(),
            debug: false,
        }
    }

    /// A context backed by the file-cached CRL described by `config`.
    pub fn with_revocation_config(config: RevocationConfig) -> Self {
        Self::new(Box::new(RevocationChecker::from_config(config)))
    }

    /// Register an extra ID attribute, `{namespace}local` or a bare name.
    pub fn add_id_attr(&mut self, name: &str) {
        let attr = IdAttr::parse(name);
        if !self.id_attrs.contains(&attr) {
            self.id_attrs.push(attr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bankws_core::Error;

    struct NeverRevoked;

    impl RevocationCheck for NeverRevoked {
        fn is_revoked(&self, _: &[u8]) -> Result<bool, Error> {
            Ok(false)
        }
    }

    #[test]
    fn test_add_id_attr_deduplicates() {
        let mut ctx = DsigContext::new(Box::new(NeverRevoked));
        let before = ctx.id_attrs.len();
        ctx.add_id_attr("Id");
        assert_eq!(ctx.id_attrs.len(), before);
        ctx.add_id_attr("{urn:x}ref");
        assert_eq!(ctx.id_attrs.last(), Some(&IdAttr::new(Some("urn:x"), "ref")));
    }
}
