//! Certificate revocation list loader.

use std::io::Read;
use trustcache_core::object::normalize_serial;
use trustcache_core::{Crl, LoadError, ObjectKind, ObjectLoader};
use x509_parser::parse_x509_crl;

use super::encoding::{decode_blocks, read_all, to_timestamp, unexpected_labels, LABEL_CRL};

/// Loads a CRL from PEM (`X509 CRL`) or DER.
///
/// When a PEM resource holds several CRLs only the first is used, matching
/// how CA directories ship one CRL per file.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrlLoader;

impl CrlLoader {
    pub fn new() -> Self {
        Self
    }

    fn parse(der: &[u8]) -> Result<Crl, LoadError> {
        let (_, crl) =
            parse_x509_crl(der).map_err(|e| LoadError::malformed(format!("invalid CRL: {e}")))?;

        let revoked_serials = crl
            .iter_revoked_certificates()
            .map(|r| normalize_serial(&hex::encode(r.raw_serial())))
            .collect();

        Ok(Crl {
            issuer: crl.issuer().to_string(),
            this_update: to_timestamp(crl.last_update())?,
            next_update: crl.next_update().map(to_timestamp).transpose()?,
            crl_number: crl.crl_number().map(|n| n.to_string()),
            revoked_serials,
            der: der.to_vec(),
        })
    }
}

impl ObjectLoader for CrlLoader {
    type Object = Crl;

    fn kind(&self) -> ObjectKind {
        ObjectKind::Crl
    }

    fn load(&self, stream: &mut dyn Read) -> Result<Crl, LoadError> {
        let bytes = read_all(stream)?;
        let blocks = decode_blocks(&bytes)?;
        let block = blocks
            .iter()
            .find(|b| b.is_labelled(LABEL_CRL))
            .ok_or_else(|| unexpected_labels(&blocks, LABEL_CRL))?;
        Self::parse(&block.der)
    }
}
