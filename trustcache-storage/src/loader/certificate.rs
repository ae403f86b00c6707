//! CA certificate and trust-anchor bundle loaders.

use std::io::Read;
use trustcache_core::{Certificate, LoadError, ObjectKind, ObjectLoader, TrustAnchorBundle};

use super::encoding::{
    certificate_from_der, decode_blocks, read_all, unexpected_labels, LABEL_CERTIFICATE,
};

/// Loads a single CA certificate from PEM (`CERTIFICATE`) or DER.
#[derive(Debug, Clone, Copy, Default)]
pub struct CertificateLoader;

impl CertificateLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ObjectLoader for CertificateLoader {
    type Object = Certificate;

    fn kind(&self) -> ObjectKind {
        ObjectKind::CaCertificate
    }

    fn load(&self, stream: &mut dyn Read) -> Result<Certificate, LoadError> {
        let bytes = read_all(stream)?;
        let blocks = decode_blocks(&bytes)?;
        let block = blocks
            .iter()
            .find(|b| b.is_labelled(LABEL_CERTIFICATE))
            .ok_or_else(|| unexpected_labels(&blocks, LABEL_CERTIFICATE))?;
        certificate_from_der(&block.der)
    }
}

/// Loads every certificate of a concatenated PEM bundle.
///
/// Non-certificate blocks are skipped. A single DER certificate is accepted
/// as a one-element bundle.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustAnchorLoader;

impl TrustAnchorLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ObjectLoader for TrustAnchorLoader {
    type Object = TrustAnchorBundle;

    fn kind(&self) -> ObjectKind {
        ObjectKind::TrustAnchorBundle
    }

    fn load(&self, stream: &mut dyn Read) -> Result<TrustAnchorBundle, LoadError> {
        let bytes = read_all(stream)?;
        let blocks = decode_blocks(&bytes)?;
        let anchors = blocks
            .iter()
            .filter(|b| b.is_labelled(LABEL_CERTIFICATE))
            .map(|b| certificate_from_der(&b.der))
            .collect::<Result<Vec<_>, _>>()?;
        if anchors.is_empty() {
            return Err(unexpected_labels(&blocks, LABEL_CERTIFICATE));
        }
        Ok(TrustAnchorBundle { anchors })
    }
}
