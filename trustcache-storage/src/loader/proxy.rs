//! Proxy credential loader.
//!
//! A proxy credential file holds the proxy certificate, its private key and
//! usually the rest of the chain, all PEM. Blocks may appear in any order;
//! certificates keep file order, so the leaf must come first.

use std::io::Read;
use trustcache_core::{LoadError, ObjectKind, ObjectLoader, ProxyCredential};

use super::encoding::{certificate_from_der, decode_blocks, read_all, LABEL_CERTIFICATE};

const KEY_LABELS: [&str; 3] = ["PRIVATE KEY", "RSA PRIVATE KEY", "EC PRIVATE KEY"];
const ENCRYPTED_KEY_LABEL: &str = "ENCRYPTED PRIVATE KEY";

#[derive(Debug, Clone, Copy, Default)]
pub struct ProxyCredentialLoader;

impl ProxyCredentialLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ObjectLoader for ProxyCredentialLoader {
    type Object = ProxyCredential;

    fn kind(&self) -> ObjectKind {
        ObjectKind::ProxyCredential
    }

    fn load(&self, stream: &mut dyn Read) -> Result<ProxyCredential, LoadError> {
        let bytes = read_all(stream)?;
        let blocks = decode_blocks(&bytes)?;

        if blocks.iter().any(|b| b.label.is_none()) {
            return Err(LoadError::unsupported(
                "proxy credentials must be PEM with certificate and key blocks",
            ));
        }
        if blocks
            .iter()
            .any(|b| b.label.as_deref() == Some(ENCRYPTED_KEY_LABEL))
        {
            return Err(LoadError::unsupported("encrypted private keys are not supported"));
        }

        let chain = blocks
            .iter()
            .filter(|b| b.label.as_deref() == Some(LABEL_CERTIFICATE))
            .map(|b| certificate_from_der(&b.der))
            .collect::<Result<Vec<_>, _>>()?;
        if chain.is_empty() {
            return Err(LoadError::malformed("proxy credential has no certificate"));
        }

        let key = blocks
            .iter()
            .find(|b| b.label.as_deref().is_some_and(|l| KEY_LABELS.contains(&l)))
            .ok_or_else(|| LoadError::malformed("proxy credential has no private key"))?;

        Ok(ProxyCredential {
            chain,
            key_label: key.label.clone().unwrap_or_default(),
            key_der: key.der.clone(),
        })
    }
}
