//! Object loader plug-ins, one per security-object kind.
//!
//! Every loader accepts PEM text or a bare DER encoding and hands the DER to
//! `x509-parser`. Extracted fields are copied into owned values so the parsed
//! object outlives the buffer it came from.

pub mod certificate;
pub mod crl;
mod encoding;
pub mod proxy;

pub use certificate::{CertificateLoader, TrustAnchorLoader};
pub use crl::CrlLoader;
pub use proxy::ProxyCredentialLoader;
