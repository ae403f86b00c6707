//! PEM/DER input handling shared by all loaders.

use chrono::{TimeZone, Utc};
use std::io::Read;
use trustcache_core::object::normalize_serial;
use trustcache_core::{Certificate, LoadError, Timestamp};
use x509_parser::parse_x509_certificate;
use x509_parser::time::ASN1Time;

/// Tag byte of a DER SEQUENCE; every X.509 structure starts with one.
const DER_SEQUENCE: u8 = 0x30;

const PEM_ARMOUR: &[u8] = b"-----BEGIN ";

pub(crate) const LABEL_CERTIFICATE: &str = "CERTIFICATE";
pub(crate) const LABEL_CRL: &str = "X509 CRL";

/// One decoded object: its PEM label (`None` for bare DER) and DER bytes.
#[derive(Debug)]
pub(crate) struct DerBlock {
    pub label: Option<String>,
    pub der: Vec<u8>,
}

impl DerBlock {
    pub fn is_labelled(&self, label: &str) -> bool {
        self.label.as_deref().map_or(true, |l| l == label)
    }
}

/// Consume the whole stream.
pub(crate) fn read_all(stream: &mut dyn Read) -> Result<Vec<u8>, LoadError> {
    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn has_pem_armour(bytes: &[u8]) -> bool {
    bytes.windows(PEM_ARMOUR.len()).any(|w| w == PEM_ARMOUR)
}

/// Split input into DER blocks, accepting either PEM text or one DER object.
///
/// Input carrying PEM armour is PEM, whatever its preamble starts with.
pub(crate) fn decode_blocks(bytes: &[u8]) -> Result<Vec<DerBlock>, LoadError> {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .ok_or_else(|| LoadError::malformed("resource is empty"))?;

    if !has_pem_armour(bytes) {
        if bytes.get(start) == Some(&DER_SEQUENCE) {
            return Ok(vec![DerBlock {
                label: None,
                der: bytes[start..].to_vec(),
            }]);
        }
        return Err(if std::str::from_utf8(bytes).is_ok() {
            LoadError::unsupported("no PEM armour found")
        } else {
            LoadError::unsupported("content is neither DER nor PEM text")
        });
    }

    let text = std::str::from_utf8(bytes)
        .map_err(|_| LoadError::unsupported("PEM armour in non-UTF-8 content"))?;

    let blocks = ::pem::parse_many(text)
        .map_err(|e| LoadError::malformed(format!("invalid PEM: {e}")))?;
    if blocks.is_empty() {
        return Err(LoadError::malformed("no complete PEM block found"));
    }
    Ok(blocks
        .into_iter()
        .map(|p| DerBlock {
            label: Some(p.tag().to_string()),
            der: p.into_contents(),
        })
        .collect())
}

/// Build the error for input whose blocks carry none of the expected labels.
pub(crate) fn unexpected_labels(blocks: &[DerBlock], expected: &str) -> LoadError {
    let found: Vec<&str> = blocks.iter().filter_map(|b| b.label.as_deref()).collect();
    LoadError::unsupported(format!("expected {expected}, found {}", found.join(", ")))
}

pub(crate) fn to_timestamp(time: ASN1Time) -> Result<Timestamp, LoadError> {
    Utc.timestamp_opt(time.timestamp(), 0)
        .single()
        .ok_or_else(|| LoadError::malformed(format!("time out of range: {}", time.timestamp())))
}

pub(crate) fn certificate_from_der(der: &[u8]) -> Result<Certificate, LoadError> {
    let (_, cert) = parse_x509_certificate(der)
        .map_err(|e| LoadError::malformed(format!("invalid certificate: {e}")))?;
    let validity = cert.validity();
    let is_ca = cert
        .basic_constraints()
        .ok()
        .flatten()
        .is_some_and(|bc| bc.value.ca);
    Ok(Certificate {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        serial: normalize_serial(&hex::encode(cert.raw_serial())),
        not_before: to_timestamp(validity.not_before)?,
        not_after: to_timestamp(validity.not_after)?,
        is_ca,
        der: der.to_vec(),
    })
}
