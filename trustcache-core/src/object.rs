//! Parsed security objects.
//!
//! Every object keeps its DER encoding alongside the fields extracted at load
//! time, so consumers can hand the raw bytes to a validator without re-reading
//! the resource.

use crate::{compute_fingerprint, Fingerprint, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// OBJECT KIND
// ============================================================================

/// The kind of security object a store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// Certificate revocation list.
    Crl,
    /// A single CA certificate.
    CaCertificate,
    /// Several CA certificates concatenated in one resource.
    TrustAnchorBundle,
    /// Proxy certificate chain with its private key.
    ProxyCredential,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Crl => "crl",
            ObjectKind::CaCertificate => "ca_certificate",
            ObjectKind::TrustAnchorBundle => "trust_anchor_bundle",
            ObjectKind::ProxyCredential => "proxy_credential",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing an invalid object kind string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid object kind: {0}")]
pub struct ObjectKindParseError(pub String);

impl FromStr for ObjectKind {
    type Err = ObjectKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "crl" => Ok(ObjectKind::Crl),
            "ca_certificate" | "certificate" => Ok(ObjectKind::CaCertificate),
            "trust_anchor_bundle" | "trust_anchors" => Ok(ObjectKind::TrustAnchorBundle),
            "proxy_credential" | "proxy" => Ok(ObjectKind::ProxyCredential),
            _ => Err(ObjectKindParseError(s.to_string())),
        }
    }
}

// ============================================================================
// CERTIFICATE REVOCATION LIST
// ============================================================================

/// A parsed certificate revocation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crl {
    /// Issuer distinguished name, RFC 4514 style.
    pub issuer: String,
    pub this_update: Timestamp,
    pub next_update: Option<Timestamp>,
    /// CRL number extension, decimal, if present.
    pub crl_number: Option<String>,
    /// Revoked serial numbers as lowercase hex.
    pub revoked_serials: Vec<String>,
    pub der: Vec<u8>,
}

impl Crl {
    /// Returns true if the given hex serial is listed as revoked.
    pub fn is_revoked(&self, serial_hex: &str) -> bool {
        let wanted = normalize_serial(serial_hex);
        self.revoked_serials.iter().any(|s| *s == wanted)
    }

    /// Returns true if `now` is past `next_update`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.next_update.is_some_and(|next| now > next)
    }

    pub fn fingerprint(&self) -> Fingerprint {
        compute_fingerprint(&self.der)
    }
}

// ============================================================================
// CERTIFICATES
// ============================================================================

/// A parsed X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub subject: String,
    pub issuer: String,
    /// Serial number as lowercase hex.
    pub serial: String,
    pub not_before: Timestamp,
    pub not_after: Timestamp,
    /// Whether basic constraints mark this certificate as a CA.
    pub is_ca: bool,
    pub der: Vec<u8>,
}

impl Certificate {
    /// Returns true if `now` falls inside the validity window.
    pub fn is_valid_at(&self, now: Timestamp) -> bool {
        self.not_before <= now && now <= self.not_after
    }

    /// Returns true if subject and issuer are the same name.
    pub fn is_self_issued(&self) -> bool {
        self.subject == self.issuer
    }

    pub fn fingerprint(&self) -> Fingerprint {
        compute_fingerprint(&self.der)
    }
}

/// All CA certificates found in one resource, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustAnchorBundle {
    pub anchors: Vec<Certificate>,
}

impl TrustAnchorBundle {
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Find an anchor by subject name.
    pub fn find_by_subject(&self, subject: &str) -> Option<&Certificate> {
        self.anchors.iter().find(|c| c.subject == subject)
    }
}

/// A proxy certificate chain together with its private key.
///
/// The key is kept as DER with the PEM label it was read under
/// (`PRIVATE KEY`, `RSA PRIVATE KEY`, `EC PRIVATE KEY`).
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyCredential {
    /// Certificate chain, leaf first.
    pub chain: Vec<Certificate>,
    pub key_label: String,
    pub key_der: Vec<u8>,
}

impl ProxyCredential {
    /// The end-entity certificate of the chain.
    pub fn leaf(&self) -> Option<&Certificate> {
        self.chain.first()
    }

    /// Earliest `not_after` across the chain.
    pub fn expires_at(&self) -> Option<Timestamp> {
        self.chain.iter().map(|c| c.not_after).min()
    }
}

impl fmt::Debug for ProxyCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyCredential")
            .field("chain", &self.chain)
            .field("key_label", &self.key_label)
            .field("key_der", &"<redacted>")
            .finish()
    }
}

/// Normalize a hex serial: lowercase, no separators, no leading zeros.
pub fn normalize_serial(serial_hex: &str) -> String {
    let cleaned: String = serial_hex
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    let trimmed = cleaned.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
