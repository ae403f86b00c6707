//! trustcache Core - Data Types and Plug-in Traits
//!
//! Pure data structures and the seams every other crate plugs into.
//! The cache engine itself lives in trustcache-storage.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

pub mod config;
pub mod error;
pub mod identity;
pub mod loader;
pub mod metadata;
pub mod object;
pub mod resource;

pub use config::{RegistryConfig, StoreConfig};
pub use error::{ConfigError, LoadError, ResourceError, StoreError, StoreResult};
pub use identity::ResourceIdentity;
pub use loader::{FnLoader, ObjectLoader};
pub use metadata::ResourceMetadata;
pub use object::{Certificate, Crl, ObjectKind, ProxyCredential, TrustAnchorBundle};
pub use resource::{ResourceHandle, ResourceResolver, ResourceStream};

// ============================================================================
// SHARED TYPES
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// SHA-256 fingerprint of an object's DER encoding.
pub type Fingerprint = [u8; 32];

/// Compute the SHA-256 fingerprint of DER bytes.
pub fn compute_fingerprint(der: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(der);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Render a fingerprint as lowercase hex.
pub fn fingerprint_hex(fingerprint: &Fingerprint) -> String {
    hex::encode(fingerprint)
}
