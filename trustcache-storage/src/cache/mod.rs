//! Resource-backed cache of parsed security objects.
//!
//! Staleness is detected by polling resource metadata on every read rather
//! than by expiry timers: a cached object is served exactly as long as the
//! resource it came from is unchanged. Reads report how they were satisfied
//! through [`CacheRead`], so a caller can notice when a failed reload left it
//! with the previous object.
//!
//! # Example
//!
//! ```ignore
//! let registry = StoreRegistry::new();
//! let crls = registry.crl_store(&StoreConfig::new(ObjectKind::Crl, "/etc/grid-security/certificates"))?;
//!
//! let read = crls.read("1a2b3c4d.r0")?;
//! if read.outcome().is_stale() {
//!     tracing::warn!("using previous CRL");
//! }
//! let crl = read.into_object();
//! ```

pub mod entry;
pub mod read;
pub mod registry;
pub mod stats;
pub mod store;
pub mod wrapper;

pub use entry::CachedEntry;
pub use read::{CacheRead, LoadOutcome};
pub use registry::{AnyStore, ResolverFactory, StoreRegistry};
pub use stats::CacheStats;
pub use store::ResourceStore;
pub use wrapper::{
    ResourceCaCertificate, ResourceCrl, ResourceProxyCredential, ResourceSecurityWrapper,
    ResourceTrustAnchors,
};
