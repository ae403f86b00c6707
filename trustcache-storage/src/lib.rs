//! trustcache Storage - Resources, Loaders and the Cache Engine
//!
//! Resolves resources (files, in-memory blobs), parses them into security
//! objects with the built-in loaders, and caches the results with
//! metadata-based staleness detection.

pub mod cache;
pub mod loader;
pub mod resource;

pub use cache::{
    AnyStore, CacheRead, CacheStats, CachedEntry, LoadOutcome, ResolverFactory,
    ResourceCaCertificate, ResourceCrl, ResourceProxyCredential, ResourceSecurityWrapper,
    ResourceStore, ResourceTrustAnchors, StoreRegistry,
};
pub use loader::{CertificateLoader, CrlLoader, ProxyCredentialLoader, TrustAnchorLoader};
pub use resource::{FileResolver, FileResource, MemoryResolver, MemoryResource};

/// Store of certificate revocation lists.
pub type CrlStore = ResourceStore<CrlLoader>;
/// Store of single CA certificates.
pub type CaCertificateStore = ResourceStore<CertificateLoader>;
/// Store of trust-anchor bundles.
pub type TrustAnchorStore = ResourceStore<TrustAnchorLoader>;
/// Store of proxy credentials.
pub type ProxyCredentialStore = ResourceStore<ProxyCredentialLoader>;
