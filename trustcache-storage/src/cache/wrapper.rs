//! Single-resource views over a store.

use std::fmt;
use std::sync::Arc;
use trustcache_core::{
    Certificate, Crl, ObjectLoader, ProxyCredential, ResourceHandle, ResourceIdentity,
    StoreResult, TrustAnchorBundle,
};

use super::read::CacheRead;
use super::store::ResourceStore;
use crate::loader::{CertificateLoader, CrlLoader, ProxyCredentialLoader, TrustAnchorLoader};

/// Binds one resource to a store, so callers holding "the CRL of this CA"
/// always see the current object without repeating the name.
pub struct ResourceSecurityWrapper<L: ObjectLoader> {
    store: Arc<ResourceStore<L>>,
    handle: Arc<dyn ResourceHandle>,
}

impl<L: ObjectLoader> Clone for ResourceSecurityWrapper<L> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            handle: Arc::clone(&self.handle),
        }
    }
}

impl<L: ObjectLoader> fmt::Debug for ResourceSecurityWrapper<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceSecurityWrapper")
            .field("kind", &self.store.kind())
            .field("identity", self.handle.identity())
            .finish()
    }
}

impl<L: ObjectLoader> ResourceSecurityWrapper<L> {
    /// Bind a resource name, resolved through the store's resolver.
    pub fn new(store: Arc<ResourceStore<L>>, name: &str) -> StoreResult<Self> {
        let handle = store.resolver().resolve(name)?;
        Ok(Self { store, handle })
    }

    pub fn from_resource(store: Arc<ResourceStore<L>>, handle: Arc<dyn ResourceHandle>) -> Self {
        Self { store, handle }
    }

    /// Bind a resource name and seed the store with an object the caller has
    /// already parsed.
    pub fn with_object(
        store: Arc<ResourceStore<L>>,
        name: &str,
        object: Arc<L::Object>,
    ) -> StoreResult<Self> {
        let wrapper = Self::new(store, name)?;
        wrapper.store.put_resource(wrapper.handle.as_ref(), object)?;
        Ok(wrapper)
    }

    pub fn object(&self) -> StoreResult<Arc<L::Object>> {
        self.store.get_resource(self.handle.as_ref())
    }

    pub fn read(&self) -> StoreResult<CacheRead<L::Object>> {
        self.store.read_resource(self.handle.as_ref())
    }

    /// The current object, or `None` if the resource does not exist.
    pub fn object_or_null(&self) -> StoreResult<Option<Arc<L::Object>>> {
        match self.object() {
            Ok(object) => Ok(Some(object)),
            Err(e) if e.is_not_found() || e.is_gone() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn invalidate(&self) -> StoreResult<bool> {
        self.store.invalidate_identity(self.handle.identity())
    }

    pub fn identity(&self) -> &ResourceIdentity {
        self.handle.identity()
    }

    pub fn store(&self) -> &Arc<ResourceStore<L>> {
        &self.store
    }
}

pub type ResourceCrl = ResourceSecurityWrapper<CrlLoader>;
pub type ResourceCaCertificate = ResourceSecurityWrapper<CertificateLoader>;
pub type ResourceTrustAnchors = ResourceSecurityWrapper<TrustAnchorLoader>;
pub type ResourceProxyCredential = ResourceSecurityWrapper<ProxyCredentialLoader>;

impl ResourceSecurityWrapper<CrlLoader> {
    pub fn crl(&self) -> StoreResult<Arc<Crl>> {
        self.object()
    }
}

impl ResourceSecurityWrapper<CertificateLoader> {
    pub fn certificate(&self) -> StoreResult<Arc<Certificate>> {
        self.object()
    }
}

impl ResourceSecurityWrapper<TrustAnchorLoader> {
    pub fn anchors(&self) -> StoreResult<Arc<TrustAnchorBundle>> {
        self.object()
    }
}

impl ResourceSecurityWrapper<ProxyCredentialLoader> {
    pub fn credential(&self) -> StoreResult<Arc<ProxyCredential>> {
        self.object()
    }
}
