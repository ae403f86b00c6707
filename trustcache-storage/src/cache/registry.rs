//! Registry of shared stores, keyed by configuration.
//!
//! Components that ask for a store with the same [`StoreConfig`] receive the
//! same instance, so a CRL parsed for one consumer is reused by every other.
//! The registry is an ordinary value; applications create one and pass it
//! around.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;
use tracing::info;
use trustcache_core::{ConfigError, ObjectKind, ObjectLoader, ResourceResolver, StoreConfig};

use super::stats::CacheStats;
use super::store::ResourceStore;
use crate::loader::{CertificateLoader, CrlLoader, ProxyCredentialLoader, TrustAnchorLoader};
use crate::resource::FileResolver;

/// Builds the resolver a new store reads its resources through.
pub type ResolverFactory = Arc<dyn Fn(&StoreConfig) -> Arc<dyn ResourceResolver> + Send + Sync>;

struct RegisteredStore {
    store: Arc<dyn Any + Send + Sync>,
    object_type: &'static str,
}

pub struct StoreRegistry {
    stores: DashMap<StoreConfig, RegisteredStore>,
    resolver_factory: ResolverFactory,
}

impl fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("stores", &self.stores.len())
            .finish_non_exhaustive()
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreRegistry {
    /// A registry whose stores read files under each config's root.
    pub fn new() -> Self {
        Self::with_resolver_factory(Arc::new(|config: &StoreConfig| {
            Arc::new(FileResolver::for_config(config)) as Arc<dyn ResourceResolver>
        }))
    }

    pub fn with_resolver_factory(resolver_factory: ResolverFactory) -> Self {
        Self {
            stores: DashMap::new(),
            resolver_factory,
        }
    }

    /// Return the store registered for `config`, creating it with the loader
    /// from `make_loader` if there is none.
    ///
    /// Fails if the loader's kind differs from the configured kind, or if the
    /// config is already registered for a different object type.
    pub fn get_or_create<L, F>(
        &self,
        config: &StoreConfig,
        make_loader: F,
    ) -> Result<Arc<ResourceStore<L>>, ConfigError>
    where
        L: ObjectLoader,
        F: FnOnce() -> L,
    {
        config.validate()?;
        let key = config.normalized();

        match self.stores.entry(key) {
            Entry::Occupied(occupied) => {
                let registered = occupied.get();
                Arc::clone(&registered.store)
                    .downcast::<ResourceStore<L>>()
                    .map_err(|_| ConfigError::TypeMismatch {
                        kind: occupied.key().kind,
                        root: occupied.key().root.clone(),
                    })
            }
            Entry::Vacant(vacant) => {
                let loader = make_loader();
                let key = vacant.key();
                if loader.kind() != key.kind {
                    return Err(ConfigError::KindMismatch {
                        expected: key.kind,
                        got: loader.kind(),
                    });
                }
                let resolver = (self.resolver_factory)(key);
                let store = Arc::new(ResourceStore::new(loader, resolver));
                info!(
                    kind = %key.kind,
                    root = %key.root.display(),
                    object_type = type_name::<L::Object>(),
                    "store created"
                );
                vacant.insert(RegisteredStore {
                    store: Arc::clone(&store) as Arc<dyn Any + Send + Sync>,
                    object_type: type_name::<L::Object>(),
                });
                Ok(store)
            }
        }
    }

    pub fn crl_store(&self, config: &StoreConfig) -> Result<Arc<ResourceStore<CrlLoader>>, ConfigError> {
        self.get_or_create(config, CrlLoader::new)
    }

    pub fn ca_certificate_store(
        &self,
        config: &StoreConfig,
    ) -> Result<Arc<ResourceStore<CertificateLoader>>, ConfigError> {
        self.get_or_create(config, CertificateLoader::new)
    }

    pub fn trust_anchor_store(
        &self,
        config: &StoreConfig,
    ) -> Result<Arc<ResourceStore<TrustAnchorLoader>>, ConfigError> {
        self.get_or_create(config, TrustAnchorLoader::new)
    }

    pub fn proxy_credential_store(
        &self,
        config: &StoreConfig,
    ) -> Result<Arc<ResourceStore<ProxyCredentialLoader>>, ConfigError> {
        self.get_or_create(config, ProxyCredentialLoader::new)
    }

    /// Open the built-in store for a config's kind.
    pub fn open(&self, config: &StoreConfig) -> Result<AnyStore, ConfigError> {
        Ok(match config.kind {
            ObjectKind::Crl => AnyStore::Crl(self.crl_store(config)?),
            ObjectKind::CaCertificate => AnyStore::CaCertificate(self.ca_certificate_store(config)?),
            ObjectKind::TrustAnchorBundle => {
                AnyStore::TrustAnchors(self.trust_anchor_store(config)?)
            }
            ObjectKind::ProxyCredential => {
                AnyStore::ProxyCredential(self.proxy_credential_store(config)?)
            }
        })
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    pub fn contains(&self, config: &StoreConfig) -> bool {
        self.stores.contains_key(&config.normalized())
    }

    /// Forget the store for `config`. Holders of the store keep using it;
    /// later lookups create a new one.
    pub fn remove(&self, config: &StoreConfig) -> bool {
        self.stores.remove(&config.normalized()).is_some()
    }

    /// Registered configs with the object type each store holds, sorted.
    pub fn registered(&self) -> Vec<(StoreConfig, &'static str)> {
        let mut out: Vec<_> = self
            .stores
            .iter()
            .map(|r| (r.key().clone(), r.value().object_type))
            .collect();
        out.sort_by(|a, b| (a.0.kind, &a.0.root).cmp(&(b.0.kind, &b.0.root)));
        out
    }
}

/// A built-in store of any kind, for callers driven by configuration.
#[derive(Debug, Clone)]
pub enum AnyStore {
    Crl(Arc<ResourceStore<CrlLoader>>),
    CaCertificate(Arc<ResourceStore<CertificateLoader>>),
    TrustAnchors(Arc<ResourceStore<TrustAnchorLoader>>),
    ProxyCredential(Arc<ResourceStore<ProxyCredentialLoader>>),
}

impl AnyStore {
    pub fn kind(&self) -> ObjectKind {
        match self {
            AnyStore::Crl(_) => ObjectKind::Crl,
            AnyStore::CaCertificate(_) => ObjectKind::CaCertificate,
            AnyStore::TrustAnchors(_) => ObjectKind::TrustAnchorBundle,
            AnyStore::ProxyCredential(_) => ObjectKind::ProxyCredential,
        }
    }

    pub fn stats(&self) -> CacheStats {
        match self {
            AnyStore::Crl(s) => s.stats(),
            AnyStore::CaCertificate(s) => s.stats(),
            AnyStore::TrustAnchors(s) => s.stats(),
            AnyStore::ProxyCredential(s) => s.stats(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            AnyStore::Crl(s) => s.len(),
            AnyStore::CaCertificate(s) => s.len(),
            AnyStore::TrustAnchors(s) => s.len(),
            AnyStore::ProxyCredential(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
