//! Inventory of what each configured store currently holds.

use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use trustcache_core::{
    fingerprint_hex, Certificate, Crl, ObjectKind, ObjectLoader, ProxyCredential,
    ResourceIdentity, StoreConfig, Timestamp, TrustAnchorBundle,
};
use trustcache_storage::{AnyStore, CacheStats, ResourceStore};

/// One line of the inventory.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectSummary {
    pub identity: String,
    pub subject: String,
    pub detail: String,
    pub expires: Option<Timestamp>,
    pub fingerprint: Option<String>,
}

/// Objects that can be listed in the inventory.
pub trait Describe {
    fn describe(&self, identity: &ResourceIdentity) -> ObjectSummary;
}

impl Describe for Crl {
    fn describe(&self, identity: &ResourceIdentity) -> ObjectSummary {
        ObjectSummary {
            identity: identity.to_string(),
            subject: self.issuer.clone(),
            detail: format!(
                "crl #{} with {} revoked",
                self.crl_number.as_deref().unwrap_or("-"),
                self.revoked_serials.len()
            ),
            expires: self.next_update,
            fingerprint: Some(fingerprint_hex(&self.fingerprint())),
        }
    }
}

impl Describe for Certificate {
    fn describe(&self, identity: &ResourceIdentity) -> ObjectSummary {
        ObjectSummary {
            identity: identity.to_string(),
            subject: self.subject.clone(),
            detail: format!("serial {}{}", self.serial, if self.is_ca { " (CA)" } else { "" }),
            expires: Some(self.not_after),
            fingerprint: Some(fingerprint_hex(&self.fingerprint())),
        }
    }
}

impl Describe for TrustAnchorBundle {
    fn describe(&self, identity: &ResourceIdentity) -> ObjectSummary {
        ObjectSummary {
            identity: identity.to_string(),
            subject: self
                .anchors
                .first()
                .map(|c| c.subject.clone())
                .unwrap_or_default(),
            detail: format!("{} anchors", self.len()),
            expires: self.anchors.iter().map(|c| c.not_after).min(),
            fingerprint: None,
        }
    }
}

impl Describe for ProxyCredential {
    fn describe(&self, identity: &ResourceIdentity) -> ObjectSummary {
        ObjectSummary {
            identity: identity.to_string(),
            subject: self.leaf().map(|c| c.subject.clone()).unwrap_or_default(),
            detail: format!("chain of {}, {} key", self.chain.len(), self.key_label),
            expires: self.expires_at(),
            fingerprint: self.leaf().map(|c| fingerprint_hex(&c.fingerprint())),
        }
    }
}

/// Inventory of one store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreReport {
    pub kind: ObjectKind,
    pub root: PathBuf,
    pub objects: Vec<ObjectSummary>,
    pub stats: CacheStats,
    /// Set when the store's resources could not be listed.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: Timestamp,
    pub stores: Vec<StoreReport>,
}

impl Report {
    /// Refresh every store and summarize its contents.
    pub fn collect(stores: &[(StoreConfig, AnyStore)]) -> Self {
        let stores = stores
            .iter()
            .map(|(config, store)| {
                let objects = match store {
                    AnyStore::Crl(s) => summarize(s),
                    AnyStore::CaCertificate(s) => summarize(s),
                    AnyStore::TrustAnchors(s) => summarize(s),
                    AnyStore::ProxyCredential(s) => summarize(s),
                };
                let (objects, error) = match objects {
                    Ok(objects) => (objects, None),
                    Err(err) => {
                        warn!(kind = %config.kind, root = %config.root.display(), error = %err, "store refresh failed");
                        (Vec::new(), Some(err.to_string()))
                    }
                };
                StoreReport {
                    kind: config.kind,
                    root: config.root.clone(),
                    objects,
                    stats: store.stats(),
                    error,
                }
            })
            .collect();
        Report {
            generated_at: Utc::now(),
            stores,
        }
    }

    pub fn object_count(&self) -> usize {
        self.stores.iter().map(|s| s.objects.len()).sum()
    }
}

fn summarize<L>(store: &Arc<ResourceStore<L>>) -> trustcache_core::StoreResult<Vec<ObjectSummary>>
where
    L: ObjectLoader,
    L::Object: Describe,
{
    Ok(store
        .load_all()?
        .iter()
        .map(|(identity, object)| object.describe(identity))
        .collect())
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for store in &self.stores {
            writeln!(
                f,
                "[{}] {} ({} objects, hit rate {:.0}%)",
                store.kind,
                store.root.display(),
                store.objects.len(),
                store.stats.hit_rate() * 100.0
            )?;
            if let Some(error) = &store.error {
                writeln!(f, "  error: {error}")?;
            }
            for object in &store.objects {
                let expires = object
                    .expires
                    .map(|t| t.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "-".to_string());
                writeln!(
                    f,
                    "  {}  {}  {}  expires {}",
                    object.identity, object.subject, object.detail, expires
                )?;
            }
        }
        Ok(())
    }
}
