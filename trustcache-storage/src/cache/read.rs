//! Results of store reads, carrying how the object was produced.
//!
//! A plain `get` hands back the object. `read` returns a [`CacheRead`] so a
//! caller that cares can tell a hit from a fresh load, and in particular can
//! notice when it is being served a stale copy because the reload failed.

use std::sync::Arc;
use std::time::Duration;
use trustcache_core::{ResourceIdentity, ResourceMetadata, Timestamp};

use super::entry::CachedEntry;

/// How a read was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Cached entry matched the resource metadata.
    Hit,
    /// No entry existed; the resource was loaded.
    Loaded,
    /// The resource had changed and was reloaded.
    Reloaded,
    /// The resource had changed but could not be read; the previous entry
    /// was returned unchanged.
    StaleFallback,
}

impl LoadOutcome {
    pub fn is_hit(&self) -> bool {
        matches!(self, LoadOutcome::Hit)
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, LoadOutcome::StaleFallback)
    }
}

/// Result of a store read.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    identity: ResourceIdentity,
    object: Arc<T>,
    source_metadata: ResourceMetadata,
    loaded_at: Timestamp,
    outcome: LoadOutcome,
}

impl<T> CacheRead<T> {
    pub(crate) fn from_entry(
        identity: ResourceIdentity,
        entry: &CachedEntry<T>,
        outcome: LoadOutcome,
    ) -> Self {
        Self {
            identity,
            object: Arc::clone(&entry.object),
            source_metadata: entry.source_metadata,
            loaded_at: entry.loaded_at,
            outcome,
        }
    }

    /// Consume the read and return the shared object.
    pub fn into_object(self) -> Arc<T> {
        self.object
    }

    pub fn object(&self) -> &Arc<T> {
        &self.object
    }

    pub fn identity(&self) -> &ResourceIdentity {
        &self.identity
    }

    /// Metadata of the resource state the object was parsed from.
    pub fn source_metadata(&self) -> &ResourceMetadata {
        &self.source_metadata
    }

    pub fn loaded_at(&self) -> Timestamp {
        self.loaded_at
    }

    pub fn outcome(&self) -> LoadOutcome {
        self.outcome
    }

    pub fn was_cache_hit(&self) -> bool {
        self.outcome.is_hit()
    }

    /// Time elapsed since the object was parsed.
    pub fn age(&self) -> Duration {
        (chrono::Utc::now() - self.loaded_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.object
    }
}
