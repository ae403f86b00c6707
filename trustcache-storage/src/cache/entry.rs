//! Cached entries and the staleness decision taken on every read.

use std::sync::Arc;
use trustcache_core::{ResourceMetadata, Timestamp};

/// A parsed object together with the metadata of the resource it was read from.
///
/// Entries are immutable; a reload installs a new entry.
#[derive(Debug)]
pub struct CachedEntry<T> {
    pub object: Arc<T>,
    /// Metadata captured immediately before the resource was read.
    pub source_metadata: ResourceMetadata,
    pub loaded_at: Timestamp,
}

impl<T> CachedEntry<T> {
    pub fn new(object: Arc<T>, source_metadata: ResourceMetadata, loaded_at: Timestamp) -> Self {
        Self {
            object,
            source_metadata,
            loaded_at,
        }
    }
}

/// What a read must do, given the cached entry (if any) and current metadata.
#[derive(Debug)]
pub(crate) enum Staleness<T> {
    /// No entry and the resource exists: load it.
    Missing,
    /// No entry and no resource.
    NotFound,
    /// Entry present, resource deleted: evict.
    Gone,
    /// Entry matches the resource.
    Fresh(Arc<CachedEntry<T>>),
    /// Entry present, resource changed: reload.
    Stale(Arc<CachedEntry<T>>),
}

impl<T> Staleness<T> {
    pub(crate) fn assess(entry: Option<Arc<CachedEntry<T>>>, current: &ResourceMetadata) -> Self {
        match entry {
            None if current.exists => Staleness::Missing,
            None => Staleness::NotFound,
            Some(_) if !current.exists => Staleness::Gone,
            Some(e) if e.source_metadata.matches(current) => Staleness::Fresh(e),
            Some(e) => Staleness::Stale(e),
        }
    }
}
