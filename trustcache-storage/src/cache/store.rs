//! The resource-backed security store.
//!
//! A [`ResourceStore`] maps resource identities to parsed objects. Every read
//! polls the resource's metadata and compares it with the metadata captured
//! when the cached object was loaded; equal metadata is a hit, anything else
//! triggers a reload.
//!
//! # Failure policy
//!
//! When a reload fails and a previous entry exists:
//!
//! - transient failures (resource unavailable, read interrupted) keep the
//!   previous entry and return it as [`LoadOutcome::StaleFallback`];
//! - content that is confirmed invalid (malformed, unsupported encoding)
//!   evicts the entry and surfaces the error.
//!
//! A resource that disappeared evicts its entry and fails with
//! [`StoreError::Gone`]. Nothing is ever cached for a resource that does not
//! exist.
//!
//! # Concurrency
//!
//! Each identity owns a slot whose load mutex is held for the whole
//! check-load-install sequence. Reads of different identities never contend,
//! and at most one load per identity is in flight; callers arriving during a
//! load wait and then see the installed entry as a hit. The installed entry
//! lives in its own cell, so introspection never waits on a load.

use chrono::Utc;
use dashmap::DashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, warn};
use trustcache_core::{
    ObjectKind, ObjectLoader, ResourceError, ResourceHandle, ResourceIdentity, ResourceMetadata,
    ResourceResolver, StoreError, StoreResult,
};

use super::entry::{CachedEntry, Staleness};
use super::read::{CacheRead, LoadOutcome};
use super::stats::{CacheStats, StoreCounters};

/// Per-identity cache cell.
struct Slot<T> {
    /// Held across check-load-install.
    load: Mutex<()>,
    /// Installed entry. Only written while `load` is held.
    entry: RwLock<Option<Arc<CachedEntry<T>>>>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            load: Mutex::new(()),
            entry: RwLock::new(None),
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, ()>> {
        self.load.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// True if the slot holds no entry and nobody is working on it.
    fn is_vacant(&self) -> bool {
        self.load.try_lock().is_ok() && self.current().is_none()
    }

    fn current(&self) -> Option<Arc<CachedEntry<T>>> {
        self.entry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the installed entry, returning the previous one.
    fn install(&self, entry: Option<Arc<CachedEntry<T>>>) -> Option<Arc<CachedEntry<T>>> {
        let mut cell = self.entry.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *cell, entry)
    }
}

/// Result of one attempt to read and parse a resource.
enum LoadAttempt<T> {
    Loaded(CachedEntry<T>),
    /// The resource could not be read right now; its content is unknown.
    Transient(StoreError),
    /// The resource was read and its content rejected.
    Invalid(StoreError),
}

/// A cache of parsed security objects of one kind, backed by resources.
pub struct ResourceStore<L: ObjectLoader> {
    loader: L,
    resolver: Arc<dyn ResourceResolver>,
    slots: DashMap<ResourceIdentity, Arc<Slot<L::Object>>>,
    counters: StoreCounters,
}

impl<L: ObjectLoader> fmt::Debug for ResourceStore<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceStore")
            .field("kind", &self.loader.kind())
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

impl<L: ObjectLoader> ResourceStore<L> {
    pub fn new(loader: L, resolver: Arc<dyn ResourceResolver>) -> Self {
        Self {
            loader,
            resolver,
            slots: DashMap::new(),
            counters: StoreCounters::default(),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.loader.kind()
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn resolver(&self) -> &Arc<dyn ResourceResolver> {
        &self.resolver
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Return the current object for a resource name, loading or reloading
    /// it as needed.
    pub fn get(&self, name: &str) -> StoreResult<Arc<L::Object>> {
        self.read(name).map(CacheRead::into_object)
    }

    /// Like [`get`](Self::get), for a resource the caller already holds.
    pub fn get_resource(&self, handle: &dyn ResourceHandle) -> StoreResult<Arc<L::Object>> {
        self.read_resource(handle).map(CacheRead::into_object)
    }

    /// Like [`get`](Self::get), but absence (never existed, or deleted) is
    /// `None` rather than an error. Other failures are still errors.
    pub fn get_or_null(&self, name: &str) -> StoreResult<Option<Arc<L::Object>>> {
        match self.get(name) {
            Ok(object) => Ok(Some(object)),
            Err(e) if e.is_not_found() || e.is_gone() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Return the current object together with how it was produced.
    pub fn read(&self, name: &str) -> StoreResult<CacheRead<L::Object>> {
        let handle = self.resolver.resolve(name)?;
        self.read_resource(handle.as_ref())
    }

    pub fn read_resource(&self, handle: &dyn ResourceHandle) -> StoreResult<CacheRead<L::Object>> {
        let identity = handle.identity().clone();
        let slot = self.slot(&identity);
        let result = self.read_locked(&slot, &identity, handle);
        if result.is_err() {
            self.prune(&identity, slot);
        }
        result
    }

    fn read_locked(
        &self,
        slot: &Slot<L::Object>,
        identity: &ResourceIdentity,
        handle: &dyn ResourceHandle,
    ) -> StoreResult<CacheRead<L::Object>> {
        let _loading = slot.lock()?;
        let current = handle.metadata();

        match Staleness::assess(slot.current(), &current) {
            Staleness::Fresh(entry) => {
                StoreCounters::bump(&self.counters.hits);
                debug!(identity = %identity, "cache hit");
                Ok(CacheRead::from_entry(identity.clone(), &entry, LoadOutcome::Hit))
            }
            Staleness::NotFound => Err(ResourceError::NotFound {
                name: identity.to_string(),
            }
            .into()),
            Staleness::Gone => {
                slot.install(None);
                StoreCounters::bump(&self.counters.evictions);
                debug!(identity = %identity, "resource deleted, entry evicted");
                Err(StoreError::Gone {
                    identity: identity.clone(),
                })
            }
            Staleness::Missing => {
                StoreCounters::bump(&self.counters.misses);
                match self.attempt_load(identity, handle, current) {
                    LoadAttempt::Loaded(entry) => {
                        let entry = Arc::new(entry);
                        slot.install(Some(Arc::clone(&entry)));
                        debug!(identity = %identity, kind = %self.kind(), "loaded");
                        Ok(CacheRead::from_entry(identity.clone(), &entry, LoadOutcome::Loaded))
                    }
                    LoadAttempt::Transient(err) | LoadAttempt::Invalid(err) => {
                        StoreCounters::bump(&self.counters.load_failures);
                        debug!(identity = %identity, error = %err, "load failed");
                        Err(err)
                    }
                }
            }
            Staleness::Stale(prior) => match self.attempt_load(identity, handle, current) {
                LoadAttempt::Loaded(entry) => {
                    let entry = Arc::new(entry);
                    slot.install(Some(Arc::clone(&entry)));
                    StoreCounters::bump(&self.counters.reloads);
                    debug!(identity = %identity, kind = %self.kind(), "reloaded");
                    Ok(CacheRead::from_entry(identity.clone(), &entry, LoadOutcome::Reloaded))
                }
                LoadAttempt::Transient(err) => {
                    StoreCounters::bump(&self.counters.load_failures);
                    StoreCounters::bump(&self.counters.stale_fallbacks);
                    warn!(
                        identity = %identity,
                        error = %err,
                        loaded_at = %prior.loaded_at,
                        "reload failed, serving previous entry"
                    );
                    Ok(CacheRead::from_entry(
                        identity.clone(),
                        &prior,
                        LoadOutcome::StaleFallback,
                    ))
                }
                LoadAttempt::Invalid(err) => {
                    slot.install(None);
                    StoreCounters::bump(&self.counters.load_failures);
                    StoreCounters::bump(&self.counters.evictions);
                    warn!(identity = %identity, error = %err, "resource content rejected, entry evicted");
                    Err(err)
                }
            },
        }
    }

    fn attempt_load(
        &self,
        identity: &ResourceIdentity,
        handle: &dyn ResourceHandle,
        metadata: ResourceMetadata,
    ) -> LoadAttempt<L::Object> {
        let mut stream = match handle.open_stream() {
            Ok(stream) => stream,
            Err(err) => return LoadAttempt::Transient(err.into()),
        };
        match self.loader.load(&mut stream) {
            Ok(object) => LoadAttempt::Loaded(CachedEntry::new(Arc::new(object), metadata, Utc::now())),
            Err(source) => {
                let transient = source.is_transient();
                let err = StoreError::Load {
                    identity: identity.clone(),
                    source,
                };
                if transient {
                    LoadAttempt::Transient(err)
                } else {
                    LoadAttempt::Invalid(err)
                }
            }
        }
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Seed the cache with an already-parsed object, stamped with the
    /// resource's current metadata.
    pub fn put(&self, name: &str, object: Arc<L::Object>) -> StoreResult<()> {
        let handle = self.resolver.resolve(name)?;
        self.put_resource(handle.as_ref(), object)
    }

    pub fn put_resource(&self, handle: &dyn ResourceHandle, object: Arc<L::Object>) -> StoreResult<()> {
        let identity = handle.identity().clone();
        let slot = self.slot(&identity);
        {
            let _loading = slot.lock()?;
            let current = handle.metadata();
            if current.exists {
                slot.install(Some(Arc::new(CachedEntry::new(object, current, Utc::now()))));
                debug!(identity = %identity, "entry seeded");
                return Ok(());
            }
        }
        self.prune(&identity, slot);
        Err(ResourceError::NotFound {
            name: identity.to_string(),
        }
        .into())
    }

    /// Drop the entry for a resource name; the next read reloads it.
    ///
    /// Returns true if an entry was removed.
    pub fn invalidate(&self, name: &str) -> StoreResult<bool> {
        let identity = self.resolver.resolve(name)?.identity().clone();
        self.invalidate_identity(&identity)
    }

    pub fn invalidate_identity(&self, identity: &ResourceIdentity) -> StoreResult<bool> {
        let Some(slot) = self.slots.get(identity).map(|s| Arc::clone(s.value())) else {
            return Ok(false);
        };
        let removed = {
            let _loading = slot.lock()?;
            slot.install(None).is_some()
        };
        if removed {
            StoreCounters::bump(&self.counters.evictions);
            debug!(identity = %identity, "entry invalidated");
        }
        self.prune(identity, slot);
        Ok(removed)
    }

    /// Drop every entry.
    pub fn clear(&self) -> StoreResult<()> {
        for identity in self.slot_identities() {
            self.invalidate_identity(&identity)?;
        }
        Ok(())
    }

    // ========================================================================
    // COLLECTION
    // ========================================================================

    /// Read every resource the resolver lists.
    ///
    /// Resources that fail to load are logged and skipped. Cached identities
    /// that are no longer listed are evicted. Returns the objects that
    /// loaded, in listing order.
    pub fn load_all(&self) -> StoreResult<Vec<(ResourceIdentity, Arc<L::Object>)>> {
        let names = self.resolver.list()?;
        let mut loaded = Vec::with_capacity(names.len());
        let mut listed = std::collections::HashSet::with_capacity(names.len());

        for name in names {
            let handle = match self.resolver.resolve(&name) {
                Ok(handle) => handle,
                Err(err) => {
                    warn!(resource = %name, error = %err, "skipping unresolvable resource");
                    continue;
                }
            };
            listed.insert(handle.identity().clone());
            match self.read_resource(handle.as_ref()) {
                Ok(read) => loaded.push((read.identity().clone(), read.into_object())),
                Err(err) => {
                    warn!(identity = %handle.identity(), error = %err, "skipping resource");
                }
            }
        }

        for identity in self.slot_identities() {
            if !listed.contains(&identity) {
                self.invalidate_identity(&identity)?;
            }
        }
        Ok(loaded)
    }

    // ========================================================================
    // INTROSPECTION
    // ========================================================================

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.len())
    }

    /// Identities that currently hold an entry, sorted.
    pub fn cached_identities(&self) -> Vec<ResourceIdentity> {
        let mut ids: Vec<_> = self
            .slot_snapshot()
            .into_iter()
            .filter(|(_, slot)| slot.current().is_some())
            .map(|(identity, _)| identity)
            .collect();
        ids.sort();
        ids
    }

    /// The entry currently cached for an identity, without consulting the
    /// resource.
    pub fn peek(&self, identity: &ResourceIdentity) -> Option<Arc<CachedEntry<L::Object>>> {
        let slot = self.slots.get(identity).map(|s| Arc::clone(s.value()))?;
        slot.current()
    }

    pub fn len(&self) -> usize {
        self.slot_snapshot()
            .iter()
            .filter(|(_, slot)| slot.current().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ========================================================================
    // SLOTS
    // ========================================================================

    fn slot(&self, identity: &ResourceIdentity) -> Arc<Slot<L::Object>> {
        if let Some(slot) = self.slots.get(identity) {
            return Arc::clone(slot.value());
        }
        Arc::clone(
            self.slots
                .entry(identity.clone())
                .or_insert_with(|| Arc::new(Slot::new()))
                .value(),
        )
    }

    fn slot_identities(&self) -> Vec<ResourceIdentity> {
        self.slots.iter().map(|s| s.key().clone()).collect()
    }

    /// Slots cloned out of the map, so no shard guard outlives the call.
    fn slot_snapshot(&self) -> Vec<(ResourceIdentity, Arc<Slot<L::Object>>)> {
        self.slots
            .iter()
            .map(|s| (s.key().clone(), Arc::clone(s.value())))
            .collect()
    }

    /// Remove an empty slot nobody else holds.
    ///
    /// A caller holding a clone keeps the strong count above two (map plus
    /// ours), and new clones can only be taken through the map, whose shard
    /// is locked for the duration of `remove_if`.
    fn prune(&self, identity: &ResourceIdentity, slot: Arc<Slot<L::Object>>) {
        self.slots.remove_if(identity, |_, held| {
            Arc::ptr_eq(held, &slot) && Arc::strong_count(held) == 2 && held.is_vacant()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use trustcache_core::{FnLoader, LoadError};

    use crate::resource::MemoryResolver;

    fn text_loader(
    ) -> FnLoader<String, impl Fn(&mut dyn Read) -> Result<String, LoadError> + Send + Sync + 'static>
    {
        FnLoader::new(ObjectKind::Crl, |stream: &mut dyn Read| {
            let mut text = String::new();
            stream.read_to_string(&mut text)?;
            if text.starts_with("bad") {
                return Err(LoadError::malformed("bad content"));
            }
            Ok(text)
        })
    }

    fn store() -> (Arc<MemoryResolver>, ResourceStore<impl ObjectLoader<Object = String>>) {
        let resolver = Arc::new(MemoryResolver::new());
        let store = ResourceStore::new(text_loader(), resolver.clone() as Arc<dyn ResourceResolver>);
        (resolver, store)
    }

    #[test]
    fn test_hit_returns_same_object() {
        let (resolver, store) = store();
        resolver.insert("a", b"one".to_vec());
        let first = store.read("a").unwrap();
        let second = store.read("a").unwrap();
        assert_eq!(first.outcome(), LoadOutcome::Loaded);
        assert_eq!(second.outcome(), LoadOutcome::Hit);
        assert!(Arc::ptr_eq(first.object(), second.object()));
        assert_eq!(resolver.resource("a").unwrap().open_count(), 1);
    }

    #[test]
    fn test_unknown_name_is_not_found_and_not_cached() {
        let (_resolver, store) = store();
        let err = store.get("missing").unwrap_err();
        assert!(err.is_not_found());
        assert!(store.is_empty());
        assert!(store.slots.is_empty());
        assert!(store.get_or_null("missing").unwrap().is_none());
    }

    #[test]
    fn test_absent_resource_is_not_found() {
        let (resolver, store) = store();
        resolver.insert("a", b"one".to_vec()).delete();
        assert!(store.get("a").unwrap_err().is_not_found());
        assert!(store.slots.is_empty());
    }

    #[test]
    fn test_change_reloads() {
        let (resolver, store) = store();
        let res = resolver.insert("a", b"one".to_vec());
        let first = store.get("a").unwrap();
        res.set_content(b"two".to_vec());
        let read = store.read("a").unwrap();
        assert_eq!(read.outcome(), LoadOutcome::Reloaded);
        assert_eq!(read.object().as_str(), "two");
        assert!(!Arc::ptr_eq(&first, read.object()));
    }

    #[test]
    fn test_mtime_only_change_reloads() {
        let (resolver, store) = store();
        let res = resolver.insert("a", b"one".to_vec());
        let first = store.get("a").unwrap();
        res.touch_at(res.last_modified() + chrono::Duration::seconds(30));
        let read = store.read("a").unwrap();
        assert_eq!(read.outcome(), LoadOutcome::Reloaded);
        assert_eq!(read.object().as_str(), "one");
        assert!(!Arc::ptr_eq(&first, read.object()));
        assert_eq!(res.open_count(), 2);
    }

    #[test]
    fn test_restored_older_content_reloads() {
        let (resolver, store) = store();
        let res = resolver.insert("a", b"current".to_vec());
        let newest = res.last_modified();
        store.get("a").unwrap();
        res.set_content_at(b"restored".to_vec(), newest - chrono::Duration::days(1));
        let read = store.read("a").unwrap();
        assert_eq!(read.outcome(), LoadOutcome::Reloaded);
        assert_eq!(read.object().as_str(), "restored");
        assert_eq!(
            read.source_metadata().last_modified,
            Some(newest - chrono::Duration::days(1))
        );
    }

    #[test]
    fn test_transient_failure_serves_previous_entry() {
        let (resolver, store) = store();
        let res = resolver.insert("a", b"one".to_vec());
        let first = store.get("a").unwrap();
        res.set_content(b"two".to_vec());
        res.fail_next_opens(1);
        let read = store.read("a").unwrap();
        assert_eq!(read.outcome(), LoadOutcome::StaleFallback);
        assert!(Arc::ptr_eq(&first, read.object()));
        assert_eq!(store.get("a").unwrap().as_str(), "two");
        let stats = store.stats();
        assert_eq!(stats.stale_fallbacks, 1);
        assert_eq!(stats.reloads, 1);
    }

    #[test]
    fn test_interrupted_read_serves_previous_entry() {
        let (resolver, store) = store();
        let res = resolver.insert("a", b"one".to_vec());
        store.get("a").unwrap();
        res.set_content(b"two".to_vec());
        res.fail_next_reads(1);
        assert!(store.read("a").unwrap().outcome().is_stale());
    }

    #[test]
    fn test_invalid_content_evicts() {
        let (resolver, store) = store();
        let res = resolver.insert("a", b"one".to_vec());
        store.get("a").unwrap();
        res.set_content(b"bad".to_vec());
        let err = store.get("a").unwrap_err();
        assert!(err.is_malformed());
        assert!(store.peek(&ResourceIdentity::memory("a")).is_none());
        res.set_content(b"three".to_vec());
        assert_eq!(store.read("a").unwrap().outcome(), LoadOutcome::Loaded);
    }

    #[test]
    fn test_non_utf8_content_evicts() {
        let (resolver, store) = store();
        let res = resolver.insert("a", b"v1".to_vec());
        store.get("a").unwrap();
        res.set_content(vec![0xff, 0xfe, 0x00, 0x41]);
        for _ in 0..3 {
            let err = store.read("a").unwrap_err();
            assert!(err.is_malformed());
            assert!(!err.is_transient());
        }
        assert!(store.peek(&ResourceIdentity::memory("a")).is_none());
        assert_eq!(store.stats().stale_fallbacks, 0);
    }

    #[test]
    fn test_failed_first_load_caches_nothing() {
        let (resolver, store) = store();
        resolver.insert("a", b"bad".to_vec());
        assert!(store.get("a").unwrap_err().is_malformed());
        assert!(store.is_empty());
        assert_eq!(store.stats().load_failures, 1);
    }

    #[test]
    fn test_deleted_resource_is_gone_then_not_found() {
        let (resolver, store) = store();
        let res = resolver.insert("a", b"one".to_vec());
        store.get("a").unwrap();
        res.delete();
        assert!(store.get("a").unwrap_err().is_gone());
        assert!(store.get("a").unwrap_err().is_not_found());
        assert!(store.is_empty());
    }

    #[test]
    fn test_put_seeds_entry() {
        let (resolver, store) = store();
        resolver.insert("a", b"on disk".to_vec());
        store.put("a", Arc::new("seeded".to_string())).unwrap();
        let read = store.read("a").unwrap();
        assert_eq!(read.outcome(), LoadOutcome::Hit);
        assert_eq!(read.object().as_str(), "seeded");
        assert_eq!(resolver.resource("a").unwrap().open_count(), 0);
    }

    #[test]
    fn test_put_on_absent_resource_is_not_found() {
        let (_resolver, store) = store();
        assert!(store.put("a", Arc::new("x".to_string())).unwrap_err().is_not_found());
    }

    #[test]
    fn test_invalidate_forces_reload() {
        let (resolver, store) = store();
        let res = resolver.insert("a", b"one".to_vec());
        store.get("a").unwrap();
        assert!(store.invalidate("a").unwrap());
        assert!(!store.invalidate("a").unwrap());
        assert_eq!(store.read("a").unwrap().outcome(), LoadOutcome::Loaded);
        assert_eq!(res.open_count(), 2);
    }

    #[test]
    fn test_clear_and_introspection() {
        let (resolver, store) = store();
        resolver.insert("b", b"two".to_vec());
        resolver.insert("a", b"one".to_vec());
        store.get("a").unwrap();
        store.get("b").unwrap();
        assert_eq!(
            store.cached_identities(),
            vec![ResourceIdentity::memory("a"), ResourceIdentity::memory("b")]
        );
        assert_eq!(store.len(), 2);
        store.clear().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_all_skips_failures_and_evicts_unlisted() {
        let (resolver, store) = store();
        resolver.insert("a", b"one".to_vec());
        resolver.insert("b", b"bad".to_vec());
        let c = resolver.insert("c", b"three".to_vec());
        let loaded = store.load_all().unwrap();
        let names: Vec<_> = loaded.iter().map(|(id, _)| id.location().to_string()).collect();
        assert_eq!(names, vec!["a", "c"]);

        c.delete();
        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(store.cached_identities(), vec![ResourceIdentity::memory("a")]);
    }

    proptest::proptest! {
        #[test]
        fn prop_reads_follow_every_update(
            updates in proptest::collection::vec("[c-z][a-z]{0,11}", 1..10)
        ) {
            let (resolver, store) = store();
            let res = resolver.insert("a", b"seed".to_vec());
            for content in &updates {
                res.set_content(content.clone().into_bytes());
                let got = store.get("a").unwrap();
                proptest::prop_assert_eq!(got.as_str(), content.as_str());
                proptest::prop_assert_eq!(store.read("a").unwrap().outcome(), LoadOutcome::Hit);
            }
            proptest::prop_assert_eq!(res.open_count(), updates.len());
        }
    }
}
