//! End-to-end behaviour of the store over files and in-memory resources.

use std::fs;
use std::io::Read;
use std::sync::atomic::Ordering;
use std::sync::{mpsc, Arc, Barrier, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use trustcache_core::{
    FnLoader, LoadError, ObjectKind, ResourceIdentity, ResourceResolver, StoreConfig,
};
use trustcache_storage::{
    CrlLoader, FileResolver, LoadOutcome, MemoryResolver, ResourceCrl, ResourceStore,
    StoreRegistry,
};
use trustcache_test_utils::fixtures::{write_with_mtime, TestCa};
use trustcache_test_utils::loaders::{CountingLoader, TextLoader};

fn crl_store_over(dir: &std::path::Path) -> ResourceStore<CountingLoader<CrlLoader>> {
    ResourceStore::new(
        CountingLoader::new(CrlLoader::new()),
        Arc::new(FileResolver::new(dir)),
    )
}

// ============================================================================
// HIT IDEMPOTENCE AND RELOAD ON CHANGE
// ============================================================================

#[test]
fn test_unchanged_file_is_parsed_once() {
    let dir = tempfile::tempdir().unwrap();
    let ca = TestCa::new("Hit CA");
    write_with_mtime(&dir.path().join("ca.r0"), ca.crl_pem(1, &[5]), 1_700_000_000);

    let store = crl_store_over(dir.path());
    let first = store.get("ca.r0").unwrap();
    for _ in 0..5 {
        let again = store.get("ca.r0").unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }
    assert_eq!(store.loader().loads(), 1);
    let stats = store.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 5);
}

#[test]
fn test_changed_file_is_reloaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ca.r0");
    let ca = TestCa::new("Reload CA");
    write_with_mtime(&path, ca.crl_pem(1, &[]), 1_700_000_000);

    let store = crl_store_over(dir.path());
    assert!(!store.get("ca.r0").unwrap().is_revoked("2a"));

    write_with_mtime(&path, ca.crl_pem(2, &[42]), 1_700_000_100);
    let read = store.read("ca.r0").unwrap();
    assert_eq!(read.outcome(), LoadOutcome::Reloaded);
    assert!(read.object().is_revoked("2a"));
    assert_eq!(read.object().crl_number.as_deref(), Some("2"));
}

#[test]
fn test_mtime_moving_backwards_is_a_change() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ca.r0");
    let ca = TestCa::new("Backup CA");
    write_with_mtime(&path, ca.crl_pem(5, &[]), 1_700_000_500);

    let store = crl_store_over(dir.path());
    store.get("ca.r0").unwrap();
    write_with_mtime(&path, ca.crl_pem(4, &[7]), 1_700_000_000);
    let read = store.read("ca.r0").unwrap();
    assert_eq!(read.outcome(), LoadOutcome::Reloaded);
    assert_eq!(read.object().crl_number.as_deref(), Some("4"));
}

#[test]
fn test_absolute_and_relative_names_share_an_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ca.r0");
    write_with_mtime(&path, TestCa::new("Name CA").crl_pem(1, &[]), 1_700_000_000);

    let store = crl_store_over(dir.path());
    let a = store.get("ca.r0").unwrap();
    let b = store.get(&path.to_string_lossy()).unwrap();
    let c = store
        .get(&format!("file://{}", dir.path().join("./ca.r0").display()))
        .unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a, &c));
    assert_eq!(store.len(), 1);
}

// ============================================================================
// FAILURE POLICY
// ============================================================================

#[test]
fn test_transient_failure_keeps_previous_entry() {
    let resolver = Arc::new(MemoryResolver::new());
    let ca = TestCa::new("Flaky CA");
    let res = resolver.insert("ca.r0", ca.crl_pem(1, &[]));
    let store = ResourceStore::new(CrlLoader::new(), resolver.clone() as Arc<dyn ResourceResolver>);

    let original = store.get("ca.r0").unwrap();
    res.set_content(ca.crl_pem(2, &[99]));
    res.fail_next_opens(1);

    let read = store.read("ca.r0").unwrap();
    assert_eq!(read.outcome(), LoadOutcome::StaleFallback);
    assert!(Arc::ptr_eq(read.object(), &original));

    res.fail_next_reads(1);
    assert!(store.read("ca.r0").unwrap().outcome().is_stale());

    let recovered = store.get("ca.r0").unwrap();
    assert!(recovered.is_revoked("63"));
    assert_eq!(store.stats().stale_fallbacks, 2);
}

#[test]
fn test_transient_failure_without_entry_is_an_error() {
    let resolver = Arc::new(MemoryResolver::new());
    let res = resolver.insert("ca.r0", TestCa::new("Cold CA").crl_pem(1, &[]));
    res.fail_next_opens(1);
    let store = ResourceStore::new(CrlLoader::new(), resolver.clone() as Arc<dyn ResourceResolver>);

    let err = store.get("ca.r0").unwrap_err();
    assert!(err.is_transient());
    assert!(store.is_empty());
    assert!(store.get("ca.r0").is_ok());
}

#[test]
fn test_corrupted_file_evicts_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ca.r0");
    let ca = TestCa::new("Corrupt CA");
    write_with_mtime(&path, ca.crl_pem(1, &[]), 1_700_000_000);

    let store = crl_store_over(dir.path());
    store.get("ca.r0").unwrap();

    let mut der = ca.crl_der(2, &[]);
    der.truncate(20);
    write_with_mtime(&path, &der, 1_700_000_100);
    assert!(store.get("ca.r0").unwrap_err().is_malformed());
    assert!(store.cached_identities().is_empty());

    write_with_mtime(&path, "not a crl", 1_700_000_200);
    let err = store.get("ca.r0").unwrap_err();
    assert!(err.is_malformed());
    assert!(!err.is_transient());
}

// ============================================================================
// SINGLE-FLIGHT
// ============================================================================

#[test]
fn test_concurrent_misses_load_once() {
    const THREADS: usize = 8;
    let resolver = Arc::new(MemoryResolver::new());
    resolver.insert("ca.r0", TestCa::new("Busy CA").crl_pem(1, &[1, 2, 3]));

    let loader = CountingLoader::new(CrlLoader::new()).with_delay(Duration::from_millis(50));
    let loads = loader.counter();
    let store = Arc::new(ResourceStore::new(loader, resolver as Arc<dyn ResourceResolver>));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.get("ca.r0").unwrap()
            })
        })
        .collect();
    let objects: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert!(objects.iter().all(|o| Arc::ptr_eq(o, &objects[0])));
    let stats = store.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, (THREADS - 1) as u64);
}

#[test]
fn test_concurrent_reads_after_change_reload_once() {
    const THREADS: usize = 8;
    let resolver = Arc::new(MemoryResolver::new());
    let ca = TestCa::new("Rotating CA");
    let res = resolver.insert("ca.r0", ca.crl_pem(1, &[]));

    let loader = CountingLoader::new(CrlLoader::new()).with_delay(Duration::from_millis(50));
    let loads = loader.counter();
    let store = Arc::new(ResourceStore::new(loader, resolver as Arc<dyn ResourceResolver>));
    let original = store.get("ca.r0").unwrap();

    res.set_content(ca.crl_pem(2, &[77]));
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.get("ca.r0").unwrap()
            })
        })
        .collect();
    let objects: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(loads.load(Ordering::SeqCst), 2);
    assert!(objects.iter().all(|o| Arc::ptr_eq(o, &objects[0])));
    assert!(!Arc::ptr_eq(&objects[0], &original));
    assert!(objects[0].is_revoked("4d"));
    let stats = store.stats();
    assert_eq!(stats.reloads, 1);
    assert_eq!(stats.hits, (THREADS - 1) as u64);
}

#[test]
fn test_slow_load_does_not_block_other_identities() {
    let resolver = Arc::new(MemoryResolver::new());
    resolver.insert("slow", "slow");
    resolver.insert("fast", "fast");

    let gate = Arc::new((Mutex::new(false), Condvar::new()));
    let (entered_tx, entered_rx) = mpsc::channel();
    let entered_tx = Mutex::new(entered_tx);
    let loader_gate = Arc::clone(&gate);
    let loader = FnLoader::new(ObjectKind::Crl, move |s: &mut dyn Read| {
        let mut text = String::new();
        s.read_to_string(&mut text)?;
        if text == "slow" {
            if let Ok(tx) = entered_tx.lock() {
                let _ = tx.send(());
            }
            let (open, cvar) = &*loader_gate;
            let mut opened = open.lock().unwrap();
            while !*opened {
                opened = cvar.wait(opened).unwrap();
            }
        }
        Ok::<_, LoadError>(text)
    });
    let store = Arc::new(ResourceStore::new(
        loader,
        resolver.clone() as Arc<dyn ResourceResolver>,
    ));

    let slow_store = Arc::clone(&store);
    let slow = thread::spawn(move || slow_store.get("slow").unwrap());
    entered_rx.recv_timeout(Duration::from_secs(10)).unwrap();

    assert_eq!(store.get("fast").unwrap().as_str(), "fast");

    // Introspection and first reads of other identities finish while the
    // slow load is still parked.
    let (done_tx, done_rx) = mpsc::channel();
    let side_store = Arc::clone(&store);
    thread::spawn(move || {
        let len = side_store.len();
        let cached = side_store.cached_identities();
        let stats = side_store.stats();
        let slow_entry = side_store.peek(&ResourceIdentity::memory("slow"));
        let _ = format!("{side_store:?}");
        let _ = done_tx.send((len, cached, stats.entry_count, slow_entry.is_none()));
    });
    let (len, cached, entry_count, slow_uncached) =
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(len, 1);
    assert_eq!(cached, vec![ResourceIdentity::memory("fast")]);
    assert_eq!(entry_count, 1);
    assert!(slow_uncached);

    for i in 0..64 {
        resolver.insert(&format!("fast{i}"), format!("fast{i}"));
    }
    let (fresh_tx, fresh_rx) = mpsc::channel();
    let fresh_store = Arc::clone(&store);
    thread::spawn(move || {
        let loaded = (0..64)
            .filter(|i| fresh_store.get(&format!("fast{i}")).is_ok())
            .count();
        let _ = fresh_tx.send(loaded);
    });
    assert_eq!(fresh_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 64);

    let (open, cvar) = &*gate;
    *open.lock().unwrap() = true;
    cvar.notify_all();
    assert_eq!(slow.join().unwrap().as_str(), "slow");
}

// ============================================================================
// REGISTRY
// ============================================================================

#[test]
fn test_registry_shares_and_isolates_stores() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let ca_a = TestCa::new("CA A");
    let ca_b = TestCa::new("CA B");
    write_with_mtime(&dir_a.path().join("ca.r0"), ca_a.crl_pem(1, &[]), 1_700_000_000);
    write_with_mtime(&dir_b.path().join("ca.r0"), ca_b.crl_pem(1, &[]), 1_700_000_000);

    let registry = StoreRegistry::new();
    let config_a = StoreConfig::new(ObjectKind::Crl, dir_a.path());
    let first = registry.crl_store(&config_a).unwrap();
    let second = registry.crl_store(&config_a).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let other = registry
        .crl_store(&StoreConfig::new(ObjectKind::Crl, dir_b.path()))
        .unwrap();
    assert!(!Arc::ptr_eq(&first, &other));

    assert!(first.get("ca.r0").unwrap().issuer.contains("CA A"));
    assert!(other.get("ca.r0").unwrap().issuer.contains("CA B"));
    assert_eq!(second.len(), 1);
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_load_all_reads_matching_files() {
    let dir = tempfile::tempdir().unwrap();
    let ca = TestCa::new("Dir CA");
    write_with_mtime(&dir.path().join("a.r0"), ca.crl_pem(1, &[]), 1_700_000_000);
    write_with_mtime(&dir.path().join("b.r0"), ca.crl_pem(2, &[]), 1_700_000_000);
    write_with_mtime(&dir.path().join("broken.r0"), "garbage", 1_700_000_000);
    write_with_mtime(&dir.path().join("README"), "not a crl", 1_700_000_000);
    fs::create_dir(dir.path().join("sub.r0")).unwrap();

    let registry = StoreRegistry::new();
    let config = StoreConfig::new(ObjectKind::Crl, dir.path()).with_extensions(["r0"]);
    let store = registry.crl_store(&config).unwrap();

    let loaded = store.load_all().unwrap();
    let names: Vec<_> = loaded
        .iter()
        .filter_map(|(id, _)| id.location().rsplit('/').next().map(str::to_string))
        .collect();
    assert_eq!(names, vec!["a.r0", "b.r0"]);
    assert_eq!(store.len(), 2);

    fs::remove_file(dir.path().join("b.r0")).unwrap();
    store.load_all().unwrap();
    assert_eq!(store.len(), 1);
}

// ============================================================================
// SCENARIO
// ============================================================================

#[test]
fn test_crl_lifecycle_through_wrapper() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("1a2b3c4d.r0");
    let ca = TestCa::new("Lifecycle CA");

    let registry = StoreRegistry::new();
    let store = registry
        .crl_store(&StoreConfig::new(ObjectKind::Crl, dir.path()))
        .unwrap();

    // Not there yet: nothing is cached.
    assert!(store.get("1a2b3c4d.r0").unwrap_err().is_not_found());
    assert!(store.is_empty());

    write_with_mtime(&path, ca.crl_pem(1, &[10]), 1_700_000_000);
    let wrapper = ResourceCrl::new(Arc::clone(&store), "1a2b3c4d.r0").unwrap();
    let crl_a = wrapper.crl().unwrap();
    assert!(crl_a.is_revoked("0a"));
    assert!(Arc::ptr_eq(&crl_a, &wrapper.crl().unwrap()));

    write_with_mtime(&path, ca.crl_pem(2, &[10, 11]), 1_700_000_060);
    let crl_b = wrapper.crl().unwrap();
    assert!(crl_b.is_revoked("0b"));
    assert!(!Arc::ptr_eq(&crl_a, &crl_b));

    fs::remove_file(&path).unwrap();
    let err = wrapper.crl().unwrap_err();
    assert!(err.is_gone());
    assert!(wrapper.object_or_null().unwrap().is_none());
    assert!(store
        .peek(&ResourceIdentity::from_path(&path))
        .is_none());
    assert!(store.get("1a2b3c4d.r0").unwrap_err().is_not_found());
}

#[test]
fn test_text_loader_store_reports_outcomes() {
    let resolver = Arc::new(MemoryResolver::new());
    let res = resolver.insert("notes", "v1");
    let store = ResourceStore::new(
        TextLoader::new(ObjectKind::CaCertificate),
        resolver as Arc<dyn ResourceResolver>,
    );
    assert_eq!(store.read("notes").unwrap().outcome(), LoadOutcome::Loaded);
    assert_eq!(store.read("notes").unwrap().outcome(), LoadOutcome::Hit);
    res.set_content("v2");
    assert_eq!(store.read("notes").unwrap().outcome(), LoadOutcome::Reloaded);
    res.set_content("   ");
    assert!(store.read("notes").unwrap_err().is_malformed());
    assert!(store.is_empty());

    res.set_content("v3");
    store.get("notes").unwrap();
    res.set_content(vec![0xffu8, 0xfe, 0x00, 0x41]);
    let err = store.read("notes").unwrap_err();
    assert!(err.is_malformed());
    assert!(store.is_empty());
}
