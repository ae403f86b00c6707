//! In-process resources.
//!
//! Content, modification time and existence are set explicitly, which makes
//! these the resource of choice for exercising staleness and failure paths
//! deterministically.

use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use trustcache_core::{
    ResourceError, ResourceHandle, ResourceIdentity, ResourceMetadata, ResourceResolver,
    ResourceStream, Timestamp,
};

#[derive(Debug)]
struct MemoryState {
    content: Option<Vec<u8>>,
    last_modified: Timestamp,
    failing_opens: usize,
    failing_reads: usize,
}

/// A named byte buffer that behaves like a file.
#[derive(Debug)]
pub struct MemoryResource {
    identity: ResourceIdentity,
    state: Mutex<MemoryState>,
    opens: AtomicUsize,
}

impl MemoryResource {
    /// Create an existing resource with the given content.
    pub fn new(name: &str, content: impl Into<Vec<u8>>) -> Self {
        Self::with_state(name, Some(content.into()))
    }

    /// Create a resource that does not exist yet.
    pub fn absent(name: &str) -> Self {
        Self::with_state(name, None)
    }

    fn with_state(name: &str, content: Option<Vec<u8>>) -> Self {
        Self {
            identity: ResourceIdentity::memory(name),
            state: Mutex::new(MemoryState {
                content,
                last_modified: Utc::now(),
                failing_opens: 0,
                failing_reads: 0,
            }),
            opens: AtomicUsize::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // State is plain data; a panic mid-update cannot leave it torn.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the content and advance the modification time.
    pub fn set_content(&self, content: impl Into<Vec<u8>>) {
        let mut state = self.state();
        let now = Utc::now();
        state.last_modified = if now > state.last_modified {
            now
        } else {
            state.last_modified + Duration::milliseconds(1)
        };
        state.content = Some(content.into());
    }

    /// Replace the content with an explicit modification time.
    pub fn set_content_at(&self, content: impl Into<Vec<u8>>, last_modified: Timestamp) {
        let mut state = self.state();
        state.last_modified = last_modified;
        state.content = Some(content.into());
    }

    /// Change only the modification time.
    pub fn touch_at(&self, last_modified: Timestamp) {
        self.state().last_modified = last_modified;
    }

    /// Make the resource disappear.
    pub fn delete(&self) {
        self.state().content = None;
    }

    /// Make the next `count` calls to `open_stream` fail.
    pub fn fail_next_opens(&self, count: usize) {
        self.state().failing_opens = count;
    }

    /// Make the streams returned by the next `count` opens fail on first read.
    pub fn fail_next_reads(&self, count: usize) {
        self.state().failing_reads = count;
    }

    /// Number of successful `open_stream` calls so far.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn last_modified(&self) -> Timestamp {
        self.state().last_modified
    }
}

impl ResourceHandle for MemoryResource {
    fn identity(&self) -> &ResourceIdentity {
        &self.identity
    }

    fn metadata(&self) -> ResourceMetadata {
        let state = self.state();
        match &state.content {
            Some(bytes) => {
                ResourceMetadata::present(Some(state.last_modified), Some(bytes.len() as u64))
            }
            None => ResourceMetadata::absent(),
        }
    }

    fn open_stream(&self) -> Result<ResourceStream, ResourceError> {
        let mut state = self.state();
        if state.failing_opens > 0 {
            state.failing_opens -= 1;
            return Err(ResourceError::Unavailable {
                identity: self.identity.clone(),
                reason: "simulated open failure".to_string(),
            });
        }
        let Some(bytes) = state.content.clone() else {
            return Err(ResourceError::Unavailable {
                identity: self.identity.clone(),
                reason: "resource does not exist".to_string(),
            });
        };
        self.opens.fetch_add(1, Ordering::SeqCst);
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Ok(Box::new(FailingReader));
        }
        Ok(Box::new(Cursor::new(bytes)))
    }
}

struct FailingReader;

impl Read for FailingReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "simulated read failure"))
    }
}

/// Resolver over a set of named [`MemoryResource`]s.
///
/// Names may be given with or without the `memory:` prefix.
#[derive(Debug, Default)]
pub struct MemoryResolver {
    resources: DashMap<String, Arc<MemoryResource>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a resource with the given content.
    pub fn insert(&self, name: &str, content: impl Into<Vec<u8>>) -> Arc<MemoryResource> {
        let resource = Arc::new(MemoryResource::new(strip(name), content));
        self.resources
            .insert(strip(name).to_string(), Arc::clone(&resource));
        resource
    }

    /// The registered resource with this name, if any.
    pub fn resource(&self, name: &str) -> Option<Arc<MemoryResource>> {
        self.resources.get(strip(name)).map(|r| Arc::clone(r.value()))
    }

    /// Unregister a resource; later lookups of the name are not found.
    pub fn remove(&self, name: &str) -> Option<Arc<MemoryResource>> {
        self.resources.remove(strip(name)).map(|(_, r)| r)
    }
}

fn strip(name: &str) -> &str {
    let name = name.trim();
    name.strip_prefix("memory:").unwrap_or(name)
}

impl ResourceResolver for MemoryResolver {
    fn resolve(&self, name: &str) -> Result<Arc<dyn ResourceHandle>, ResourceError> {
        match self.resource(name) {
            Some(resource) => Ok(resource),
            None => Err(ResourceError::NotFound {
                name: name.to_string(),
            }),
        }
    }

    fn list(&self) -> Result<Vec<String>, ResourceError> {
        let mut names: Vec<String> = self
            .resources
            .iter()
            .filter(|r| r.value().metadata().exists)
            .map(|r| r.key().clone())
            .collect();
        names.sort();
        Ok(names)
    }
}
