//! Resource handle and resolver traits.
//!
//! A handle names one byte source and reports fresh observations of it on
//! every call. Caching is the store's job, never the handle's.

use crate::{ResourceError, ResourceIdentity, ResourceMetadata};
use std::io::Read;
use std::sync::Arc;

/// Readable byte stream returned by [`ResourceHandle::open_stream`].
pub type ResourceStream = Box<dyn Read + Send>;

/// A named external byte source.
pub trait ResourceHandle: Send + Sync {
    /// Canonical identity of this resource.
    fn identity(&self) -> &ResourceIdentity;

    /// Current metadata. Never fails: an absent resource reports
    /// `exists == false`.
    fn metadata(&self) -> ResourceMetadata;

    /// Open a fresh stream over the resource's current bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Unavailable`] when the bytes cannot be read
    /// this attempt.
    fn open_stream(&self) -> Result<ResourceStream, ResourceError>;
}

/// Turns resource names into handles.
pub trait ResourceResolver: Send + Sync {
    /// Resolve a name to a handle.
    ///
    /// A handle may be returned for a resource that does not exist yet; the
    /// store tells "never existed" from "went away" via metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::NotFound`] when the name cannot denote any
    /// resource of this resolver.
    fn resolve(&self, name: &str) -> Result<Arc<dyn ResourceHandle>, ResourceError>;

    /// Names of the resources currently available under this resolver.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Unavailable`] if the listing itself fails.
    fn list(&self) -> Result<Vec<String>, ResourceError>;
}
