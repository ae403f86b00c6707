//! Object loader plug-in contract.

use crate::{LoadError, ObjectKind};
use std::fmt;
use std::io::Read;

/// Turns a byte stream into a parsed security object.
///
/// Loaders are pure with respect to the store: they either return a complete
/// object or fail, and never leave partial state behind. One implementation
/// exists per object kind; the store is generic over all of them.
pub trait ObjectLoader: Send + Sync + 'static {
    /// The parsed object type.
    type Object: Send + Sync + 'static;

    /// The kind of object this loader produces.
    fn kind(&self) -> ObjectKind;

    /// Parse an object from the stream.
    ///
    /// # Errors
    ///
    /// [`LoadError::Malformed`] or [`LoadError::UnsupportedEncoding`] for
    /// invalid content, [`LoadError::Read`] if the stream fails mid-read.
    fn load(&self, stream: &mut dyn Read) -> Result<Self::Object, LoadError>;
}

/// Adapts a closure into an [`ObjectLoader`].
pub struct FnLoader<T, F> {
    kind: ObjectKind,
    load_fn: F,
    _object: std::marker::PhantomData<fn() -> T>,
}

impl<T, F> FnLoader<T, F>
where
    T: Send + Sync + 'static,
    F: Fn(&mut dyn Read) -> Result<T, LoadError> + Send + Sync + 'static,
{
    pub fn new(kind: ObjectKind, load_fn: F) -> Self {
        Self {
            kind,
            load_fn,
            _object: std::marker::PhantomData,
        }
    }
}

impl<T, F> ObjectLoader for FnLoader<T, F>
where
    T: Send + Sync + 'static,
    F: Fn(&mut dyn Read) -> Result<T, LoadError> + Send + Sync + 'static,
{
    type Object = T;

    fn kind(&self) -> ObjectKind {
        self.kind
    }

    fn load(&self, stream: &mut dyn Read) -> Result<T, LoadError> {
        (self.load_fn)(stream)
    }
}

impl<T, F> fmt::Debug for FnLoader<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnLoader").field("kind", &self.kind).finish()
    }
}
