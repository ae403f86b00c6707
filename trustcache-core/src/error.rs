//! Error types for trustcache operations

use crate::{ObjectKind, ResourceIdentity};
use std::path::PathBuf;
use thiserror::Error;

/// Resource resolution and access errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResourceError {
    /// The name does not denote any resource. Never cached.
    #[error("Resource not found: {name}")]
    NotFound { name: String },

    /// The resource exists but could not be read this time.
    #[error("Resource unavailable: {identity}: {reason}")]
    Unavailable {
        identity: ResourceIdentity,
        reason: String,
    },
}

/// Object loader errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("Malformed object: {reason}")]
    Malformed { reason: String },

    #[error("Unsupported encoding: {detail}")]
    UnsupportedEncoding { detail: String },

    /// The stream failed while the loader was consuming it.
    #[error("Read failed: {reason}")]
    Read { reason: String },
}

impl LoadError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    pub fn unsupported(detail: impl Into<String>) -> Self {
        Self::UnsupportedEncoding {
            detail: detail.into(),
        }
    }

    /// Returns true if retrying may succeed without the content changing.
    pub fn is_transient(&self) -> bool {
        matches!(self, LoadError::Read { .. })
    }
}

/// `InvalidData` means the bytes arrived and were rejected (for example
/// non-UTF-8 text), so it is not a read failure.
impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::InvalidData => LoadError::UnsupportedEncoding {
                detail: err.to_string(),
            },
            _ => LoadError::Read {
                reason: err.to_string(),
            },
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or TRUSTCACHE_CONFIG)")]
    MissingConfigPath,

    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Loader kind mismatch: store configured for {expected}, loader produces {got}")]
    KindMismatch { expected: ObjectKind, got: ObjectKind },

    #[error("Store for {kind} at {root} is already registered with a different object type")]
    TypeMismatch { kind: ObjectKind, root: PathBuf },
}

/// Store-level error. Every failure surfaced by a store is one of these,
/// carrying the original cause.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Failed to load {identity}: {source}")]
    Load {
        identity: ResourceIdentity,
        #[source]
        source: LoadError,
    },

    /// A resource that previously produced an object no longer exists.
    #[error("Resource gone: {identity}")]
    Gone { identity: ResourceIdentity },

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Resource(ResourceError::NotFound { .. }))
    }

    pub fn is_gone(&self) -> bool {
        matches!(self, StoreError::Gone { .. })
    }

    /// Returns true if the resource content is known to be invalid.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            StoreError::Load {
                source: LoadError::Malformed { .. } | LoadError::UnsupportedEncoding { .. },
                ..
            }
        )
    }

    /// Returns true if the failure may clear up on its own.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Resource(ResourceError::Unavailable { .. }) => true,
            StoreError::Load { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// TESTS
// =============================================================================
