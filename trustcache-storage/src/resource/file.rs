//! File-system resources.

use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use trustcache_core::{
    ResourceError, ResourceHandle, ResourceIdentity, ResourceMetadata, ResourceResolver,
    ResourceStream, StoreConfig,
};

/// A single file on disk.
#[derive(Debug, Clone)]
pub struct FileResource {
    identity: ResourceIdentity,
    path: PathBuf,
}

impl FileResource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let identity = ResourceIdentity::from_path(path.as_ref());
        let path = PathBuf::from(identity.location());
        Self { identity, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResourceHandle for FileResource {
    fn identity(&self) -> &ResourceIdentity {
        &self.identity
    }

    fn metadata(&self) -> ResourceMetadata {
        match fs::metadata(&self.path) {
            Ok(meta) if meta.is_file() => ResourceMetadata::present(
                meta.modified().ok().map(DateTime::<Utc>::from),
                Some(meta.len()),
            ),
            Ok(_) => ResourceMetadata::absent(),
            Err(e) if e.kind() == ErrorKind::NotFound => ResourceMetadata::absent(),
            // Exists as far as we can tell, but nothing can vouch for it being
            // unchanged; the store will attempt a read and report the failure.
            Err(_) => ResourceMetadata::present(None, None),
        }
    }

    fn open_stream(&self) -> Result<ResourceStream, ResourceError> {
        let file = File::open(&self.path).map_err(|e| ResourceError::Unavailable {
            identity: self.identity.clone(),
            reason: e.to_string(),
        })?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Resolves names against a root directory.
///
/// Accepts names relative to the root, absolute paths and `file:` URLs.
/// Names with any other scheme, or that lead outside the root, are not found.
#[derive(Debug, Clone)]
pub struct FileResolver {
    root: PathBuf,
    config: Option<StoreConfig>,
}

impl FileResolver {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: PathBuf::from(ResourceIdentity::from_path(root.as_ref()).location()),
            config: None,
        }
    }

    /// Resolver for a store config; `list` honours its extension filter.
    pub fn for_config(config: &StoreConfig) -> Self {
        Self {
            root: config.root.clone(),
            config: Some(config.clone()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn accepts(&self, file_name: &str) -> bool {
        self.config.as_ref().map_or(true, |c| c.accepts(file_name))
    }
}

impl ResourceResolver for FileResolver {
    fn resolve(&self, name: &str) -> Result<Arc<dyn ResourceHandle>, ResourceError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ResourceError::NotFound {
                name: name.to_string(),
            });
        }
        let identity = ResourceIdentity::parse(trimmed);
        if !identity.is_file() {
            return Err(ResourceError::NotFound {
                name: name.to_string(),
            });
        }
        let path = Path::new(identity.location());
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let resource = FileResource::new(path);
        if !resource.path().starts_with(&self.root) {
            return Err(ResourceError::NotFound {
                name: name.to_string(),
            });
        }
        Ok(Arc::new(resource))
    }

    fn list(&self) -> Result<Vec<String>, ResourceError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ResourceError::Unavailable {
                    identity: ResourceIdentity::from_path(&self.root),
                    reason: e.to_string(),
                })
            }
        };

        let mut names = Vec::new();
        for entry in entries.flatten() {
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.accepts(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}
