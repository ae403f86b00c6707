//! Canonical resource identities used as cache keys.
//!
//! A `ResourceIdentity` is the only thing the cache keys on, so two spellings
//! of the same byte source (`file:/etc/a/../b.pem`, `/etc/b.pem`) must collapse
//! to one value. Normalization is purely lexical: symlinks are not resolved and
//! the file system is never touched.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};

/// Scheme used for file-system resources.
pub const FILE_SCHEME: &str = "file";

/// Scheme used for in-process resources.
pub const MEMORY_SCHEME: &str = "memory";

/// Immutable, comparable token naming one byte source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceIdentity {
    scheme: String,
    location: String,
}

impl ResourceIdentity {
    /// Parse a resource name into its canonical identity.
    ///
    /// Names without a scheme are treated as file paths. Single-letter schemes
    /// are treated as drive letters, not schemes.
    pub fn parse(name: &str) -> Self {
        let name = name.trim();
        match split_scheme(name) {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case(FILE_SCHEME) => {
                Self::file(&strip_file_authority(rest))
            }
            Some((scheme, rest)) => Self {
                scheme: scheme.to_ascii_lowercase(),
                location: rest.to_string(),
            },
            None => Self::file(name),
        }
    }

    /// Identity for a file-system path.
    pub fn from_path(path: &Path) -> Self {
        Self {
            scheme: FILE_SCHEME.to_string(),
            location: normalize_path(path),
        }
    }

    /// Identity for a named in-memory resource.
    pub fn memory(name: &str) -> Self {
        Self {
            scheme: MEMORY_SCHEME.to_string(),
            location: name.trim().to_string(),
        }
    }

    fn file(path: &str) -> Self {
        Self::from_path(Path::new(path))
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Returns true if this identity names a file-system resource.
    pub fn is_file(&self) -> bool {
        self.scheme == FILE_SCHEME
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme, self.location)
    }
}

impl From<&Path> for ResourceIdentity {
    fn from(path: &Path) -> Self {
        Self::from_path(path)
    }
}

fn split_scheme(name: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = name.split_once(':')?;
    let valid = scheme.len() > 1
        && scheme
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.');
    valid.then_some((scheme, rest))
}

fn strip_file_authority(rest: &str) -> String {
    if let Some(path) = rest.strip_prefix("//localhost/") {
        format!("/{path}")
    } else if let Some(path) = rest.strip_prefix("//") {
        if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        }
    } else {
        rest.to_string()
    }
}

/// Lexically normalize a path: drop `.`, resolve `..`, collapse separators.
fn normalize_path(path: &Path) -> String {
    let mut absolute = false;
    let mut parts: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => {
                parts.push(prefix.as_os_str().to_string_lossy().into_owned());
            }
            Component::RootDir => absolute = true,
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.last().is_some_and(|p| p != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..".to_string());
                }
            }
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}
