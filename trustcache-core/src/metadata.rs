//! Point-in-time metadata snapshots of a resource.

use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// Snapshot of a resource's metadata, captured when the resource is consulted.
///
/// Snapshots are values: a later observation is a new snapshot, never an
/// update of an old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceMetadata {
    /// Whether the resource currently exists.
    pub exists: bool,
    /// Last modification time, if the resource reports one.
    pub last_modified: Option<Timestamp>,
    /// Size in bytes, if the resource reports one.
    pub size: Option<u64>,
}

impl ResourceMetadata {
    /// Metadata for a resource that does not exist.
    pub fn absent() -> Self {
        Self {
            exists: false,
            last_modified: None,
            size: None,
        }
    }

    /// Metadata for an existing resource.
    pub fn present(last_modified: Option<Timestamp>, size: Option<u64>) -> Self {
        Self {
            exists: true,
            last_modified,
            size,
        }
    }

    /// Returns true if `current` describes the same resource state as `self`.
    ///
    /// Comparison is exact: a modification time that moved backwards (a file
    /// restored from backup, clock skew) is a change. A snapshot carrying no
    /// modification time can never vouch for an unchanged resource, so it
    /// never matches. Size is only compared when both snapshots report it.
    pub fn matches(&self, current: &ResourceMetadata) -> bool {
        if !self.exists || !current.exists {
            return false;
        }
        let (Some(cached), Some(now)) = (self.last_modified, current.last_modified) else {
            return false;
        };
        if cached != now {
            return false;
        }
        match (self.size, current.size) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
    }

    #[test]
    fn test_identical_snapshots_match() {
        let a = ResourceMetadata::present(Some(at(1_700_000_000)), Some(512));
        assert!(a.matches(&a));
    }

    #[test]
    fn test_newer_mtime_is_a_change() {
        let a = ResourceMetadata::present(Some(at(1_700_000_000)), Some(512));
        let b = ResourceMetadata::present(Some(at(1_700_000_000) + Duration::seconds(1)), Some(512));
        assert!(!a.matches(&b));
    }

    #[test]
    fn test_older_mtime_is_a_change() {
        let a = ResourceMetadata::present(Some(at(1_700_000_000)), Some(512));
        let b = ResourceMetadata::present(Some(at(1_600_000_000)), Some(512));
        assert!(!a.matches(&b));
    }

    #[test]
    fn test_size_change_is_a_change() {
        let a = ResourceMetadata::present(Some(at(1_700_000_000)), Some(512));
        let b = ResourceMetadata::present(Some(at(1_700_000_000)), Some(513));
        assert!(!a.matches(&b));
    }

    #[test]
    fn test_missing_size_compares_mtime_only() {
        let a = ResourceMetadata::present(Some(at(1_700_000_000)), None);
        let b = ResourceMetadata::present(Some(at(1_700_000_000)), Some(513));
        assert!(a.matches(&b));
    }

    #[test]
    fn test_absent_never_matches() {
        let a = ResourceMetadata::present(Some(at(1_700_000_000)), Some(512));
        assert!(!a.matches(&ResourceMetadata::absent()));
        assert!(!ResourceMetadata::absent().matches(&ResourceMetadata::absent()));
    }

    #[test]
    fn test_unknown_mtime_never_matches() {
        let a = ResourceMetadata::present(None, Some(512));
        assert!(!a.matches(&a));
    }

    proptest! {
        #[test]
        fn prop_matches_iff_equal_when_fully_known(
            t1 in 0i64..4_000_000_000,
            t2 in 0i64..4_000_000_000,
            s1 in 0u64..1_000_000,
            s2 in 0u64..1_000_000,
        ) {
            let a = ResourceMetadata::present(Some(at(t1)), Some(s1));
            let b = ResourceMetadata::present(Some(at(t2)), Some(s2));
            prop_assert_eq!(a.matches(&b), a == b);
            prop_assert_eq!(a.matches(&b), b.matches(&a));
        }
    }
}
