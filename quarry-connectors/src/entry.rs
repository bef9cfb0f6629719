//! The uniform resource entry shape shared by all connector backends.

use chrono::{DateTime, Utc};
use quarry_core::Acl;

/// Free-form metadata attached to a resource entry.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// One stored resource: value plus metadata, ACL, and optional expiry.
///
/// `metadata` and `acl` are mutated independently of `value` via
/// `set_metadata`/`set_acl` on the client; an entry whose `expires_at`
/// has passed behaves as absent on every read path and is physically
/// purged on the next access.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEntry {
    pub key: String,
    pub value: Vec<u8>,
    pub metadata: Metadata,
    pub acl: Acl,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ResourceEntry {
    pub fn new(key: impl Into<String>, value: Vec<u8>, acl: Acl) -> Self {
        Self {
            key: key.into(),
            value,
            metadata: Metadata::new(),
            acl,
            expires_at: None,
        }
    }

    /// Whether this entry has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now,
            None => false,
        }
    }
}

/// Listing row returned by `list`: key and bookkeeping, no value.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceListing {
    pub key: String,
    pub metadata: Metadata,
    pub acl: Acl,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ResourceListing {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now,
            None => false,
        }
    }
}

/// Merge `updates` into `target`: new keys overwrite, others are
/// retained.
pub fn merge_metadata(target: &mut Metadata, updates: Metadata) {
    for (key, value) in updates {
        target.insert(key, value);
    }
}

// =============================================================================
// TESTS
// =============================================================================
