//! The requester pattern: a connector binds a candidate into a client.
//!
//! Every operation on a `ResourceClient` follows the same shape: load
//! the target entry, treat it as absent (and physically purge it) if
//! expired, check the candidate against the entry's ACL, then dispatch
//! to the backend. Absence is signaled, never thrown, for the read
//! path; a failed ACL check is an `AccessDenied` error.

use crate::backend::{ResourceBackend, TtlUnit};
use crate::entry::{merge_metadata, Metadata, ResourceEntry, ResourceListing};
use chrono::{Duration as ChronoDuration, Utc};
use quarry_core::{
    AccessCandidate, AccessError, AccessLevel, Acl, ConnectorError, QuarryError, QuarryResult,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A named connector over one backend.
///
/// Selected from a `ConnectorRegistry` by logical name at startup;
/// callers obtain a candidate-bound `ResourceClient` via `requester`.
#[derive(Clone)]
pub struct ResourceConnector {
    name: String,
    backend: Arc<dyn ResourceBackend>,
}

impl ResourceConnector {
    pub fn new(name: impl Into<String>, backend: Arc<dyn ResourceBackend>) -> Self {
        Self {
            name: name.into(),
            backend,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The backend's native TTL resolution.
    pub fn ttl_unit(&self) -> TtlUnit {
        self.backend.ttl_unit()
    }

    /// Bind a candidate, producing a client whose every call is
    /// ACL-checked on that candidate's behalf.
    pub fn requester(&self, candidate: AccessCandidate) -> ResourceClient {
        ResourceClient {
            backend: Arc::clone(&self.backend),
            candidate,
        }
    }
}

/// A candidate-bound view over a connector backend.
pub struct ResourceClient {
    backend: Arc<dyn ResourceBackend>,
    candidate: AccessCandidate,
}

impl ResourceClient {
    pub fn candidate(&self) -> &AccessCandidate {
        &self.candidate
    }

    fn denied(&self, level: AccessLevel, key: &str) -> QuarryError {
        QuarryError::Access(AccessError::Denied {
            role: format!("{:?}", self.candidate.role).to_lowercase(),
            id: self.candidate.id.clone(),
            level: format!("{level:?}").to_lowercase(),
            resource: key.to_string(),
        })
    }

    fn check(&self, acl: &Acl, level: AccessLevel, key: &str) -> QuarryResult<()> {
        let request = quarry_core::AccessRequest::new(self.candidate.clone(), level);
        if acl.check_exact_access(&request) {
            Ok(())
        } else {
            Err(self.denied(level, key))
        }
    }

    fn validate_key(key: &str) -> QuarryResult<()> {
        if key.trim().is_empty() {
            return Err(QuarryError::Connector(ConnectorError::InvalidRequest {
                operation: "key".to_string(),
                reason: "key must not be empty".to_string(),
            }));
        }
        Ok(())
    }

    /// Load the live entry for a key. An expired entry is purged from
    /// the backend and reported as absent.
    async fn live_entry(&self, key: &str) -> QuarryResult<Option<ResourceEntry>> {
        match self.backend.load(key).await? {
            Some(entry) if entry.is_expired(Utc::now()) => {
                debug!(key, "purging expired entry on access");
                self.backend.remove(key).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Store a value under a key.
    ///
    /// On creation the creating candidate's `Owner` grant is inserted
    /// before any caller-supplied entries, so the creator always
    /// retains access. On overwrite, `Write` access on the existing
    /// entry is required and existing `Owner` grants are preserved
    /// through any supplied replacement ACL.
    pub async fn set(
        &self,
        key: &str,
        value: impl Into<Vec<u8>>,
        acl: Option<Acl>,
        metadata: Option<Metadata>,
        ttl_secs: Option<u64>,
    ) -> QuarryResult<()> {
        Self::validate_key(key)?;
        let existing = self.live_entry(key).await?;

        let (acl, metadata) = match existing {
            Some(existing) => {
                self.check(&existing.acl, AccessLevel::Write, key)?;
                let acl = match acl {
                    Some(supplied) => preserve_owners(supplied, &existing.acl),
                    None => existing.acl,
                };
                (acl, metadata.unwrap_or(existing.metadata))
            }
            None => {
                let base = Acl::owner(&self.candidate);
                let acl = match acl {
                    Some(supplied) => supplied
                        .entries()
                        .iter()
                        .fold(base, |acc, e| acc.with_access(e.role, &e.id, e.level)),
                    None => base,
                };
                (acl, metadata.unwrap_or_default())
            }
        };

        let entry = ResourceEntry {
            key: key.to_string(),
            value: value.into(),
            metadata,
            acl,
            expires_at: ttl_secs.map(|secs| Utc::now() + ChronoDuration::seconds(secs as i64)),
        };
        self.backend.store(entry).await
    }

    /// Read a value. Absent (or expired) keys yield `None`.
    pub async fn get(&self, key: &str) -> QuarryResult<Option<Vec<u8>>> {
        Self::validate_key(key)?;
        match self.live_entry(key).await? {
            Some(entry) => {
                self.check(&entry.acl, AccessLevel::Read, key)?;
                Ok(Some(entry.value))
            }
            None => Ok(None),
        }
    }

    /// Whether a live entry exists under this key.
    pub async fn exists(&self, key: &str) -> QuarryResult<bool> {
        Self::validate_key(key)?;
        match self.live_entry(key).await? {
            Some(entry) => {
                self.check(&entry.acl, AccessLevel::Read, key)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Delete an entry. Deleting an absent key is a no-op.
    pub async fn delete(&self, key: &str) -> QuarryResult<()> {
        Self::validate_key(key)?;
        match self.live_entry(key).await? {
            Some(entry) => {
                self.check(&entry.acl, AccessLevel::Write, key)?;
                self.backend.remove(key).await
            }
            None => Ok(()),
        }
    }

    /// List live entries under a key prefix that the candidate can
    /// read. ACLs in the listing are copies.
    pub async fn list(&self, prefix: &str) -> QuarryResult<Vec<ResourceListing>> {
        let now = Utc::now();
        let request = self.candidate.read_request();
        let listings = self.backend.scan(prefix).await?;
        Ok(listings
            .into_iter()
            .filter(|l| !l.is_expired(now))
            .filter(|l| l.acl.check_exact_access(&request))
            .collect())
    }

    /// Delete every entry under a prefix the candidate can write.
    /// Expired entries under the prefix are purged as a side effect.
    /// Returns the number of live entries deleted.
    pub async fn delete_all(&self, prefix: &str) -> QuarryResult<u64> {
        let now = Utc::now();
        let request = self.candidate.write_request();
        let mut deleted = 0u64;
        for listing in self.backend.scan(prefix).await? {
            if listing.is_expired(now) {
                self.backend.remove(&listing.key).await?;
            } else if listing.acl.check_exact_access(&request) {
                self.backend.remove(&listing.key).await?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Read an entry's metadata. Absent keys yield `None`.
    pub async fn get_metadata(&self, key: &str) -> QuarryResult<Option<Metadata>> {
        Self::validate_key(key)?;
        match self.live_entry(key).await? {
            Some(entry) => {
                self.check(&entry.acl, AccessLevel::Read, key)?;
                Ok(Some(entry.metadata))
            }
            None => Ok(None),
        }
    }

    /// Merge new metadata into an entry: new keys overwrite, others are
    /// retained. The value and ACL are untouched.
    pub async fn set_metadata(&self, key: &str, updates: Metadata) -> QuarryResult<()> {
        Self::validate_key(key)?;
        let mut entry = self
            .live_entry(key)
            .await?
            .ok_or_else(|| QuarryError::Connector(ConnectorError::NotFound {
                key: key.to_string(),
            }))?;
        self.check(&entry.acl, AccessLevel::Write, key)?;
        merge_metadata(&mut entry.metadata, updates);
        self.backend.store(entry).await
    }

    /// Read an entry's ACL (a copy). Absent keys yield `None`.
    pub async fn get_acl(&self, key: &str) -> QuarryResult<Option<Acl>> {
        Self::validate_key(key)?;
        match self.live_entry(key).await? {
            Some(entry) => {
                self.check(&entry.acl, AccessLevel::Read, key)?;
                Ok(Some(entry.acl))
            }
            None => Ok(None),
        }
    }

    /// Replace an entry's ACL.
    ///
    /// Requires `Owner` access. Existing `Owner` grants are re-inserted
    /// into the supplied ACL before persisting, so ownership can never
    /// be silently dropped by a caller overwrite.
    pub async fn set_acl(&self, key: &str, new_acl: Acl) -> QuarryResult<()> {
        Self::validate_key(key)?;
        let mut entry = self
            .live_entry(key)
            .await?
            .ok_or_else(|| QuarryError::Connector(ConnectorError::NotFound {
                key: key.to_string(),
            }))?;
        self.check(&entry.acl, AccessLevel::Owner, key)?;
        entry.acl = preserve_owners(new_acl, &entry.acl);
        self.backend.store(entry).await
    }

    /// Seconds remaining before expiry, or `None` for absent keys and
    /// entries without a TTL. Granularity follows the backend's native
    /// `ttl_unit`.
    pub async fn get_ttl(&self, key: &str) -> QuarryResult<Option<Duration>> {
        Self::validate_key(key)?;
        match self.live_entry(key).await? {
            Some(entry) => {
                self.check(&entry.acl, AccessLevel::Read, key)?;
                Ok(entry
                    .expires_at
                    .and_then(|at| at.signed_duration_since(Utc::now()).to_std().ok()))
            }
            None => Ok(None),
        }
    }

    /// Reset an entry's TTL to `ttl_secs` from now.
    pub async fn update_ttl(&self, key: &str, ttl_secs: u64) -> QuarryResult<()> {
        Self::validate_key(key)?;
        let mut entry = self
            .live_entry(key)
            .await?
            .ok_or_else(|| QuarryError::Connector(ConnectorError::NotFound {
                key: key.to_string(),
            }))?;
        self.check(&entry.acl, AccessLevel::Write, key)?;
        entry.expires_at = Some(Utc::now() + ChronoDuration::seconds(ttl_secs as i64));
        self.backend.store(entry).await
    }
}

/// Re-insert every `Owner`-level grant of `original` into `new_acl`.
fn preserve_owners(new_acl: Acl, original: &Acl) -> Acl {
    original
        .entries()
        .iter()
        .filter(|e| e.level == AccessLevel::Owner)
        .fold(new_acl, |acc, e| {
            acc.with_access(e.role, &e.id, AccessLevel::Owner)
        })
}

// =============================================================================
// TESTS
// =============================================================================
