//! In-memory connector backend.
//!
//! The cache-flavored backend: entries live in a `RwLock<HashMap>`,
//! expiry is second-resolution, and eviction is lazy (the client layer
//! purges expired entries on access).

use crate::backend::{ResourceBackend, TtlUnit};
use crate::entry::{ResourceEntry, ResourceListing};
use async_trait::async_trait;
use quarry_core::{ConnectorError, QuarryError, QuarryResult};
use std::collections::HashMap;
use std::sync::RwLock;

/// Thread-safe in-memory backend.
#[derive(Default)]
pub struct InMemoryBackend {
    entries: RwLock<HashMap<String, ResourceEntry>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired or not. Diagnostic only.
    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned(operation: &str) -> QuarryError {
        QuarryError::Connector(ConnectorError::BackendUnavailable {
            operation: operation.to_string(),
            reason: "in-memory lock poisoned".to_string(),
        })
    }
}

#[async_trait]
impl ResourceBackend for InMemoryBackend {
    async fn load(&self, key: &str) -> QuarryResult<Option<ResourceEntry>> {
        let entries = self.entries.read().map_err(|_| Self::poisoned("load"))?;
        Ok(entries.get(key).cloned())
    }

    async fn store(&self, entry: ResourceEntry) -> QuarryResult<()> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned("store"))?;
        entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> QuarryResult<()> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned("remove"))?;
        entries.remove(key);
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> QuarryResult<Vec<ResourceListing>> {
        let entries = self.entries.read().map_err(|_| Self::poisoned("scan"))?;
        let mut listings: Vec<ResourceListing> = entries
            .values()
            .filter(|e| e.key.starts_with(prefix))
            .map(|e| ResourceListing {
                key: e.key.clone(),
                metadata: e.metadata.clone(),
                acl: e.acl.clone(),
                expires_at: e.expires_at,
            })
            .collect();
        listings.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(listings)
    }

    fn ttl_unit(&self) -> TtlUnit {
        TtlUnit::Seconds
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::Acl;

    fn entry(key: &str, value: &[u8]) -> ResourceEntry {
        ResourceEntry::new(key, value.to_vec(), Acl::new())
    }

    #[tokio::test]
    async fn test_store_load_remove() {
        let backend = InMemoryBackend::new();
        backend.store(entry("k", b"v")).await.unwrap();

        let loaded = backend.load("k").await.unwrap().unwrap();
        assert_eq!(loaded.value, b"v".to_vec());

        backend.remove("k").await.unwrap();
        assert!(backend.load("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_absent_is_noop() {
        let backend = InMemoryBackend::new();
        backend.remove("never-stored").await.unwrap();
    }

    #[tokio::test]
    async fn test_store_replaces_previous_entry() {
        let backend = InMemoryBackend::new();
        backend.store(entry("k", b"one")).await.unwrap();
        backend.store(entry("k", b"two")).await.unwrap();

        let loaded = backend.load("k").await.unwrap().unwrap();
        assert_eq!(loaded.value, b"two".to_vec());
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_scan_matches_prefix_in_key_order() {
        let backend = InMemoryBackend::new();
        backend.store(entry("ns/b", b"2")).await.unwrap();
        backend.store(entry("ns/a", b"1")).await.unwrap();
        backend.store(entry("other/c", b"3")).await.unwrap();

        let listings = backend.scan("ns/").await.unwrap();
        let keys: Vec<&str> = listings.iter().map(|l| l.key.as_str()).collect();
        assert_eq!(keys, vec!["ns/a", "ns/b"]);
    }

    #[tokio::test]
    async fn test_ttl_unit_is_seconds() {
        assert_eq!(InMemoryBackend::new().ttl_unit(), TtlUnit::Seconds);
    }
}
