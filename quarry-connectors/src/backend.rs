//! The raw backend contract connector drivers implement.
//!
//! Backends store and scan entries; they carry no access-control or
//! expiry logic. ACL enforcement and check-on-access expiry live in
//! `ResourceClient`, so every backend gets them uniformly.

use crate::entry::{ResourceEntry, ResourceListing};
use async_trait::async_trait;
use quarry_core::QuarryResult;

/// Native expiry resolution of a backend.
///
/// TTL units deliberately stay per-backend: a backend whose natural
/// lifecycle granularity is coarser than seconds reports `Days` and
/// callers interpret `update_ttl`/`get_ttl` accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlUnit {
    Seconds,
    Days,
}

/// Raw storage contract for resource connector backends.
///
/// Implementations must be thread-safe and support concurrent access.
/// `load` returns whatever is stored, expired or not; the client layer
/// decides visibility.
#[async_trait]
pub trait ResourceBackend: Send + Sync {
    /// Load an entry by key, if stored.
    async fn load(&self, key: &str) -> QuarryResult<Option<ResourceEntry>>;

    /// Store an entry, replacing any previous entry for the same key.
    async fn store(&self, entry: ResourceEntry) -> QuarryResult<()>;

    /// Remove an entry by key. Removing an absent key is a no-op.
    async fn remove(&self, key: &str) -> QuarryResult<()>;

    /// List all entries whose key starts with `prefix`.
    async fn scan(&self, prefix: &str) -> QuarryResult<Vec<ResourceListing>>;

    /// The backend's native expiry resolution.
    fn ttl_unit(&self) -> TtlUnit;
}
