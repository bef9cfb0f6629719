//! The vector backend contract and the in-process reference driver.
//!
//! Drivers speak collections, records, and similarity queries; they
//! know nothing about tenants, ACLs, or datasources. The engine layers
//! all of that on top, so a driver swap (in-memory to a hosted index)
//! never changes access semantics.

use crate::types::VectorRecord;
use async_trait::async_trait;
use quarry_core::{ConnectorError, QuarryError, QuarryResult, VectorError};
use std::collections::HashMap;
use std::sync::RwLock;

/// One query hit with its raw similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: VectorRecord,
    pub score: f32,
}

/// Backend-reported collection statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionStats {
    pub record_count: u64,
}

/// What the engine requires of a vector backend.
#[async_trait]
pub trait VectorStoreDriver: Send + Sync {
    /// Create a collection. Creating one that already exists is a
    /// no-op.
    async fn create_collection(&self, collection: &str) -> QuarryResult<()>;

    /// Drop a collection and everything in it. Dropping an absent
    /// collection is a no-op.
    async fn drop_collection(&self, collection: &str) -> QuarryResult<()>;

    async fn collection_exists(&self, collection: &str) -> QuarryResult<bool>;

    async fn list_collections(&self) -> QuarryResult<Vec<String>>;

    /// Insert or replace records by id.
    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> QuarryResult<()>;

    /// Remove records by id. Absent ids are skipped.
    async fn remove(&self, collection: &str, ids: &[String]) -> QuarryResult<()>;

    /// The `top_k` records most similar to `vector`, best first.
    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> QuarryResult<Vec<ScoredRecord>>;

    async fn describe(&self, collection: &str) -> QuarryResult<CollectionStats>;
}

fn missing_collection(collection: &str) -> QuarryError {
    QuarryError::Vector(VectorError::NamespaceNotFound {
        namespace: collection.to_string(),
    })
}

fn lock_poisoned(operation: &str) -> QuarryError {
    QuarryError::Connector(ConnectorError::BackendUnavailable {
        operation: operation.to_string(),
        reason: "store lock poisoned".to_string(),
    })
}

fn cosine(a: &[f32], b: &[f32]) -> QuarryResult<f32> {
    if a.len() != b.len() {
        return Err(QuarryError::Vector(VectorError::DimensionMismatch {
            expected: a.len() as i32,
            got: b.len() as i32,
        }));
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let norm_a = norm_a.sqrt();
    let norm_b = norm_b.sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a * norm_b))
}

/// In-process driver over a `RwLock`ed map of collections.
///
/// Records keep insertion order within a collection, which makes query
/// tie-breaking stable. Intended for tests and local development.
#[derive(Default)]
pub struct InMemoryVectorDriver {
    collections: RwLock<HashMap<String, Vec<VectorRecord>>>,
}

impl InMemoryVectorDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStoreDriver for InMemoryVectorDriver {
    async fn create_collection(&self, collection: &str) -> QuarryResult<()> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| lock_poisoned("create_collection"))?;
        collections.entry(collection.to_string()).or_default();
        Ok(())
    }

    async fn drop_collection(&self, collection: &str) -> QuarryResult<()> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| lock_poisoned("drop_collection"))?;
        collections.remove(collection);
        Ok(())
    }

    async fn collection_exists(&self, collection: &str) -> QuarryResult<bool> {
        let collections = self
            .collections
            .read()
            .map_err(|_| lock_poisoned("collection_exists"))?;
        Ok(collections.contains_key(collection))
    }

    async fn list_collections(&self) -> QuarryResult<Vec<String>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| lock_poisoned("list_collections"))?;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> QuarryResult<()> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| lock_poisoned("upsert"))?;
        let stored = collections
            .get_mut(collection)
            .ok_or_else(|| missing_collection(collection))?;
        for record in records {
            match stored.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => stored.push(record),
            }
        }
        Ok(())
    }

    async fn remove(&self, collection: &str, ids: &[String]) -> QuarryResult<()> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| lock_poisoned("remove"))?;
        let stored = collections
            .get_mut(collection)
            .ok_or_else(|| missing_collection(collection))?;
        stored.retain(|r| !ids.contains(&r.id));
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> QuarryResult<Vec<ScoredRecord>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| lock_poisoned("query"))?;
        let stored = collections
            .get(collection)
            .ok_or_else(|| missing_collection(collection))?;

        let mut scored = Vec::with_capacity(stored.len());
        for record in stored {
            let score = cosine(&record.vector, vector)?;
            scored.push(ScoredRecord {
                record: record.clone(),
                score,
            });
        }
        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn describe(&self, collection: &str) -> QuarryResult<CollectionStats> {
        let collections = self
            .collections
            .read()
            .map_err(|_| lock_poisoned("describe"))?;
        let stored = collections
            .get(collection)
            .ok_or_else(|| missing_collection(collection))?;
        Ok(CollectionStats {
            record_count: stored.len() as u64,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
