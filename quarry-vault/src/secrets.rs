//! Secret-store collaborator contract.
//!
//! The core calls exactly one method on a secret store: a
//! candidate-scoped lookup by key. Failures propagate as ordinary
//! errors and are subject to the caller's retry policy.

use async_trait::async_trait;
use quarry_core::{AccessCandidate, QuarryResult};
use std::collections::HashMap;
use std::sync::RwLock;

/// Trait for secret stores.
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Look up a secret on behalf of a candidate.
    ///
    /// Returns `None` when the key is not present; errors are reserved
    /// for lookup failures (unreachable store, denied token).
    async fn get(&self, candidate: &AccessCandidate, key: &str) -> QuarryResult<Option<String>>;
}

/// In-memory secret store for tests and local development.
#[derive(Default)]
pub struct InMemorySecretStore {
    secrets: RwLock<HashMap<String, String>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a secret under a key.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut secrets) = self.secrets.write() {
            secrets.insert(key.into(), value.into());
        }
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get(&self, _candidate: &AccessCandidate, key: &str) -> QuarryResult<Option<String>> {
        Ok(self
            .secrets
            .read()
            .ok()
            .and_then(|secrets| secrets.get(key).cloned()))
    }
}

// =============================================================================
// TESTS
// =============================================================================
