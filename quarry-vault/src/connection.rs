//! Backend connection management.
//!
//! A `ConnectionManager` resolves the backend credential through a
//! fixed priority chain (cached value, explicit config key, managed
//! secret store, secret store), constructs the backend client lazily,
//! and caches both. The client is a singleton per manager instance
//! until `reset`/`shutdown` clears it together with the credential
//! cache, which is how callers recover from a poisoned client after a
//! credential rotation or backend outage.

use crate::secrets::SecretStore;
use quarry_core::{AccessRequest, AccessRole, QuarryError, QuarryResult, VaultError};
use quarry_resilience::{with_safe_retry, OperationKind, OperationTimeouts, RetryPolicy};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long a resolved credential stays cached.
pub const CREDENTIAL_TTL: Duration = Duration::from_secs(300);

/// Trait for backend client construction.
///
/// Construction is async and fallible so that the manager can wrap it
/// in the resilience layer (retried, timed out, cancelled) like any
/// other backend call.
#[async_trait::async_trait]
pub trait ClientFactory: Send + Sync {
    type Client: Send + Sync;

    async fn build(&self, api_key: &str, token: CancellationToken) -> QuarryResult<Self::Client>;
}

/// Connection configuration: backend identity, auth, and the retry
/// policy applied to credential lookups and client construction.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Logical identity of the backend (index/bucket name); used in
    /// error messages.
    pub index: String,
    /// Explicit API key. Highest-priority credential source after the
    /// cache.
    pub api_key: Option<String>,
    /// Key to look up in the secret stores when no explicit key is
    /// configured.
    pub vault_key: Option<String>,
    pub retry: RetryPolicy,
    pub timeouts: OperationTimeouts,
}

impl ConnectionConfig {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            api_key: None,
            vault_key: None,
            retry: RetryPolicy::default(),
            timeouts: OperationTimeouts::default(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_vault_key(mut self, key: impl Into<String>) -> Self {
        self.vault_key = Some(key.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeouts(mut self, timeouts: OperationTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

struct CachedCredential {
    key: String,
    fetched_at: Instant,
}

impl CachedCredential {
    fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() < CREDENTIAL_TTL
    }
}

struct ManagerState<C> {
    client: Option<Arc<C>>,
    credentials: HashMap<(AccessRole, String), CachedCredential>,
}

impl<C> Default for ManagerState<C> {
    fn default() -> Self {
        Self {
            client: None,
            credentials: HashMap::new(),
        }
    }
}

/// Resolves credentials and owns the singleton backend client.
///
/// All state lives behind one async mutex, so concurrent first callers
/// serialize and at most one client construction is ever in flight.
pub struct ConnectionManager<F: ClientFactory> {
    factory: F,
    config: ConnectionConfig,
    managed_vault: Option<Arc<dyn SecretStore>>,
    vault: Option<Arc<dyn SecretStore>>,
    state: Mutex<ManagerState<F::Client>>,
}

impl<F: ClientFactory> ConnectionManager<F> {
    pub fn new(
        factory: F,
        config: ConnectionConfig,
        managed_vault: Option<Arc<dyn SecretStore>>,
        vault: Option<Arc<dyn SecretStore>>,
    ) -> Self {
        Self {
            factory,
            config,
            managed_vault,
            vault,
            state: Mutex::new(ManagerState::default()),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Get the live backend client, constructing it on first use.
    ///
    /// Credential priority: cache hit, explicit config key, managed
    /// secret store, secret store; each store lookup runs under its
    /// own retry policy and a per-source failure falls through to the
    /// next source. Exhaustion raises `CredentialUnavailable`.
    pub async fn get_client(
        &self,
        request: &AccessRequest,
        external: Option<CancellationToken>,
    ) -> QuarryResult<Arc<F::Client>> {
        let mut state = self.state.lock().await;

        if let Some(client) = &state.client {
            return Ok(Arc::clone(client));
        }

        let cache_key = (request.candidate.role, request.candidate.id.clone());
        let api_key = match state.credentials.get(&cache_key) {
            Some(cached) if cached.is_fresh() => {
                debug!(index = %self.config.index, "credential cache hit");
                cached.key.clone()
            }
            _ => {
                let resolved = self.resolve_credential(request, external.clone()).await?;
                state.credentials.insert(
                    cache_key,
                    CachedCredential {
                        key: resolved.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                resolved
            }
        };

        let factory = &self.factory;
        let built = with_safe_retry(
            "client-construction",
            OperationKind::Other,
            &self.config.retry,
            &self.config.timeouts,
            external,
            |_, _| {},
            |token| {
                let api_key = api_key.clone();
                async move { factory.build(&api_key, token).await }
            },
        )
        .await?;

        let client = Arc::new(built);
        state.client = Some(Arc::clone(&client));
        info!(index = %self.config.index, "backend client constructed");
        Ok(client)
    }

    /// Resolve the API credential through the source chain, skipping
    /// the cache (the caller consults it first).
    async fn resolve_credential(
        &self,
        request: &AccessRequest,
        external: Option<CancellationToken>,
    ) -> QuarryResult<String> {
        if let Some(key) = &self.config.api_key {
            debug!(index = %self.config.index, "using explicit api key");
            return Ok(key.clone());
        }

        if let Some(vault_key) = &self.config.vault_key {
            let sources: [(&str, Option<&Arc<dyn SecretStore>>); 2] = [
                ("managed-vault", self.managed_vault.as_ref()),
                ("vault", self.vault.as_ref()),
            ];
            for (label, store) in sources {
                let Some(store) = store else { continue };
                match self
                    .lookup_source(label, store, request, vault_key, external.clone())
                    .await?
                {
                    Some(key) => return Ok(key),
                    None => continue,
                }
            }
        }

        Err(QuarryError::Vault(VaultError::CredentialUnavailable {
            index: self.config.index.clone(),
        }))
    }

    /// One source lookup under its own retry policy.
    ///
    /// Non-cancellation failures are logged and reported as `None` so
    /// the chain can fall through; cancellation propagates.
    async fn lookup_source(
        &self,
        label: &str,
        store: &Arc<dyn SecretStore>,
        request: &AccessRequest,
        vault_key: &str,
        external: Option<CancellationToken>,
    ) -> QuarryResult<Option<String>> {
        let candidate = request.candidate.clone();
        let result = with_safe_retry(
            label,
            OperationKind::Other,
            &self.config.retry,
            &self.config.timeouts,
            external,
            |_, _| {},
            |_token| {
                let candidate = candidate.clone();
                async move { store.get(&candidate, vault_key).await }
            },
        )
        .await;

        match result {
            Ok(Some(key)) => Ok(Some(key)),
            Ok(None) => {
                debug!(index = %self.config.index, source = label, "credential source empty");
                Ok(None)
            }
            Err(err) if err.is_cancellation() => Err(err),
            Err(err) => {
                warn!(index = %self.config.index, source = label, %err, "credential source failed, trying next");
                Ok(None)
            }
        }
    }

    /// Drop the cached client and every cached credential.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.client = None;
        state.credentials.clear();
        info!(index = %self.config.index, "connection manager reset");
    }

    /// Terminal reset.
    pub async fn shutdown(&self) {
        self.reset().await;
        info!(index = %self.config.index, "connection manager shut down");
    }
}

// =============================================================================
// TESTS
// =============================================================================
