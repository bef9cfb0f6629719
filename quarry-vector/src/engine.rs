//! The namespace-scoped vector store engine.
//!
//! The engine composes the other layers: namespace and datasource
//! bookkeeping lives in a `ResourceConnector` (so the ACL and TTL
//! semantics are exactly the shared connector semantics), the backend
//! client comes from a `ConnectionManager`, and every driver call runs
//! under the retry/timeout envelope. The driver itself never sees a
//! tenant: by the time a call reaches it, the namespace id already
//! encodes the owning candidate and the ACL check has passed.
//!
//! Ordering on namespace creation matters: the bookkeeping entry (and
//! with it the owner's ACL grant) is persisted before the backend
//! collection is created, so there is no window in which a collection
//! exists without an owner.

use crate::chunk::chunk_text;
use crate::driver::{CollectionStats, VectorStoreDriver};
use crate::settings::VectorStoreSettings;
use crate::types::{
    namespace_id, sanitize_display_name, Datasource, DeleteSelector, InsertItem, Namespace,
    RecordSource, SearchOptions, SearchQuery, SearchResult, VectorRecord, SKELETON_KEY,
};
use quarry_connectors::{Metadata, ResourceClient, ResourceConnector};
use quarry_core::{
    AccessCandidate, AccessError, ConnectorError, EmbeddingProvider, QuarryError, QuarryResult,
    VectorError,
};
use quarry_resilience::{with_safe_retry, OperationKind};
use quarry_vault::{ClientFactory, ConnectionManager, SecretStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// Everything needed to ingest one text as a datasource.
#[derive(Debug, Clone)]
pub struct DatasourceSpec {
    /// Caller-supplied id; generated when absent.
    pub id: Option<String>,
    pub label: String,
    pub text: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub metadata: Metadata,
}

impl DatasourceSpec {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: None,
            label: label.into(),
            text: text.into(),
            chunk_size: 1024,
            chunk_overlap: 256,
            metadata: Metadata::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_chunking(mut self, chunk_size: usize, chunk_overlap: usize) -> Self {
        self.chunk_size = chunk_size;
        self.chunk_overlap = chunk_overlap;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

fn ns_key(ns_id: &str) -> String {
    format!("ns/{ns_id}")
}

fn ds_key(ns_id: &str, ds_id: &str) -> String {
    format!("ds/{ns_id}/{ds_id}")
}

fn ds_prefix(ns_id: &str) -> String {
    format!("ds/{ns_id}/")
}

fn skeleton_id(ns_id: &str) -> String {
    format!("{ns_id}::skeleton")
}

fn invalid(operation: &str, reason: impl Into<String>) -> QuarryError {
    QuarryError::Connector(ConnectorError::InvalidRequest {
        operation: operation.to_string(),
        reason: reason.into(),
    })
}

fn encode<T: Serialize>(value: &T, what: &str) -> QuarryResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| {
        QuarryError::Connector(ConnectorError::Io {
            operation: format!("encode-{what}"),
            reason: e.to_string(),
        })
    })
}

fn decode<T: DeserializeOwned>(bytes: &[u8], what: &str) -> QuarryResult<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        QuarryError::Connector(ConnectorError::Io {
            operation: format!("decode-{what}"),
            reason: e.to_string(),
        })
    })
}

fn namespace_missing(ns_id: &str) -> QuarryError {
    QuarryError::Vector(VectorError::NamespaceNotFound {
        namespace: ns_id.to_string(),
    })
}

/// Tenant-aware vector store over a pluggable backend driver.
pub struct VectorStoreEngine<F>
where
    F: ClientFactory,
    F::Client: VectorStoreDriver,
{
    settings: VectorStoreSettings,
    connection: ConnectionManager<F>,
    bookkeeping: ResourceConnector,
    embeddings: Arc<dyn EmbeddingProvider>,
}

impl<F> std::fmt::Debug for VectorStoreEngine<F>
where
    F: ClientFactory,
    F::Client: VectorStoreDriver,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStoreEngine")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<F> VectorStoreEngine<F>
where
    F: ClientFactory,
    F::Client: VectorStoreDriver,
{
    /// Build an engine. Settings are validated eagerly, as is the
    /// embedding provider's dimension against the configured one.
    pub fn new(
        settings: VectorStoreSettings,
        factory: F,
        embeddings: Arc<dyn EmbeddingProvider>,
        bookkeeping: ResourceConnector,
        managed_vault: Option<Arc<dyn SecretStore>>,
        vault: Option<Arc<dyn SecretStore>>,
    ) -> QuarryResult<Self> {
        settings.validate()?;
        if embeddings.dimensions() != settings.embedding.dimensions {
            return Err(QuarryError::Vector(VectorError::DimensionMismatch {
                expected: settings.embedding.dimensions,
                got: embeddings.dimensions(),
            }));
        }
        let connection =
            ConnectionManager::new(factory, settings.connection_config(), managed_vault, vault);
        Ok(Self {
            settings,
            connection,
            bookkeeping,
            embeddings,
        })
    }

    pub fn settings(&self) -> &VectorStoreSettings {
        &self.settings
    }

    /// Drop the cached backend client and credentials.
    pub async fn reset_connection(&self) {
        self.connection.reset().await;
    }

    pub async fn shutdown(&self) {
        self.connection.shutdown().await;
    }

    async fn driver(
        &self,
        candidate: &AccessCandidate,
        external: Option<CancellationToken>,
    ) -> QuarryResult<Arc<F::Client>> {
        self.connection
            .get_client(&candidate.read_request(), external)
            .await
    }

    /// One driver call under the engine's retry/timeout envelope.
    async fn run_retried<T, Op, Fut>(
        &self,
        name: &str,
        kind: OperationKind,
        external: Option<CancellationToken>,
        mut op: Op,
    ) -> QuarryResult<T>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = QuarryResult<T>>,
    {
        with_safe_retry(
            name,
            kind,
            &self.settings.retry,
            &self.settings.timeouts,
            external,
            |_, _| {},
            move |_token| op(),
        )
        .await
    }

    /// Load a namespace the candidate can read, or fail as missing.
    async fn load_namespace(
        &self,
        client: &ResourceClient,
        ns_id: &str,
    ) -> QuarryResult<Namespace> {
        let bytes = client
            .get(&ns_key(ns_id))
            .await?
            .ok_or_else(|| namespace_missing(ns_id))?;
        decode(&bytes, "namespace")
    }

    /// Load a namespace and additionally require write access on it.
    /// Reads pass the connector's ACL check already; mutations of the
    /// namespace's vectors gate on the write grant here.
    async fn require_write(&self, client: &ResourceClient, ns_id: &str) -> QuarryResult<Namespace> {
        let ns = self.load_namespace(client, ns_id).await?;
        let acl = client
            .get_acl(&ns_key(ns_id))
            .await?
            .ok_or_else(|| namespace_missing(ns_id))?;
        let request = client.candidate().write_request();
        if !acl.check_exact_access(&request) {
            return Err(QuarryError::Access(AccessError::Denied {
                role: format!("{:?}", client.candidate().role).to_lowercase(),
                id: client.candidate().id.clone(),
                level: "write".to_string(),
                resource: ns_key(ns_id),
            }));
        }
        Ok(ns)
    }

    fn check_dimensions(&self, got: i32) -> QuarryResult<()> {
        let expected = self.settings.embedding.dimensions;
        if got != expected {
            return Err(QuarryError::Vector(VectorError::DimensionMismatch {
                expected,
                got,
            }));
        }
        Ok(())
    }

    // ===== NAMESPACES =====

    /// Create a namespace, or return the existing one for the same
    /// candidate and display name. The bookkeeping entry with the
    /// creator's owner grant lands before the backend collection.
    pub async fn create_namespace(
        &self,
        candidate: &AccessCandidate,
        display_name: &str,
        metadata: Option<Metadata>,
        external: Option<CancellationToken>,
    ) -> QuarryResult<Namespace> {
        if sanitize_display_name(display_name).is_empty() {
            return Err(invalid(
                "create_namespace",
                "namespace name must contain non-whitespace characters",
            ));
        }
        let ns_id = namespace_id(candidate, display_name);
        let key = ns_key(&ns_id);
        let client = self.bookkeeping.requester(candidate.clone());

        if let Some(bytes) = client.get(&key).await? {
            let existing: Namespace = decode(&bytes, "namespace")?;
            debug!(namespace = %ns_id, "namespace already exists");
            // A creation that crashed after the bookkeeping write may
            // have left no backend collection behind; re-create heals
            // it.
            self.ensure_collection(candidate, &ns_id, external).await?;
            return Ok(existing);
        }

        let ns = Namespace {
            id: ns_id.clone(),
            display_name: display_name.to_string(),
            owner_candidate_id: candidate.id.clone(),
            metadata: metadata.unwrap_or_default(),
        };
        client
            .set(&key, encode(&ns, "namespace")?, None, None, None)
            .await?;
        self.ensure_collection(candidate, &ns_id, external).await?;

        info!(namespace = %ns_id, "namespace created");
        Ok(ns)
    }

    /// Make sure the backend collection exists and carries its
    /// placeholder record. Safe to repeat: collection creation is a
    /// no-op when the collection exists and the placeholder upserts by
    /// id.
    async fn ensure_collection(
        &self,
        candidate: &AccessCandidate,
        ns_id: &str,
        external: Option<CancellationToken>,
    ) -> QuarryResult<()> {
        let driver = self.driver(candidate, external.clone()).await?;
        {
            let driver = Arc::clone(&driver);
            let ns_id = ns_id.to_string();
            self.run_retried("create-collection", OperationKind::Other, external.clone(), move || {
                let driver = Arc::clone(&driver);
                let ns_id = ns_id.clone();
                async move { driver.create_collection(&ns_id).await }
            })
            .await?;
        }

        // Placeholder record so the collection is never empty; it is
        // invisible to search.
        let mut skeleton_metadata = Metadata::new();
        skeleton_metadata.insert(SKELETON_KEY.to_string(), json!(true));
        let skeleton = VectorRecord {
            id: skeleton_id(ns_id),
            vector: vec![0.0; self.settings.embedding.dimensions as usize],
            text: None,
            metadata: skeleton_metadata,
            namespace_id: ns_id.to_string(),
            datasource_id: None,
        };
        let seed_ns = ns_id.to_string();
        self.run_retried("seed-collection", OperationKind::Upsert, external, move || {
            let driver = Arc::clone(&driver);
            let ns_id = seed_ns.clone();
            let skeleton = skeleton.clone();
            async move { driver.upsert(&ns_id, vec![skeleton]).await }
        })
        .await
    }

    pub async fn namespace_exists(
        &self,
        candidate: &AccessCandidate,
        display_name: &str,
    ) -> QuarryResult<bool> {
        let ns_id = namespace_id(candidate, display_name);
        let client = self.bookkeeping.requester(candidate.clone());
        client.exists(&ns_key(&ns_id)).await
    }

    /// Every namespace the candidate can read, sorted by id.
    pub async fn list_namespaces(
        &self,
        candidate: &AccessCandidate,
    ) -> QuarryResult<Vec<Namespace>> {
        let client = self.bookkeeping.requester(candidate.clone());
        let mut namespaces = Vec::new();
        for listing in client.list("ns/").await? {
            if let Some(bytes) = client.get(&listing.key).await? {
                namespaces.push(decode::<Namespace>(&bytes, "namespace")?);
            }
        }
        namespaces.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(namespaces)
    }

    /// Delete a namespace, its datasource bookkeeping, and the backend
    /// collection. Deleting an absent namespace is a no-op.
    pub async fn delete_namespace(
        &self,
        candidate: &AccessCandidate,
        display_name: &str,
        external: Option<CancellationToken>,
    ) -> QuarryResult<()> {
        let ns_id = namespace_id(candidate, display_name);
        let client = self.bookkeeping.requester(candidate.clone());

        if !client.exists(&ns_key(&ns_id)).await? {
            debug!(namespace = %ns_id, "delete of absent namespace is a no-op");
            return Ok(());
        }

        // Connector-side write check happens inside delete.
        client.delete(&ns_key(&ns_id)).await?;
        client.delete_all(&ds_prefix(&ns_id)).await?;

        let driver = self.driver(candidate, external.clone()).await?;
        let drop_ns = ns_id.clone();
        self.run_retried("drop-collection", OperationKind::Delete, external, move || {
            let driver = Arc::clone(&driver);
            let ns_id = drop_ns.clone();
            async move { driver.drop_collection(&ns_id).await }
        })
        .await?;

        info!(namespace = %ns_id, "namespace deleted");
        Ok(())
    }

    /// Backend record count for a namespace, excluding the placeholder.
    pub async fn namespace_stats(
        &self,
        candidate: &AccessCandidate,
        display_name: &str,
        external: Option<CancellationToken>,
    ) -> QuarryResult<CollectionStats> {
        let ns_id = namespace_id(candidate, display_name);
        let client = self.bookkeeping.requester(candidate.clone());
        self.load_namespace(&client, &ns_id).await?;

        let driver = self.driver(candidate, external.clone()).await?;
        let stat_ns = ns_id.clone();
        let stats = self
            .run_retried(
                "describe-collection",
                OperationKind::DescribeStats,
                external,
                move || {
                    let driver = Arc::clone(&driver);
                    let ns_id = stat_ns.clone();
                    async move { driver.describe(&ns_id).await }
                },
            )
            .await?;
        Ok(CollectionStats {
            record_count: stats.record_count.saturating_sub(1),
        })
    }

    // ===== DATASOURCES =====

    /// Chunk, embed, and store one text as a datasource.
    pub async fn create_datasource(
        &self,
        candidate: &AccessCandidate,
        display_name: &str,
        spec: DatasourceSpec,
        external: Option<CancellationToken>,
    ) -> QuarryResult<Datasource> {
        let ns_id = namespace_id(candidate, display_name);
        let client = self.bookkeeping.requester(candidate.clone());
        self.require_write(&client, &ns_id).await?;

        let ds_id = match spec.id {
            Some(id) if id.trim().is_empty() => {
                return Err(invalid("create_datasource", "datasource id must not be empty"));
            }
            Some(id) => id,
            None => Uuid::now_v7().to_string(),
        };
        if client.exists(&ds_key(&ns_id, &ds_id)).await? {
            return Err(invalid(
                "create_datasource",
                format!("datasource '{ds_id}' already exists"),
            ));
        }

        let chunks = chunk_text(&spec.text, spec.chunk_size, spec.chunk_overlap)?;
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embeddings.embed_texts(&texts).await?;
        for embedding in &embeddings {
            self.check_dimensions(embedding.dimensions)?;
        }

        let records: Vec<VectorRecord> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| VectorRecord {
                id: format!("{ds_id}-{}", chunk.index),
                vector: embedding.data,
                text: Some(chunk.text.clone()),
                metadata: spec.metadata.clone(),
                namespace_id: ns_id.clone(),
                datasource_id: Some(ds_id.clone()),
            })
            .collect();
        let vector_ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();

        if !records.is_empty() {
            let driver = self.driver(candidate, external.clone()).await?;
            let upsert_ns = ns_id.clone();
            self.run_retried("upsert-datasource", OperationKind::Upsert, external, move || {
                let driver = Arc::clone(&driver);
                let ns_id = upsert_ns.clone();
                let records = records.clone();
                async move { driver.upsert(&ns_id, records).await }
            })
            .await?;
        }

        let datasource = Datasource {
            id: ds_id,
            label: spec.label,
            metadata: spec.metadata,
            vector_ids,
        };
        client
            .set(
                &ds_key(&ns_id, &datasource.id),
                encode(&datasource, "datasource")?,
                None,
                None,
                None,
            )
            .await?;

        info!(
            namespace = %ns_id,
            datasource = %datasource.id,
            vectors = datasource.vector_ids.len(),
            "datasource created"
        );
        Ok(datasource)
    }

    pub async fn get_datasource(
        &self,
        candidate: &AccessCandidate,
        display_name: &str,
        ds_id: &str,
    ) -> QuarryResult<Option<Datasource>> {
        let ns_id = namespace_id(candidate, display_name);
        let client = self.bookkeeping.requester(candidate.clone());
        self.load_namespace(&client, &ns_id).await?;
        match client.get(&ds_key(&ns_id, ds_id)).await? {
            Some(bytes) => Ok(Some(decode(&bytes, "datasource")?)),
            None => Ok(None),
        }
    }

    /// Every datasource in a namespace the candidate can read, sorted
    /// by id.
    pub async fn list_datasources(
        &self,
        candidate: &AccessCandidate,
        display_name: &str,
    ) -> QuarryResult<Vec<Datasource>> {
        let ns_id = namespace_id(candidate, display_name);
        let client = self.bookkeeping.requester(candidate.clone());
        self.load_namespace(&client, &ns_id).await?;

        let mut datasources = Vec::new();
        for listing in client.list(&ds_prefix(&ns_id)).await? {
            if let Some(bytes) = client.get(&listing.key).await? {
                datasources.push(decode::<Datasource>(&bytes, "datasource")?);
            }
        }
        datasources.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(datasources)
    }

    /// Remove a datasource's vectors and its bookkeeping entry.
    pub async fn delete_datasource(
        &self,
        candidate: &AccessCandidate,
        display_name: &str,
        ds_id: &str,
        external: Option<CancellationToken>,
    ) -> QuarryResult<()> {
        let ns_id = namespace_id(candidate, display_name);
        let client = self.bookkeeping.requester(candidate.clone());
        self.require_write(&client, &ns_id).await?;

        let bytes = client.get(&ds_key(&ns_id, ds_id)).await?.ok_or_else(|| {
            QuarryError::Vector(VectorError::DatasourceNotFound {
                datasource: ds_id.to_string(),
            })
        })?;
        let datasource: Datasource = decode(&bytes, "datasource")?;

        if !datasource.vector_ids.is_empty() {
            let driver = self.driver(candidate, external.clone()).await?;
            let remove_ns = ns_id.clone();
            let ids = datasource.vector_ids.clone();
            self.run_retried("remove-datasource", OperationKind::Delete, external, move || {
                let driver = Arc::clone(&driver);
                let ns_id = remove_ns.clone();
                let ids = ids.clone();
                async move { driver.remove(&ns_id, &ids).await }
            })
            .await?;
        }

        client.delete(&ds_key(&ns_id, ds_id)).await?;
        info!(namespace = %ns_id, datasource = %ds_id, "datasource deleted");
        Ok(())
    }

    // ===== RECORDS =====

    /// Insert a homogeneous batch of records.
    ///
    /// The whole batch is validated before anything is persisted: a
    /// url-sourced item or a mix of text and vector sources rejects
    /// the batch with nothing written. An empty batch is a no-op.
    /// Returns the stored record ids.
    pub async fn insert(
        &self,
        candidate: &AccessCandidate,
        display_name: &str,
        items: Vec<InsertItem>,
        external: Option<CancellationToken>,
    ) -> QuarryResult<Vec<String>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let ns_id = namespace_id(candidate, display_name);
        let client = self.bookkeeping.requester(candidate.clone());
        self.require_write(&client, &ns_id).await?;

        let mut has_text = false;
        let mut has_vector = false;
        for item in &items {
            if item.id.trim().is_empty() {
                return Err(invalid("insert", "record id must not be empty"));
            }
            match &item.source {
                RecordSource::Url(url) => {
                    return Err(QuarryError::Vector(VectorError::UnsupportedSourceType {
                        kind: format!("url ({url})"),
                    }));
                }
                RecordSource::Text(_) => has_text = true,
                RecordSource::Vector(v) => {
                    self.check_dimensions(v.len() as i32)?;
                    has_vector = true;
                }
            }
        }
        if has_text && has_vector {
            return Err(QuarryError::Vector(VectorError::MixedSourceTypes));
        }

        let records = if has_text {
            let texts: Vec<&str> = items
                .iter()
                .map(|item| match &item.source {
                    RecordSource::Text(text) => text.as_str(),
                    _ => unreachable!("batch verified text-only above"),
                })
                .collect();
            let embeddings = self.embeddings.embed_texts(&texts).await?;
            for embedding in &embeddings {
                self.check_dimensions(embedding.dimensions)?;
            }
            items
                .into_iter()
                .zip(embeddings)
                .map(|(item, embedding)| {
                    let text = match item.source {
                        RecordSource::Text(text) => text,
                        _ => unreachable!(),
                    };
                    VectorRecord {
                        id: item.id,
                        vector: embedding.data,
                        text: Some(text),
                        metadata: item.metadata,
                        namespace_id: ns_id.clone(),
                        datasource_id: None,
                    }
                })
                .collect::<Vec<_>>()
        } else {
            items
                .into_iter()
                .map(|item| {
                    let vector = match item.source {
                        RecordSource::Vector(vector) => vector,
                        _ => unreachable!("batch verified vector-only above"),
                    };
                    VectorRecord {
                        id: item.id,
                        vector,
                        text: None,
                        metadata: item.metadata,
                        namespace_id: ns_id.clone(),
                        datasource_id: None,
                    }
                })
                .collect::<Vec<_>>()
        };
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();

        let driver = self.driver(candidate, external.clone()).await?;
        let upsert_ns = ns_id.clone();
        self.run_retried("upsert-records", OperationKind::Upsert, external, move || {
            let driver = Arc::clone(&driver);
            let ns_id = upsert_ns.clone();
            let records = records.clone();
            async move { driver.upsert(&ns_id, records).await }
        })
        .await?;

        debug!(namespace = %ns_id, count = ids.len(), "records inserted");
        Ok(ids)
    }

    /// Delete records by id or by datasource.
    pub async fn delete(
        &self,
        candidate: &AccessCandidate,
        display_name: &str,
        selector: DeleteSelector,
        external: Option<CancellationToken>,
    ) -> QuarryResult<()> {
        match selector {
            DeleteSelector::Datasource(ds_id) => {
                self.delete_datasource(candidate, display_name, &ds_id, external)
                    .await
            }
            DeleteSelector::Ids(ids) => {
                if ids.is_empty() {
                    return Err(QuarryError::Vector(VectorError::UnsupportedDeleteFilter {
                        reason: "id list must not be empty".to_string(),
                    }));
                }
                let ns_id = namespace_id(candidate, display_name);
                let client = self.bookkeeping.requester(candidate.clone());
                self.require_write(&client, &ns_id).await?;

                let driver = self.driver(candidate, external.clone()).await?;
                let remove_ns = ns_id.clone();
                self.run_retried("remove-records", OperationKind::Delete, external, move || {
                    let driver = Arc::clone(&driver);
                    let ns_id = remove_ns.clone();
                    let ids = ids.clone();
                    async move { driver.remove(&ns_id, &ids).await }
                })
                .await
            }
        }
    }

    // ===== SEARCH =====

    /// Similarity search within one namespace, best hit first.
    pub async fn search(
        &self,
        candidate: &AccessCandidate,
        display_name: &str,
        query: SearchQuery,
        options: SearchOptions,
        external: Option<CancellationToken>,
    ) -> QuarryResult<Vec<SearchResult>> {
        let ns_id = namespace_id(candidate, display_name);
        let client = self.bookkeeping.requester(candidate.clone());
        self.load_namespace(&client, &ns_id).await?;

        if options.top_k == 0 {
            return Ok(Vec::new());
        }

        let vector = match query {
            SearchQuery::Text(text) => {
                let embedding = self.embeddings.embed_text(&text).await?;
                self.check_dimensions(embedding.dimensions)?;
                embedding.data
            }
            SearchQuery::Vector(vector) => {
                self.check_dimensions(vector.len() as i32)?;
                vector
            }
        };

        // One extra hit absorbs the placeholder record, which is
        // filtered below.
        let fetch = options.top_k + 1;
        let driver = self.driver(candidate, external.clone()).await?;
        let query_ns = ns_id.clone();
        let hits = self
            .run_retried("query-collection", OperationKind::Query, external, move || {
                let driver = Arc::clone(&driver);
                let ns_id = query_ns.clone();
                let vector = vector.clone();
                async move { driver.query(&ns_id, &vector, fetch).await }
            })
            .await?;

        let results: Vec<SearchResult> = hits
            .into_iter()
            .filter(|hit| !hit.record.is_skeleton())
            .take(options.top_k)
            .map(|hit| SearchResult {
                id: hit.record.id,
                score: hit.score,
                text: hit.record.text,
                metadata: options.include_metadata.then_some(hit.record.metadata),
            })
            .collect();
        debug!(namespace = %ns_id, hits = results.len(), "search completed");
        Ok(results)
    }
}

// =============================================================================
// TESTS
// =============================================================================
