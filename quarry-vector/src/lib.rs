//! QUARRY Vector - Namespace-Scoped Vector Store Engine
//!
//! Chunking, embedding, and similarity search over a pluggable vector
//! backend. Namespaces are tenant-scoped collections: their storage
//! ids are derived from the owning candidate, their bookkeeping lives
//! behind the shared resource connector (so ACL semantics are uniform
//! with every other resource), and every backend call runs under the
//! resilience envelope with the client supplied by the connection
//! manager.

pub mod chunk;
pub mod driver;
pub mod engine;
pub mod settings;
pub mod types;

pub use chunk::{chunk_text, Chunk};
pub use driver::{CollectionStats, InMemoryVectorDriver, ScoredRecord, VectorStoreDriver};
pub use engine::{DatasourceSpec, VectorStoreEngine};
pub use settings::{EmbeddingConfig, HealthThresholds, VectorAuth, VectorStoreSettings};
pub use types::{
    namespace_id, sanitize_display_name, Datasource, DeleteSelector, InsertItem, Namespace,
    RecordSource, SearchOptions, SearchQuery, SearchResult, VectorRecord, SKELETON_KEY,
};
