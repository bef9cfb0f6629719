//! Vector store domain types: namespaces, datasources, records,
//! search inputs and outputs.
//!
//! A namespace identifier is derived, never caller-supplied: the
//! display name is sanitized (lower-cased, whitespace runs collapsed
//! to single underscores) and prefixed with the owning candidate's id,
//! so two tenants naming a namespace "My Docs" land in disjoint
//! collections.

use quarry_connectors::Metadata;
use quarry_core::AccessCandidate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata key marking a collection's internal placeholder record.
/// Records carrying it are invisible to search.
pub const SKELETON_KEY: &str = "_quarry_skeleton";

/// Lower-case a display name and collapse every whitespace run into a
/// single underscore. Leading and trailing whitespace disappears. An
/// all-whitespace name sanitizes to the empty string, which callers
/// must reject.
pub fn sanitize_display_name(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// The storage-level collection id for a candidate's namespace.
pub fn namespace_id(candidate: &AccessCandidate, display_name: &str) -> String {
    format!("{}_{}", candidate.id, sanitize_display_name(display_name))
}

/// A tenant-scoped logical collection of vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    /// Derived storage id (candidate id + sanitized display name).
    pub id: String,
    /// The name the caller created the namespace under, unsanitized.
    pub display_name: String,
    pub owner_candidate_id: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A named batch of vectors ingested together, tracked so the whole
/// batch can be listed and deleted as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datasource {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub metadata: Metadata,
    /// Ids of every vector record this datasource produced.
    pub vector_ids: Vec<String>,
}

/// One stored vector with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    pub namespace_id: String,
    pub datasource_id: Option<String>,
}

impl VectorRecord {
    /// Whether this record is an internal placeholder rather than
    /// caller data.
    pub fn is_skeleton(&self) -> bool {
        matches!(self.metadata.get(SKELETON_KEY), Some(Value::Bool(true)))
    }
}

/// The payload of one item in an insert batch.
///
/// `Url` exists so callers get a typed "not supported" error instead
/// of a silent drop; remote fetching is out of scope here.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordSource {
    Text(String),
    Vector(Vec<f32>),
    Url(String),
}

impl RecordSource {
    pub fn kind(&self) -> &'static str {
        match self {
            RecordSource::Text(_) => "text",
            RecordSource::Vector(_) => "vector",
            RecordSource::Url(_) => "url",
        }
    }
}

/// One item of an insert batch.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertItem {
    pub id: String,
    pub source: RecordSource,
    pub metadata: Metadata,
}

impl InsertItem {
    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: RecordSource::Text(text.into()),
            metadata: Metadata::new(),
        }
    }

    pub fn vector(id: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            source: RecordSource::Vector(vector),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// What to remove in a delete call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteSelector {
    /// Explicit record ids. Must be non-empty.
    Ids(Vec<String>),
    /// Everything a datasource produced, plus its bookkeeping.
    Datasource(String),
}

/// A search query: raw text to be embedded, or a pre-computed vector.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchQuery {
    Text(String),
    Vector(Vec<f32>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub top_k: usize,
    pub include_metadata: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            include_metadata: true,
        }
    }
}

impl SearchOptions {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_include_metadata(mut self, include: bool) -> Self {
        self.include_metadata = include;
        self
    }
}

/// One search hit, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub score: f32,
    pub text: Option<String>,
    pub metadata: Option<Metadata>,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_lowercases_and_collapses_whitespace() {
        assert_eq!(sanitize_display_name("My  Docs"), "my_docs");
        assert_eq!(sanitize_display_name("  Spaced\tOut \n Name "), "spaced_out_name");
        assert_eq!(sanitize_display_name("already_clean"), "already_clean");
    }

    #[test]
    fn test_sanitize_all_whitespace_is_empty() {
        assert_eq!(sanitize_display_name("   \t  "), "");
        assert_eq!(sanitize_display_name(""), "");
    }

    #[test]
    fn test_namespace_id_is_candidate_scoped() {
        let alice = AccessCandidate::user("alice");
        let bob = AccessCandidate::user("bob");
        assert_eq!(namespace_id(&alice, "My Docs"), "alice_my_docs");
        assert_ne!(
            namespace_id(&alice, "My Docs"),
            namespace_id(&bob, "My Docs")
        );
    }

    #[test]
    fn test_skeleton_detection() {
        let mut metadata = Metadata::new();
        metadata.insert(SKELETON_KEY.to_string(), json!(true));
        let skeleton = VectorRecord {
            id: "ns-skeleton".to_string(),
            vector: vec![0.0],
            text: None,
            metadata,
            namespace_id: "ns".to_string(),
            datasource_id: None,
        };
        assert!(skeleton.is_skeleton());

        let plain = VectorRecord {
            id: "r1".to_string(),
            vector: vec![0.0],
            text: None,
            metadata: Metadata::new(),
            namespace_id: "ns".to_string(),
            datasource_id: None,
        };
        assert!(!plain.is_skeleton());
    }

    #[test]
    fn test_record_serde_roundtrip() {
        let record = VectorRecord {
            id: "r1".to_string(),
            vector: vec![0.5, -0.5],
            text: Some("hello".to_string()),
            metadata: Metadata::new(),
            namespace_id: "ns".to_string(),
            datasource_id: Some("ds1".to_string()),
        };
        let bytes = serde_json::to_vec(&record).unwrap();
        let back: VectorRecord = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_source_kind_labels() {
        assert_eq!(RecordSource::Text("t".into()).kind(), "text");
        assert_eq!(RecordSource::Vector(vec![]).kind(), "vector");
        assert_eq!(RecordSource::Url("u".into()).kind(), "url");
    }

    mod prop_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_sanitized_names_have_no_whitespace_or_uppercase(name in ".{0,60}") {
                let sanitized = sanitize_display_name(&name);
                prop_assert!(!sanitized.chars().any(char::is_whitespace));
                prop_assert_eq!(sanitized.to_lowercase(), sanitized.clone());
                prop_assert!(!sanitized.contains("__") || name.to_lowercase().contains('_'));
            }

            #[test]
            fn prop_sanitize_is_idempotent(name in ".{0,60}") {
                let once = sanitize_display_name(&name);
                prop_assert_eq!(sanitize_display_name(&once), once.clone());
            }
        }
    }
}
