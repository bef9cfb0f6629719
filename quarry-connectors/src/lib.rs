//! QUARRY Connectors - Uniform Resource Connector Contract
//!
//! Every backend (in-memory cache, local filesystem, keyed-value
//! stores) implements the narrow `ResourceBackend` contract; the
//! `ResourceConnector` binds an `AccessCandidate` into a
//! `ResourceClient` that enforces ACLs and TTL expiry on every call
//! before dispatching to the backend.

pub mod backend;
pub mod client;
pub mod entry;
pub mod fs;
pub mod memory;
pub mod registry;

pub use backend::{ResourceBackend, TtlUnit};
pub use client::{ResourceClient, ResourceConnector};
pub use entry::{merge_metadata, Metadata, ResourceEntry, ResourceListing};
pub use fs::LocalStorageBackend;
pub use memory::InMemoryBackend;
pub use registry::ConnectorRegistry;
