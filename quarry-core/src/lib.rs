//! QUARRY Core - Access Model and Shared Types
//!
//! Defines the identity/ACL model that every Quarry connector enforces,
//! the master error taxonomy, and the embedding vector types shared by
//! the vector store engine. Pure data and evaluation logic, no I/O.

pub mod access;
pub mod acl;
pub mod embedding;
pub mod error;

pub use access::{AccessCandidate, AccessLevel, AccessRequest, AccessRole};
pub use acl::{Acl, AclEntry};
pub use embedding::{EmbeddingProvider, EmbeddingVector, HashEmbedding};
pub use error::{
    AccessError, ConnectorError, QuarryError, QuarryResult, ResilienceError, SettingsError,
    VaultError, VectorError,
};
