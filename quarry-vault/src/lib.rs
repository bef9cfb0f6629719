//! QUARRY Vault - Credential Resolution and Connection Management
//!
//! The connection manager owns the only mutable shared state in the
//! core: one lazily constructed backend client and a time-bound
//! credential cache, both cleared together by `reset`. Credentials
//! resolve through a fixed priority chain (explicit key, managed
//! secret store, secret store), each source under its own retry
//! policy.

pub mod connection;
pub mod secrets;

pub use connection::{ClientFactory, ConnectionConfig, ConnectionManager, CREDENTIAL_TTL};
pub use secrets::{InMemorySecretStore, SecretStore};
