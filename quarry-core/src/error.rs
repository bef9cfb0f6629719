//! Error types for Quarry operations.
//!
//! Kinds, not just messages: the retry policy keys off whether an error
//! is retryable (`Timeout`, `BackendUnavailable`) or terminal
//! (`Cancelled`, `InvalidRequest`, `AccessDenied`).

use std::time::Duration;
use thiserror::Error;

/// Access-control errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("Access denied for {role} '{id}': {level} on {resource}")]
    Denied {
        role: String,
        id: String,
        level: String,
        resource: String,
    },
}

/// Resilience layer errors (timeout and cancellation).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResilienceError {
    #[error("Operation '{operation}' timed out after {waited:?}")]
    Timeout { operation: String, waited: Duration },

    #[error("Operation '{operation}' cancelled: {reason}")]
    Cancelled { operation: String, reason: String },
}

/// Resource connector errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectorError {
    #[error("Backend unavailable for '{operation}': {reason}")]
    BackendUnavailable { operation: String, reason: String },

    #[error("Resource not found: {key}")]
    NotFound { key: String },

    #[error("Invalid request for '{operation}': {reason}")]
    InvalidRequest { operation: String, reason: String },

    #[error("Backend I/O failed for '{operation}': {reason}")]
    Io { operation: String, reason: String },
}

/// Credential resolution and connection management errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VaultError {
    #[error("No credential source yielded a key for '{index}'")]
    CredentialUnavailable { index: String },

    #[error("Secret store lookup failed for '{key}': {reason}")]
    LookupFailed { key: String, reason: String },

    #[error("Client construction failed: {reason}")]
    ClientConstruction { reason: String },
}

/// Vector store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VectorError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: i32, got: i32 },

    #[error("Mixed source types in one insert batch")]
    MixedSourceTypes,

    #[error("Unsupported source type: {kind}")]
    UnsupportedSourceType { kind: String },

    #[error("Unsupported delete filter: {reason}")]
    UnsupportedDeleteFilter { reason: String },

    #[error("Invalid chunking: {reason}")]
    InvalidChunking { reason: String },

    #[error("Namespace not found: {namespace}")]
    NamespaceNotFound { namespace: String },

    #[error("Datasource not found: {datasource}")]
    DatasourceNotFound { datasource: String },

    #[error("Embedding failed: {reason}")]
    EmbeddingFailed { reason: String },
}

/// Connector settings validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Missing required setting: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Quarry operations.
#[derive(Debug, Clone, Error)]
pub enum QuarryError {
    #[error("Access error: {0}")]
    Access(#[from] AccessError),

    #[error("Resilience error: {0}")]
    Resilience(#[from] ResilienceError),

    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),

    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
}

impl QuarryError {
    /// Whether a retry attempt could plausibly succeed.
    ///
    /// Timeouts and transient backend failures are retryable. Contract
    /// violations, denied access, and cancellation are terminal:
    /// retrying a malformed request cannot succeed, and a cancelled
    /// call must never be resurrected.
    pub fn is_retryable(&self) -> bool {
        match self {
            QuarryError::Resilience(ResilienceError::Timeout { .. }) => true,
            QuarryError::Resilience(ResilienceError::Cancelled { .. }) => false,
            QuarryError::Connector(ConnectorError::BackendUnavailable { .. }) => true,
            QuarryError::Connector(ConnectorError::Io { .. }) => true,
            QuarryError::Vault(VaultError::LookupFailed { .. }) => true,
            QuarryError::Vault(VaultError::ClientConstruction { .. }) => true,
            _ => false,
        }
    }

    /// Whether this error is a cancellation (external signal fired or
    /// the operation itself signalled cancellation).
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            QuarryError::Resilience(ResilienceError::Cancelled { .. })
        )
    }
}

/// Result type alias for Quarry operations.
pub type QuarryResult<T> = Result<T, QuarryError>;

// =============================================================================
// TESTS
// =============================================================================
