//! Vector store configuration and validation.

use quarry_core::{QuarryError, QuarryResult, SettingsError};
use quarry_resilience::{OperationTimeouts, RetryPolicy};
use quarry_vault::ConnectionConfig;
use std::time::Duration;

/// Which embedding model the engine expects and the dimension every
/// stored and queried vector must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingConfig {
    pub model_id: String,
    pub dimensions: i32,
}

impl EmbeddingConfig {
    pub fn new(model_id: impl Into<String>, dimensions: i32) -> Self {
        Self {
            model_id: model_id.into(),
            dimensions,
        }
    }
}

/// How the backend credential is supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorAuth {
    /// An explicit API key in configuration.
    ApiKey(String),
    /// A key name to resolve through the secret stores.
    VaultKey(String),
}

/// Thresholds for declaring the backend unhealthy. Consumed by
/// operators wiring health probes around the engine; the engine itself
/// only validates them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthThresholds {
    pub failure_threshold: u32,
    pub probe_interval: Duration,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            probe_interval: Duration::from_secs(30),
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone)]
pub struct VectorStoreSettings {
    /// Backend index/collection-group identity.
    pub index_name: String,
    pub embedding: EmbeddingConfig,
    pub auth: VectorAuth,
    pub retry: RetryPolicy,
    pub timeouts: OperationTimeouts,
    pub health: HealthThresholds,
}

impl VectorStoreSettings {
    pub fn new(
        index_name: impl Into<String>,
        embedding: EmbeddingConfig,
        auth: VectorAuth,
    ) -> Self {
        Self {
            index_name: index_name.into(),
            embedding,
            auth,
            retry: RetryPolicy::default(),
            timeouts: OperationTimeouts::default(),
            health: HealthThresholds::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeouts(mut self, timeouts: OperationTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_health(mut self, health: HealthThresholds) -> Self {
        self.health = health;
        self
    }

    pub fn validate(&self) -> QuarryResult<()> {
        if self.index_name.trim().is_empty() {
            return Err(QuarryError::Settings(SettingsError::MissingRequired {
                field: "index_name".to_string(),
            }));
        }
        if self.embedding.dimensions <= 0 {
            return Err(QuarryError::Settings(SettingsError::InvalidValue {
                field: "embedding.dimensions".to_string(),
                value: self.embedding.dimensions.to_string(),
                reason: "must be positive".to_string(),
            }));
        }
        match &self.auth {
            VectorAuth::ApiKey(key) if key.trim().is_empty() => {
                return Err(QuarryError::Settings(SettingsError::MissingRequired {
                    field: "auth.api_key".to_string(),
                }));
            }
            VectorAuth::VaultKey(key) if key.trim().is_empty() => {
                return Err(QuarryError::Settings(SettingsError::MissingRequired {
                    field: "auth.vault_key".to_string(),
                }));
            }
            _ => {}
        }
        if self.health.failure_threshold == 0 {
            return Err(QuarryError::Settings(SettingsError::InvalidValue {
                field: "health.failure_threshold".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            }));
        }
        self.retry.validate()?;
        Ok(())
    }

    /// The connection-manager configuration these settings imply.
    pub fn connection_config(&self) -> ConnectionConfig {
        let config = ConnectionConfig::new(self.index_name.clone())
            .with_retry(self.retry.clone())
            .with_timeouts(self.timeouts.clone());
        match &self.auth {
            VectorAuth::ApiKey(key) => config.with_api_key(key.clone()),
            VectorAuth::VaultKey(key) => config.with_vault_key(key.clone()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> VectorStoreSettings {
        VectorStoreSettings::new(
            "idx",
            EmbeddingConfig::new("model", 64),
            VectorAuth::ApiKey("secret".to_string()),
        )
    }

    #[test]
    fn test_valid_settings_pass() {
        settings().validate().unwrap();
    }

    #[test]
    fn test_empty_index_name_rejected() {
        let mut s = settings();
        s.index_name = "  ".to_string();
        assert!(matches!(
            s.validate().unwrap_err(),
            QuarryError::Settings(SettingsError::MissingRequired { .. })
        ));
    }

    #[test]
    fn test_nonpositive_dimensions_rejected() {
        let mut s = settings();
        s.embedding.dimensions = 0;
        assert!(s.validate().is_err());
        s.embedding.dimensions = -3;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_blank_credentials_rejected() {
        let mut s = settings();
        s.auth = VectorAuth::ApiKey(String::new());
        assert!(s.validate().is_err());
        s.auth = VectorAuth::VaultKey(" ".to_string());
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_connection_config_maps_auth() {
        let explicit = settings().connection_config();
        assert_eq!(explicit.api_key.as_deref(), Some("secret"));
        assert_eq!(explicit.vault_key, None);

        let mut s = settings();
        s.auth = VectorAuth::VaultKey("vk".to_string());
        let vaulted = s.connection_config();
        assert_eq!(vaulted.api_key, None);
        assert_eq!(vaulted.vault_key.as_deref(), Some("vk"));
        assert_eq!(vaulted.index, "idx");
    }
}
