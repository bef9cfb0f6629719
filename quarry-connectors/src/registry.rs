//! Explicit connector registry.
//!
//! Built once at startup and passed by reference to every component
//! that resolves a connector by logical name. There is no process-wide
//! singleton: the registry is a plain value.

use crate::client::ResourceConnector;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps logical names (e.g. "cache", "storage") to connectors.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<String, Arc<ResourceConnector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connector under a logical name. Re-registering a
    /// name replaces the previous connector.
    pub fn register(&mut self, name: impl Into<String>, connector: ResourceConnector) {
        self.connectors.insert(name.into(), Arc::new(connector));
    }

    /// Resolve a connector by logical name.
    pub fn get(&self, name: &str) -> Option<Arc<ResourceConnector>> {
        self.connectors.get(name).cloned()
    }

    /// Registered logical names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connectors.keys().cloned().collect();
        names.sort();
        names
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;

    fn connector(name: &str) -> ResourceConnector {
        ResourceConnector::new(name, Arc::new(InMemoryBackend::new()))
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = ConnectorRegistry::new();
        registry.register("cache", connector("cache"));
        registry.register("storage", connector("storage"));

        assert!(registry.get("cache").is_some());
        assert!(registry.get("storage").is_some());
        assert!(registry.get("unknown").is_none());
        assert_eq!(registry.names(), vec!["cache", "storage"]);
    }

    #[test]
    fn test_reregistering_replaces() {
        let mut registry = ConnectorRegistry::new();
        registry.register("cache", connector("first"));
        registry.register("cache", connector("second"));

        assert_eq!(registry.get("cache").unwrap().name(), "second");
        assert_eq!(registry.names().len(), 1);
    }
}
