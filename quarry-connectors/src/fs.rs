//! Local filesystem connector backend.
//!
//! The storage-flavored backend: each key maps to a file under a root
//! directory holding the raw value, with a `<key>.meta.json` sidecar
//! carrying metadata, ACL, and expiry. Keys are sanitized to relative
//! paths so a caller can never escape the root.

use crate::backend::{ResourceBackend, TtlUnit};
use crate::entry::{Metadata, ResourceEntry, ResourceListing};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quarry_core::{Acl, ConnectorError, QuarryError, QuarryResult};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const META_SUFFIX: &str = ".meta.json";

/// Sidecar payload stored next to each value file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Sidecar {
    metadata: Metadata,
    acl: Acl,
    expires_at: Option<DateTime<Utc>>,
}

/// Filesystem-backed connector backend rooted at a directory.
pub struct LocalStorageBackend {
    root: PathBuf,
}

impl LocalStorageBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn io_err(operation: &str, err: std::io::Error) -> QuarryError {
        QuarryError::Connector(ConnectorError::Io {
            operation: operation.to_string(),
            reason: err.to_string(),
        })
    }

    /// Resolve a key to a path under the root. Rejects empty keys,
    /// absolute keys, traversal components, and keys that would
    /// collide with a sidecar file.
    fn path_for(&self, key: &str) -> QuarryResult<PathBuf> {
        if key.trim().is_empty() {
            return Err(QuarryError::Connector(ConnectorError::InvalidRequest {
                operation: "key".to_string(),
                reason: "key must not be empty".to_string(),
            }));
        }
        if key.ends_with(META_SUFFIX) {
            return Err(QuarryError::Connector(ConnectorError::InvalidRequest {
                operation: "key".to_string(),
                reason: format!("key '{key}' must not end with '{META_SUFFIX}'"),
            }));
        }
        if key.starts_with('/') || key.contains('\\') {
            return Err(QuarryError::Connector(ConnectorError::InvalidRequest {
                operation: "key".to_string(),
                reason: format!("key '{key}' must be a relative path"),
            }));
        }
        let mut path = self.root.clone();
        for component in key.split('/') {
            if component.is_empty() || component == "." || component == ".." {
                return Err(QuarryError::Connector(ConnectorError::InvalidRequest {
                    operation: "key".to_string(),
                    reason: format!("key '{key}' contains an invalid path component"),
                }));
            }
            path.push(component);
        }
        Ok(path)
    }

    fn meta_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(META_SUFFIX);
        PathBuf::from(name)
    }

    async fn read_sidecar(path: &Path) -> QuarryResult<Sidecar> {
        match tokio::fs::read(Self::meta_path(path)).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                QuarryError::Connector(ConnectorError::Io {
                    operation: "read-sidecar".to_string(),
                    reason: format!("malformed sidecar: {e}"),
                })
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Sidecar::default()),
            Err(e) => Err(Self::io_err("read-sidecar", e)),
        }
    }

    /// Walk every value file under the root, returning `(key, path)`
    /// pairs. Sidecar files are skipped.
    async fn walk(&self) -> QuarryResult<Vec<(String, PathBuf)>> {
        let mut found = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut reader = match tokio::fs::read_dir(&dir).await {
                Ok(reader) => reader,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(Self::io_err("scan", e)),
            };
            while let Some(dirent) = reader.next_entry().await.map_err(|e| Self::io_err("scan", e))? {
                let path = dirent.path();
                let file_type = dirent.file_type().await.map_err(|e| Self::io_err("scan", e))?;
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                if path.to_string_lossy().ends_with(META_SUFFIX) {
                    continue;
                }
                let relative = path
                    .strip_prefix(&self.root)
                    .map_err(|_| Self::io_err("scan", std::io::Error::other("path outside root")))?;
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                found.push((key, path));
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl ResourceBackend for LocalStorageBackend {
    async fn load(&self, key: &str) -> QuarryResult<Option<ResourceEntry>> {
        let path = self.path_for(key)?;
        let value = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::io_err("load", e)),
        };
        let sidecar = Self::read_sidecar(&path).await?;
        Ok(Some(ResourceEntry {
            key: key.to_string(),
            value,
            metadata: sidecar.metadata,
            acl: sidecar.acl,
            expires_at: sidecar.expires_at,
        }))
    }

    async fn store(&self, entry: ResourceEntry) -> QuarryResult<()> {
        let path = self.path_for(&entry.key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_err("store", e))?;
        }
        tokio::fs::write(&path, &entry.value)
            .await
            .map_err(|e| Self::io_err("store", e))?;

        let sidecar = Sidecar {
            metadata: entry.metadata,
            acl: entry.acl,
            expires_at: entry.expires_at,
        };
        let bytes = serde_json::to_vec_pretty(&sidecar).map_err(|e| {
            QuarryError::Connector(ConnectorError::Io {
                operation: "store".to_string(),
                reason: format!("sidecar serialization: {e}"),
            })
        })?;
        tokio::fs::write(Self::meta_path(&path), bytes)
            .await
            .map_err(|e| Self::io_err("store", e))
    }

    async fn remove(&self, key: &str) -> QuarryResult<()> {
        let path = self.path_for(key)?;
        for target in [path.clone(), Self::meta_path(&path)] {
            match tokio::fs::remove_file(&target).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(Self::io_err("remove", e)),
            }
        }
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> QuarryResult<Vec<ResourceListing>> {
        let mut listings = Vec::new();
        for (key, path) in self.walk().await? {
            if !key.starts_with(prefix) {
                continue;
            }
            let sidecar = Self::read_sidecar(&path).await?;
            listings.push(ResourceListing {
                key,
                metadata: sidecar.metadata,
                acl: sidecar.acl,
                expires_at: sidecar.expires_at,
            });
        }
        listings.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(listings)
    }

    fn ttl_unit(&self) -> TtlUnit {
        TtlUnit::Seconds
    }
}

// =============================================================================
// TESTS
// =============================================================================
