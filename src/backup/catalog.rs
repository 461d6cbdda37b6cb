//! Storage for backup snapshots
//!
//! A catalog is a flat namespace of named byte blobs. The manager owns the
//! naming scheme; catalogs only store, list and delete.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{ExchangeError, ExchangeResult};
use crate::storage::file_io::write_atomic_async;

/// File extension used by `DirectoryCatalog`
pub const SNAPSHOT_EXTENSION: &str = "snapshot";

/// A stored backup as seen by the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub byte_size: u64,
}

/// Named blob storage for backups
#[async_trait]
pub trait BackupCatalog: Send + Sync {
    async fn list(&self) -> ExchangeResult<Vec<CatalogEntry>>;

    async fn get(&self, name: &str) -> ExchangeResult<Option<Vec<u8>>>;

    /// Store `bytes` under `name`; readers never see a partial entry
    async fn put(&self, name: &str, bytes: &[u8]) -> ExchangeResult<()>;

    /// Returns `false` if nothing was stored under `name`
    async fn delete(&self, name: &str) -> ExchangeResult<bool>;
}

/// Catalog keeping one `<name>.snapshot` file per backup in a directory
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    dir: PathBuf,
}

impl DirectoryCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> ExchangeResult<PathBuf> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\'])
            && name != "..";
        if !valid {
            return Err(ExchangeError::backup_not_found(name));
        }
        Ok(self.dir.join(format!("{}.{}", name, SNAPSHOT_EXTENSION)))
    }
}

#[async_trait]
impl BackupCatalog for DirectoryCatalog {
    async fn list(&self) -> ExchangeResult<Vec<CatalogEntry>> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ExchangeError::Io(format!(
                    "Failed to read backup directory: {}",
                    e
                )))
            }
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| ExchangeError::Io(format!("Failed to read directory entry: {}", e)))?
        {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            // Temp files from in-flight writes are hidden
            if file_name.starts_with('.') {
                continue;
            }
            let Some(name) = file_name
                .strip_suffix(SNAPSHOT_EXTENSION)
                .and_then(|n| n.strip_suffix('.'))
            else {
                continue;
            };

            let metadata = entry
                .metadata()
                .await
                .map_err(|e| ExchangeError::Io(format!("Failed to stat backup: {}", e)))?;
            if metadata.is_file() {
                entries.push(CatalogEntry {
                    name: name.to_string(),
                    byte_size: metadata.len(),
                });
            }
        }

        Ok(entries)
    }

    async fn get(&self, name: &str) -> ExchangeResult<Option<Vec<u8>>> {
        let path = self.path_for(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ExchangeError::Io(format!(
                "Failed to read backup {}: {}",
                name, e
            ))),
        }
    }

    async fn put(&self, name: &str, bytes: &[u8]) -> ExchangeResult<()> {
        let path = self.path_for(name)?;
        write_atomic_async(&path, bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "Backup stored");
        Ok(())
    }

    async fn delete(&self, name: &str) -> ExchangeResult<bool> {
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ExchangeError::Io(format!(
                "Failed to delete backup {}: {}",
                name, e
            ))),
        }
    }
}

/// Catalog held in memory
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BackupCatalog for MemoryCatalog {
    async fn list(&self) -> ExchangeResult<Vec<CatalogEntry>> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .map(|(name, bytes)| CatalogEntry {
                name: name.clone(),
                byte_size: bytes.len() as u64,
            })
            .collect())
    }

    async fn get(&self, name: &str) -> ExchangeResult<Option<Vec<u8>>> {
        Ok(self.entries.lock().await.get(name).cloned())
    }

    async fn put(&self, name: &str, bytes: &[u8]) -> ExchangeResult<()> {
        self.entries
            .lock()
            .await
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, name: &str) -> ExchangeResult<bool> {
        Ok(self.entries.lock().await.remove(name).is_some())
    }
}
