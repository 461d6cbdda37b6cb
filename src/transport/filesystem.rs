//! Filesystem transport for privileged hosts

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tracing::{debug, info};

use crate::error::{ExchangeError, ExchangeResult};
use crate::storage::file_io::write_atomic_async;

use super::{Location, Transport};

/// Lets the user choose a file to import
#[async_trait]
pub trait FilePicker: Send + Sync {
    /// The chosen path, or `None` if the user cancelled
    async fn pick(&self) -> Option<PathBuf>;
}

/// Picker that always returns the same answer
#[derive(Debug, Clone, Default)]
pub struct FixedPicker(pub Option<PathBuf>);

impl FixedPicker {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self(Some(path.into()))
    }

    pub fn cancelled() -> Self {
        Self(None)
    }
}

#[async_trait]
impl FilePicker for FixedPicker {
    async fn pick(&self) -> Option<PathBuf> {
        self.0.clone()
    }
}

/// Writes exports into a directory and reads imports from a picked path
pub struct FilesystemTransport {
    export_dir: PathBuf,
    picker: Box<dyn FilePicker>,
}

impl FilesystemTransport {
    pub fn new(export_dir: impl Into<PathBuf>, picker: impl FilePicker + 'static) -> Self {
        Self {
            export_dir: export_dir.into(),
            picker: Box::new(picker),
        }
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    /// Claim the first free path for `name_hint` by creating it empty
    ///
    /// Adds `-1`, `-2`... before the extension when the name is taken. The
    /// claim uses `create_new`, so concurrent writers never share a path.
    async fn claim_path(&self, name_hint: &str) -> ExchangeResult<PathBuf> {
        tokio::fs::create_dir_all(&self.export_dir).await.map_err(|e| {
            ExchangeError::Io(format!(
                "Failed to create directory {}: {}",
                self.export_dir.display(),
                e
            ))
        })?;

        let (stem, ext) = match name_hint.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
            _ => (name_hint, None),
        };

        let mut n = 0u32;
        loop {
            let name = match (n, ext) {
                (0, _) => name_hint.to_string(),
                (_, Some(ext)) => format!("{}-{}.{}", stem, n, ext),
                (_, None) => format!("{}-{}", stem, n),
            };
            let path = self.export_dir.join(name);

            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(_) => return Ok(path),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
                Err(e) => {
                    return Err(ExchangeError::Io(format!(
                        "Failed to create {}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }
    }
}

#[async_trait]
impl Transport for FilesystemTransport {
    async fn write(&self, name_hint: &str, bytes: &[u8]) -> ExchangeResult<Location> {
        let path = self.claim_path(name_hint).await?;
        if let Err(e) = write_atomic_async(&path, bytes).await {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e);
        }

        info!(path = %path.display(), bytes = bytes.len(), "Snapshot written");
        Ok(Location::Path(path))
    }

    async fn read(&self) -> ExchangeResult<Vec<u8>> {
        let path = self.picker.pick().await.ok_or(ExchangeError::NoFileSelected)?;

        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            ExchangeError::Io(format!("Failed to read {}: {}", path.display(), e))
        })?;

        debug!(path = %path.display(), bytes = bytes.len(), "Snapshot read");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_then_read_picked_file() {
        let temp_dir = TempDir::new().unwrap();
        let writer = FilesystemTransport::new(temp_dir.path(), FixedPicker::cancelled());

        let location = writer.write("export.json", b"{}").await.unwrap();
        let Location::Path(path) = location else {
            panic!("expected a path location");
        };
        assert_eq!(path, temp_dir.path().join("export.json"));

        let reader = FilesystemTransport::new(temp_dir.path(), FixedPicker::path(&path));
        assert_eq!(reader.read().await.unwrap(), b"{}");
    }

    #[tokio::test]
    async fn test_write_does_not_clobber() {
        let temp_dir = TempDir::new().unwrap();
        let transport = FilesystemTransport::new(temp_dir.path(), FixedPicker::cancelled());

        transport.write("export.mcl", b"one").await.unwrap();
        let second = transport.write("export.mcl", b"two").await.unwrap();

        assert_eq!(second, Location::Path(temp_dir.path().join("export-1.mcl")));
        assert_eq!(
            std::fs::read(temp_dir.path().join("export.mcl")).unwrap(),
            b"one"
        );
    }

    #[tokio::test]
    async fn test_concurrent_writes_get_distinct_paths() {
        let temp_dir = TempDir::new().unwrap();
        let transport = FilesystemTransport::new(temp_dir.path(), FixedPicker::cancelled());

        let (a, b, c) = tokio::join!(
            transport.write("export.mcl", b"a"),
            transport.write("export.mcl", b"b"),
            transport.write("export.mcl", b"c"),
        );
        let mut paths = Vec::new();
        for (location, body) in [(a, b"a"), (b, b"b"), (c, b"c")] {
            let Location::Path(path) = location.unwrap() else {
                panic!("expected a path location");
            };
            assert_eq!(std::fs::read(&path).unwrap(), body);
            paths.push(path);
        }
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_pick() {
        let temp_dir = TempDir::new().unwrap();
        let transport = FilesystemTransport::new(temp_dir.path(), FixedPicker::cancelled());

        let err = transport.read().await.unwrap_err();
        assert!(matches!(err, ExchangeError::NoFileSelected));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let transport = FilesystemTransport::new(
            temp_dir.path(),
            FixedPicker::path(temp_dir.path().join("gone.json")),
        );

        let err = transport.read().await.unwrap_err();
        assert!(matches!(err, ExchangeError::Io(_)));
    }

    #[tokio::test]
    async fn test_creates_export_dir() {
        let temp_dir = TempDir::new().unwrap();
        let export_dir = temp_dir.path().join("exports");
        let transport = FilesystemTransport::new(&export_dir, FixedPicker::cancelled());

        transport.write("a.json", b"[]").await.unwrap();
        assert!(export_dir.join("a.json").exists());
    }
}
